use std::{collections::HashMap, sync::Arc};

use tracing::debug;

use crate::ir::{
    ClosureBody, InstrIndex, InstrKind, Instruction, IrError, IrScope, Label, LocalVariable,
    Operand, ScopeKind, Span, TemporaryVariable, Variable, verify::verify_scope,
};

/// Helper to build a scope instruction by instruction.
#[derive(Debug)]
pub struct ScopeBuilder {
    scope: IrScope,
    name_to_local: HashMap<String, LocalVariable>,
    current_span: Option<Span>,
}

impl ScopeBuilder {
    pub fn new(name: impl Into<String>, kind: ScopeKind) -> Self {
        Self {
            scope: IrScope::new(name, kind),
            name_to_local: HashMap::new(),
            current_span: None,
        }
    }

    pub fn method(name: impl Into<String>) -> Self {
        Self::new(name, ScopeKind::Method)
    }

    pub fn closure(name: impl Into<String>) -> Self {
        Self::new(name, ScopeKind::Closure)
    }

    /// Span attached to the instructions pushed from now on.
    pub fn set_span(&mut self, span: Option<Span>) -> &mut Self {
        self.current_span = span;
        self
    }

    /// Gets or declares a local of this scope.
    ///
    /// Slot 0 belongs to self, locals are numbered from 1.
    pub fn local(&mut self, name: &str) -> LocalVariable {
        if let Some(local) = self.name_to_local.get(name) {
            return local.clone();
        }
        let local = LocalVariable::new(name, 0, self.scope.locals.len() as u32 + 1);
        self.scope.locals.push(local.clone());
        self.name_to_local.insert(name.to_string(), local.clone());
        local
    }

    /// A local of an enclosing scope.
    pub fn outer_local(&self, name: &str, depth: u32, offset: u32) -> LocalVariable {
        LocalVariable::new(name, depth, offset)
    }

    pub fn temp(&mut self) -> TemporaryVariable {
        self.scope.new_temp()
    }

    pub fn new_label(&mut self) -> Label {
        self.scope.new_label()
    }

    pub fn push(&mut self, kind: InstrKind) -> InstrIndex {
        self.scope
            .push(Instruction::with_span(kind, self.current_span))
    }

    /// Receives the incoming arguments into a new temporary.
    pub fn receive_args(&mut self) -> TemporaryVariable {
        let result = self.temp();
        self.push(InstrKind::ReceiveArgs {
            result: result.into(),
        });
        result
    }

    pub fn check_arity(
        &mut self,
        args_array: impl Into<Operand>,
        required: usize,
        opt: usize,
        rest: i32,
    ) -> InstrIndex {
        self.push(InstrKind::CheckArgsArrayArity {
            args_array: args_array.into(),
            required,
            opt,
            rest,
        })
    }

    pub fn copy(&mut self, result: impl Into<Variable>, source: impl Into<Operand>) -> InstrIndex {
        self.push(InstrKind::Copy {
            result: result.into(),
            source: source.into(),
        })
    }

    /// Calls `method` and stores the result in a new temporary.
    pub fn call(
        &mut self,
        receiver: impl Into<Operand>,
        method: &str,
        args: Vec<Operand>,
    ) -> TemporaryVariable {
        self.call_inner(receiver.into(), method, args, None)
    }

    /// Like [`ScopeBuilder::call`], passing `closure` as the block.
    pub fn call_with_closure(
        &mut self,
        receiver: impl Into<Operand>,
        method: &str,
        args: Vec<Operand>,
        closure: Arc<IrScope>,
    ) -> TemporaryVariable {
        self.call_inner(receiver.into(), method, args, Some(ClosureBody(closure)))
    }

    fn call_inner(
        &mut self,
        receiver: Operand,
        method: &str,
        args: Vec<Operand>,
        closure: Option<ClosureBody>,
    ) -> TemporaryVariable {
        let result = self.temp();
        self.push(InstrKind::Call {
            result: Some(result.into()),
            receiver,
            method: method.to_string(),
            args,
            closure,
        });
        result
    }

    pub fn yield_values(&mut self, args: Vec<Operand>) -> TemporaryVariable {
        let result = self.temp();
        self.push(InstrKind::Yield {
            result: Some(result.into()),
            args,
        });
        result
    }

    pub fn place_label(&mut self, label: Label) -> InstrIndex {
        self.push(InstrKind::Label(label))
    }

    pub fn jump(&mut self, target: Label) -> InstrIndex {
        self.push(InstrKind::Jump { target })
    }

    pub fn branch_false(&mut self, condition: impl Into<Operand>, target: Label) -> InstrIndex {
        self.push(InstrKind::BranchFalse {
            condition: condition.into(),
            target,
        })
    }

    pub fn ret(&mut self, value: impl Into<Operand>) -> InstrIndex {
        self.push(InstrKind::Return {
            value: value.into(),
        })
    }

    /// Verifies and returns the built scope.
    pub fn finish(self) -> Result<IrScope, IrError> {
        verify_scope(&self.scope)?;
        debug!(
            "built scope {:?} with {} instructions",
            self.scope.name,
            self.scope.len()
        );
        Ok(self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locals_start_after_self() {
        let mut builder = ScopeBuilder::method("m");
        let a = builder.local("a");
        let b = builder.local("b");
        assert_eq!(a.offset, 1);
        assert_eq!(b.offset, 2);
        assert_eq!(builder.local("a"), a);
    }

    #[test]
    fn local_named_self_is_a_plain_local() {
        let mut builder = ScopeBuilder::method("m");
        let fake = builder.local("%self");
        builder.copy(fake.clone(), Operand::fixnum(1));
        builder.ret(Operand::SelfValue);
        let scope = builder.finish().unwrap();
        assert_eq!(fake.offset, 1);
        assert_ne!(Operand::Local(fake), Operand::SelfValue);
        assert_eq!(scope.num_local_slots(), 2);
    }

    #[test]
    fn dump() {
        let mut builder = ScopeBuilder::method("m");
        let args = builder.receive_args();
        builder.check_arity(args, 1, 0, -1);
        let exit = builder.new_label();
        builder.branch_false(Operand::SelfValue, exit);
        builder.place_label(exit);
        builder.ret(Operand::nil());
        let scope = builder.finish().unwrap();
        assert_eq!(
            scope.to_string(),
            "method m:\n    %t0 = receive_args\n    check_args_array_arity(%t0, 1, 0, -1)\n    branch_false(%self) L0\nL0:\n    return(nil)\n"
        );
    }
}
