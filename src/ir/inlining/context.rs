use std::collections::HashMap;

use crate::ir::{
    IrScope, Label, LocalVariable, Operand, TemporaryVariable, Variable,
    inlining::InlineError,
};

/// Translation state for a single inlining operation.
///
/// Maps callee locals, temporaries and labels into fresh index spaces of the
/// destination scope, and decides once what self stands for in the inlined
/// body. It owns no instruction and is dropped when the operation ends.
#[derive(Debug, Clone)]
pub struct InlineContext {
    self_value: Option<Operand>,
    /// Whether depth >= 1 callee locals are the destination's locals one level up.
    shift_outer_locals: bool,
    locals: HashMap<LocalVariable, Operand>,
    new_locals: Vec<LocalVariable>,
    next_slot: u32,
    prefix: String,
    temp_base: u32,
    label_base: u32,
    call_args: Option<Operand>,
    call_result: Variable,
    exit_label: Label,
}

impl InlineContext {
    /// Reserves the callee's temporaries and labels in `dest`, plus an exit
    /// label and a temporary for the call result.
    pub fn new(
        dest: &mut IrScope,
        callee: &IrScope,
        self_value: Option<Operand>,
        shift_outer_locals: bool,
    ) -> Self {
        let temp_base = dest.num_temps;
        dest.num_temps += callee.num_temps;
        let label_base = dest.next_label;
        dest.next_label += callee.next_label;
        let exit_label = dest.new_label();
        let call_result = Variable::Temp(dest.new_temp());

        Self {
            self_value,
            shift_outer_locals,
            locals: HashMap::new(),
            new_locals: Vec::new(),
            next_slot: dest.num_local_slots() as u32,
            prefix: callee.name.clone(),
            temp_base,
            label_base,
            call_args: None,
            call_result,
            exit_label,
        }
    }

    /// The arguments array `ReceiveArgs` turns into.
    pub fn set_call_args(&mut self, args: Operand) {
        self.call_args = Some(args);
    }

    /// Where `Return` values go.
    pub fn set_call_result(&mut self, result: Variable) {
        self.call_result = result;
    }

    /// Specializes a callee local, every read of it becomes `to`.
    pub fn map_local(&mut self, local: LocalVariable, to: Operand) {
        self.locals.insert(local, to);
    }

    pub fn self_operand(&self) -> Result<Operand, InlineError> {
        self.self_value.clone().ok_or_else(|| InlineError::Unsupported {
            reason: "callee refers to self but the call site provides no self".to_string(),
        })
    }

    pub fn local_operand(&mut self, local: &LocalVariable) -> Result<Operand, InlineError> {
        if let Some(operand) = self.locals.get(local) {
            return Ok(operand.clone());
        }

        if local.depth == 0 {
            let renamed = LocalVariable::new(
                format!("{}:{}", self.prefix, local.name),
                0,
                self.next_slot,
            );
            self.next_slot += 1;
            self.new_locals.push(renamed.clone());
            let operand = Operand::Local(renamed);
            self.locals.insert(local.clone(), operand.clone());
            return Ok(operand);
        }

        if self.shift_outer_locals {
            return Ok(Operand::Local(LocalVariable::new(
                local.name.clone(),
                local.depth - 1,
                local.offset,
            )));
        }

        Err(InlineError::Unsupported {
            reason: format!("{local} refers to a scope enclosing the callee"),
        })
    }

    /// Translates a written variable, it must stay assignable.
    pub fn variable(&mut self, variable: &Variable) -> Result<Variable, InlineError> {
        match variable {
            Variable::Temp(temp) => Ok(Variable::Temp(self.temp(*temp))),
            Variable::Local(local) => match self.local_operand(local)? {
                Operand::Local(local) => Ok(Variable::Local(local)),
                other => Err(InlineError::Unsupported {
                    reason: format!("assignment to {local}, specialized as {other}"),
                }),
            },
        }
    }

    /// Self inside a closure body of the callee.
    ///
    /// The body stays a closure, its self is whatever receiver the creating
    /// frame has at run time. That is only the callee's self when the callee
    /// runs with the caller's own self.
    pub fn closure_self(&self) -> Result<Operand, InlineError> {
        match &self.self_value {
            Some(Operand::SelfValue) => Ok(Operand::SelfValue),
            _ => Err(InlineError::Unsupported {
                reason: "closure in the callee would capture a different self".to_string(),
            }),
        }
    }

    /// Translates a local of a closure body nested `level` scopes below the
    /// callee.
    ///
    /// Locals of the closure itself (and of closures in between) stay, the
    /// others are callee locals seen from `level` scopes down.
    pub fn closure_local_operand(
        &mut self,
        local: &LocalVariable,
        level: u32,
    ) -> Result<Operand, InlineError> {
        if local.depth < level {
            return Ok(Operand::Local(local.clone()));
        }
        let callee_local = LocalVariable::new(local.name.clone(), local.depth - level, local.offset);
        match self.local_operand(&callee_local)? {
            Operand::Local(found) => Ok(Operand::Local(LocalVariable::new(
                found.name,
                found.depth + level,
                found.offset,
            ))),
            Operand::Const(literal) => Ok(Operand::Const(literal)),
            // Temporaries belong to the frame that writes them.
            other => Err(InlineError::Unsupported {
                reason: format!("{local} in a closure is specialized as {other}"),
            }),
        }
    }

    /// Translates a variable written inside a closure body.
    pub fn closure_variable(
        &mut self,
        variable: &Variable,
        level: u32,
    ) -> Result<Variable, InlineError> {
        match variable {
            Variable::Temp(temp) => Ok(Variable::Temp(*temp)),
            Variable::Local(local) => match self.closure_local_operand(local, level)? {
                Operand::Local(local) => Ok(Variable::Local(local)),
                other => Err(InlineError::Unsupported {
                    reason: format!("assignment to {local} in a closure, specialized as {other}"),
                }),
            },
        }
    }

    pub fn temp(&self, temp: TemporaryVariable) -> TemporaryVariable {
        TemporaryVariable::new(self.temp_base + temp.index)
    }

    pub fn label(&self, label: Label) -> Label {
        Label(self.label_base + label.0)
    }

    pub fn call_args(&self) -> Result<Operand, InlineError> {
        self.call_args.clone().ok_or_else(|| InlineError::Unsupported {
            reason: "callee receives arguments but the call site has none".to_string(),
        })
    }

    pub fn call_result(&self) -> &Variable {
        &self.call_result
    }

    pub fn exit_label(&self) -> Label {
        self.exit_label
    }

    /// Declares the locals allocated for the callee in `dest`.
    pub fn finish(self, dest: &mut IrScope) {
        dest.locals.extend(self.new_locals);
    }
}
