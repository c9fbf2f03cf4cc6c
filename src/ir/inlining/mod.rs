//! Call-site inlining.
//!
//! The inlined scope is a brand new arena: caller instructions are copied, the
//! callee body is cloned instruction by instruction through an
//! [`InlineContext`], so neither input graph is touched or aliased.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::ir::{
    InstrKind, Instruction, IrError, IrScope, LocalVariable, Operand, Operation, Variable,
    verify::verify_scope,
};

mod context;

pub use context::InlineContext;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InlineError {
    /// The call stays a call.
    #[error("unsupported inline shape: {reason}")]
    Unsupported { reason: String },
    #[error(transparent)]
    Invariant(#[from] IrError),
}

/// What self becomes inside the inlined body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineShape {
    /// A method call, self is the call's receiver.
    Method,
    /// A block inlined into its defining scope, self is the caller's self and
    /// the block's outer locals are the caller's locals.
    Closure,
    /// Self is the given caller operand.
    SelfAs(Operand),
    /// No self is available, a callee mentioning self can't be inlined.
    Detached,
}

/// Replaces the call at `position` of `caller` by the body of `callee`.
///
/// Returns a new scope, `caller` and `callee` are left untouched.
pub fn inline_call(
    caller: &IrScope,
    position: usize,
    callee: &IrScope,
    shape: &InlineShape,
) -> Result<IrScope, InlineError> {
    inline_call_specialized(caller, position, callee, shape, &[])
}

/// Like [`inline_call`], with some callee locals known to hold a caller
/// operand.
///
/// Every read of a specialized local becomes its operand. A callee that
/// assigns one of them can't be inlined this way.
pub fn inline_call_specialized(
    caller: &IrScope,
    position: usize,
    callee: &IrScope,
    shape: &InlineShape,
    specialized: &[(LocalVariable, Operand)],
) -> Result<IrScope, InlineError> {
    let not_a_call = || IrError::NotACallSite {
        scope: caller.name.clone(),
        position,
    };
    let call_idx = *caller.order.get(position).ok_or_else(not_a_call)?;
    let call = caller.instr(call_idx);
    let InstrKind::Call {
        result,
        receiver,
        args,
        closure,
        method,
    } = &call.kind
    else {
        return Err(not_a_call().into());
    };
    if closure.is_some() {
        return Err(InlineError::Unsupported {
            reason: format!("call to {method:?} passes a closure"),
        });
    }

    let mut dest = IrScope::new(caller.name.clone(), caller.kind);
    dest.locals = caller.locals.clone();
    dest.num_temps = caller.num_temps;
    dest.next_label = caller.next_label;

    for idx in &caller.order[..position] {
        dest.push(caller.instr(*idx).clone());
    }

    let self_source = match shape {
        InlineShape::Method => Some(receiver.clone()),
        InlineShape::Closure => Some(Operand::SelfValue),
        InlineShape::SelfAs(operand) => Some(operand.clone()),
        InlineShape::Detached => None,
    };
    let self_value = match self_source {
        Some(source) if !source.is_leaf() => {
            // Evaluate self once, every self in the body reads the same value.
            let temp = dest.new_temp();
            dest.push(Instruction::with_span(
                InstrKind::Copy {
                    result: Variable::Temp(temp),
                    source,
                },
                call.span,
            ));
            Some(Operand::Temp(temp))
        }
        other => other,
    };

    let receives_args = callee
        .instructions()
        .any(|instr| instr.operation() == Operation::ReceiveArgs);
    let call_args = if receives_args {
        let temp = dest.new_temp();
        dest.push(Instruction::with_span(
            InstrKind::Copy {
                result: Variable::Temp(temp),
                source: Operand::Array(args.clone()),
            },
            call.span,
        ));
        Some(Operand::Temp(temp))
    } else {
        None
    };

    let mut ctx = InlineContext::new(
        &mut dest,
        callee,
        self_value,
        matches!(shape, InlineShape::Closure),
    );
    if let Some(call_args) = call_args {
        ctx.set_call_args(call_args);
    }
    if let Some(result) = result {
        ctx.set_call_result(result.clone());
    }
    for (local, operand) in specialized {
        ctx.map_local(local.clone(), operand.clone());
    }

    let last = callee.len().saturating_sub(1);
    let mut ends_with_return = false;
    for (pos, instr) in callee.instructions().enumerate() {
        let cloned = instr.clone_for_inlining(&mut ctx)?;
        dest.push(cloned);
        ends_with_return = instr.operation() == Operation::Return;
        if ends_with_return && pos != last {
            dest.push(Instruction::with_span(
                InstrKind::Jump {
                    target: ctx.exit_label(),
                },
                instr.span,
            ));
        }
    }
    if !ends_with_return {
        // Falling off the end of a body returns nil.
        dest.push(Instruction::with_span(
            InstrKind::Copy {
                result: ctx.call_result().clone(),
                source: Operand::nil(),
            },
            call.span,
        ));
    }
    dest.push(Instruction::with_span(
        InstrKind::Label(ctx.exit_label()),
        call.span,
    ));
    ctx.finish(&mut dest);

    for idx in &caller.order[position + 1..] {
        dest.push(caller.instr(*idx).clone());
    }

    verify_scope(&dest)?;
    Ok(dest)
}

/// Inlining policy: size limits and silent fallback.
#[derive(Debug, Clone, Copy)]
pub struct Inliner {
    /// Callees with more instructions than this are never inlined.
    pub max_inline_size: usize,
    /// Upper bound of inlined call sites per scope.
    pub max_inlined_calls: usize,
}

impl Inliner {
    pub fn new(max_inline_size: usize, max_inlined_calls: usize) -> Self {
        Self {
            max_inline_size,
            max_inlined_calls,
        }
    }

    /// Like [`inline_call`], but an unsupported shape yields `None` and the
    /// call site is kept as a call.
    pub fn try_inline(
        &self,
        caller: &IrScope,
        position: usize,
        callee: &IrScope,
        shape: &InlineShape,
    ) -> Result<Option<IrScope>, IrError> {
        self.try_inline_specialized(caller, position, callee, shape, &[])
    }

    /// [`Inliner::try_inline`] for [`inline_call_specialized`].
    pub fn try_inline_specialized(
        &self,
        caller: &IrScope,
        position: usize,
        callee: &IrScope,
        shape: &InlineShape,
        specialized: &[(LocalVariable, Operand)],
    ) -> Result<Option<IrScope>, IrError> {
        if callee.len() > self.max_inline_size {
            debug!(
                "not inlining {:?} into {:?}: {} instructions",
                callee.name,
                caller.name,
                callee.len()
            );
            return Ok(None);
        }

        match inline_call_specialized(caller, position, callee, shape, specialized) {
            Ok(scope) => {
                debug!("inlined {:?} into {:?}", callee.name, caller.name);
                Ok(Some(scope))
            }
            Err(InlineError::Unsupported { reason }) => {
                debug!(
                    "not inlining {:?} into {:?}: {reason}",
                    callee.name, caller.name
                );
                Ok(None)
            }
            Err(InlineError::Invariant(err)) => Err(err),
        }
    }

    /// Inlines calls on self whose target `resolve` knows.
    ///
    /// `name` is the method `scope` is the body of, calls to it are skipped.
    /// Returns the new scope and the number of inlined call sites.
    #[instrument(level = "debug", skip_all, fields(method = name))]
    pub fn inline_calls<F>(
        &self,
        name: &str,
        scope: &IrScope,
        mut resolve: F,
    ) -> Result<(IrScope, usize), IrError>
    where
        F: FnMut(&str) -> Option<Arc<IrScope>>,
    {
        let mut current = scope.clone();
        let mut inlined = 0;
        let mut pos = 0;

        while pos < current.len() && inlined < self.max_inlined_calls {
            let callee = match &current.instr(current.order[pos]).kind {
                InstrKind::Call {
                    receiver: Operand::SelfValue,
                    method,
                    closure: None,
                    ..
                } if method != name => resolve(method),
                _ => None,
            };

            if let Some(callee) = callee {
                if let Some(new_scope) =
                    self.try_inline(&current, pos, &callee, &InlineShape::Method)?
                {
                    // Look at the inlined body next, it may hold more calls.
                    current = new_scope;
                    inlined += 1;
                    continue;
                }
            }
            pos += 1;
        }

        debug!("inlined {inlined} call sites");
        Ok((current, inlined))
    }
}
