use std::{fmt, sync::Arc};

use educe::Educe;
use itertools::Itertools;

use crate::ir::{
    IrScope, Label, Span,
    inlining::{InlineContext, InlineError},
    operands::{Operand, Variable},
    simplify::ValueMap,
};

/// The operation tag of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ReceiveArgs,
    CheckArgsArrayArity,
    Copy,
    Call,
    Yield,
    Label,
    Jump,
    BranchFalse,
    Return,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ReceiveArgs => "receive_args",
            Operation::CheckArgsArrayArity => "check_args_array_arity",
            Operation::Copy => "copy",
            Operation::Call => "call",
            Operation::Yield => "yield",
            Operation::Label => "label",
            Operation::Jump => "jump",
            Operation::BranchFalse => "branch_false",
            Operation::Return => "return",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A block body passed literally at a call site.
///
/// Bodies are shared, two closures are equal only if they are the same body.
#[derive(Debug, Clone)]
pub struct ClosureBody(pub Arc<IrScope>);

impl PartialEq for ClosureBody {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ClosureBody {}

impl ClosureBody {
    /// Copies a closure body that moves into the destination scope of `ctx`
    /// along with its callee.
    ///
    /// The copy is a new body with its own arena. `level` is how many scopes
    /// the body sits below the callee.
    pub fn clone_for_inlining(
        &self,
        ctx: &mut InlineContext,
        level: u32,
    ) -> Result<ClosureBody, InlineError> {
        let body = &self.0;
        let mut scope = IrScope::new(body.name.clone(), body.kind);
        scope.locals = body.locals.clone();
        scope.num_temps = body.num_temps;
        scope.next_label = body.next_label;
        for instr in body.instructions() {
            scope.push(instr.clone_for_closure(ctx, level)?);
        }
        Ok(ClosureBody(Arc::new(scope)))
    }
}

/// One IR operation.
#[derive(Debug, Clone, Educe)]
#[educe(PartialEq, Eq)]
pub struct Instruction {
    #[educe(PartialEq(ignore))]
    pub span: Option<Span>,
    pub kind: InstrKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrKind {
    /// Stores the frame's incoming arguments as an array.
    ReceiveArgs { result: Variable },
    /// Aborts the call if the arguments array doesn't satisfy the declared arity.
    CheckArgsArrayArity {
        args_array: Operand,
        /// Minimum number of positional arguments.
        required: usize,
        /// Number of optional positional arguments.
        opt: usize,
        /// `-1` when there is no rest parameter.
        rest: i32,
    },
    Copy {
        result: Variable,
        source: Operand,
    },
    /// Dynamic dispatch of `method` on `receiver`.
    Call {
        result: Option<Variable>,
        receiver: Operand,
        method: String,
        args: Vec<Operand>,
        closure: Option<ClosureBody>,
    },
    /// Calls the block of the current frame.
    Yield {
        result: Option<Variable>,
        args: Vec<Operand>,
    },
    Label(Label),
    Jump {
        target: Label,
    },
    /// Jumps to `target` when `condition` is nil or false.
    BranchFalse {
        condition: Operand,
        target: Label,
    },
    Return {
        value: Operand,
    },
}

impl InstrKind {
    pub fn operation(&self) -> Operation {
        match self {
            InstrKind::ReceiveArgs { .. } => Operation::ReceiveArgs,
            InstrKind::CheckArgsArrayArity { .. } => Operation::CheckArgsArrayArity,
            InstrKind::Copy { .. } => Operation::Copy,
            InstrKind::Call { .. } => Operation::Call,
            InstrKind::Yield { .. } => Operation::Yield,
            InstrKind::Label(_) => Operation::Label,
            InstrKind::Jump { .. } => Operation::Jump,
            InstrKind::BranchFalse { .. } => Operation::BranchFalse,
            InstrKind::Return { .. } => Operation::Return,
        }
    }
}

impl Instruction {
    pub fn new(kind: InstrKind) -> Self {
        Self { span: None, kind }
    }

    pub fn with_span(kind: InstrKind, span: Option<Span>) -> Self {
        Self { span, kind }
    }

    pub fn operation(&self) -> Operation {
        self.kind.operation()
    }

    /// The operands read by this instruction, in slot order.
    pub fn operands(&self) -> Vec<&Operand> {
        match &self.kind {
            InstrKind::ReceiveArgs { .. } => vec![],
            InstrKind::CheckArgsArrayArity { args_array, .. } => vec![args_array],
            InstrKind::Copy { source, .. } => vec![source],
            InstrKind::Call { receiver, args, .. } => {
                std::iter::once(receiver).chain(args.iter()).collect()
            }
            InstrKind::Yield { args, .. } => args.iter().collect(),
            InstrKind::Label(_) | InstrKind::Jump { .. } => vec![],
            InstrKind::BranchFalse { condition, .. } => vec![condition],
            InstrKind::Return { value } => vec![value],
        }
    }

    /// The replaceable operand slots, in the same order as [`Instruction::operands`].
    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match &mut self.kind {
            InstrKind::ReceiveArgs { .. } => vec![],
            InstrKind::CheckArgsArrayArity { args_array, .. } => vec![args_array],
            InstrKind::Copy { source, .. } => vec![source],
            InstrKind::Call { receiver, args, .. } => {
                std::iter::once(receiver).chain(args.iter_mut()).collect()
            }
            InstrKind::Yield { args, .. } => args.iter_mut().collect(),
            InstrKind::Label(_) | InstrKind::Jump { .. } => vec![],
            InstrKind::BranchFalse { condition, .. } => vec![condition],
            InstrKind::Return { value } => vec![value],
        }
    }

    /// The variable this instruction writes, if any.
    pub fn result(&self) -> Option<&Variable> {
        match &self.kind {
            InstrKind::ReceiveArgs { result } | InstrKind::Copy { result, .. } => Some(result),
            InstrKind::Call { result, .. } | InstrKind::Yield { result, .. } => result.as_ref(),
            _ => None,
        }
    }

    /// Replaces every operand slot by its simplified form.
    ///
    /// Returns how many slots changed.
    pub fn simplify_operands(&mut self, map: &ValueMap, force: bool) -> usize {
        let mut changed = 0;
        for slot in self.operands_mut() {
            let simplified = slot.simplify(map, force);
            if simplified != *slot {
                *slot = simplified;
                changed += 1;
            }
        }
        changed
    }

    /// Deep-copies the instruction into the destination scope of `ctx`.
    ///
    /// Scalar parameters are copied verbatim, every operand goes through `ctx`.
    pub fn clone_for_inlining(&self, ctx: &mut InlineContext) -> Result<Instruction, InlineError> {
        let kind = match &self.kind {
            InstrKind::ReceiveArgs { result } => InstrKind::Copy {
                result: ctx.variable(result)?,
                source: ctx.call_args()?,
            },
            InstrKind::CheckArgsArrayArity {
                args_array,
                required,
                opt,
                rest,
            } => InstrKind::CheckArgsArrayArity {
                args_array: args_array.clone_for_inlining(ctx)?,
                required: *required,
                opt: *opt,
                rest: *rest,
            },
            InstrKind::Copy { result, source } => InstrKind::Copy {
                source: source.clone_for_inlining(ctx)?,
                result: ctx.variable(result)?,
            },
            InstrKind::Call {
                result,
                receiver,
                method,
                args,
                closure,
            } => InstrKind::Call {
                receiver: receiver.clone_for_inlining(ctx)?,
                args: args
                    .iter()
                    .map(|arg| arg.clone_for_inlining(ctx))
                    .collect::<Result<_, _>>()?,
                result: result.as_ref().map(|x| ctx.variable(x)).transpose()?,
                method: method.clone(),
                closure: closure
                    .as_ref()
                    .map(|body| body.clone_for_inlining(ctx, 1))
                    .transpose()?,
            },
            InstrKind::Yield { .. } => {
                return Err(InlineError::Unsupported {
                    reason: "yield to the callee's block".to_string(),
                });
            }
            InstrKind::Label(label) => InstrKind::Label(ctx.label(*label)),
            InstrKind::Jump { target } => InstrKind::Jump {
                target: ctx.label(*target),
            },
            InstrKind::BranchFalse { condition, target } => InstrKind::BranchFalse {
                condition: condition.clone_for_inlining(ctx)?,
                target: ctx.label(*target),
            },
            // The engine follows this copy with a jump to the exit label.
            InstrKind::Return { value } => InstrKind::Copy {
                source: value.clone_for_inlining(ctx)?,
                result: ctx.call_result().clone(),
            },
        };

        Ok(Instruction {
            span: self.span,
            kind,
        })
    }
}

impl Instruction {
    /// Copies an instruction of a closure body nested `level` scopes below the
    /// callee being inlined.
    ///
    /// Temporaries, labels and arguments belong to the closure's own frame and
    /// are kept, captured callee locals and self go through `ctx`.
    pub fn clone_for_closure(
        &self,
        ctx: &mut InlineContext,
        level: u32,
    ) -> Result<Instruction, InlineError> {
        let mut cloned = self.clone();
        for slot in cloned.operands_mut() {
            *slot = slot.clone_for_closure(ctx, level)?;
        }
        match &mut cloned.kind {
            InstrKind::ReceiveArgs { result } | InstrKind::Copy { result, .. } => {
                *result = ctx.closure_variable(result, level)?;
            }
            InstrKind::Call {
                result, closure, ..
            } => {
                if let Some(result) = result {
                    *result = ctx.closure_variable(result, level)?;
                }
                if let Some(body) = closure {
                    *body = body.clone_for_inlining(ctx, level + 1)?;
                }
            }
            InstrKind::Yield {
                result: Some(result),
                ..
            } => {
                *result = ctx.closure_variable(result, level)?;
            }
            _ => {}
        }
        Ok(cloned)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.operation();
        if let Some(result) = self.result() {
            write!(f, "{result} = ")?;
        }
        match &self.kind {
            InstrKind::ReceiveArgs { .. } => write!(f, "{op}"),
            InstrKind::CheckArgsArrayArity {
                args_array,
                required,
                opt,
                rest,
            } => write!(f, "{op}({args_array}, {required}, {opt}, {rest})"),
            InstrKind::Copy { source, .. } => write!(f, "{op}({source})"),
            InstrKind::Call {
                receiver,
                method,
                args,
                closure,
                ..
            } => {
                write!(f, "{op}({receiver}, :{method}, [{}])", args.iter().join(", "))?;
                if let Some(closure) = closure {
                    write!(f, " &{}", closure.0.name)?;
                }
                Ok(())
            }
            InstrKind::Yield { args, .. } => write!(f, "{op}({})", args.iter().join(", ")),
            InstrKind::Label(label) => write!(f, "{label}:"),
            InstrKind::Jump { target } => write!(f, "{op} {target}"),
            InstrKind::BranchFalse { condition, target } => {
                write!(f, "{op}({condition}) {target}")
            }
            InstrKind::Return { value } => write!(f, "{op}({value})"),
        }
    }
}
