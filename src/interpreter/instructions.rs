use crate::{
    interpreter::{Flow, Interpreter},
    ir::{InstrKind, Instruction, Operand},
    runtime::{ArityError, Closure, Exception, Frame, RuntimeError, Value},
};

/// Checks `num_args` against a `required`/`opt`/`rest` parameter list.
///
/// `rest == -1` means no rest parameter, any other value removes the upper bound.
pub fn check_args_array_arity(
    num_args: usize,
    required: usize,
    opt: usize,
    rest: i32,
) -> Result<(), ArityError> {
    let max = required.saturating_add(opt);
    if num_args < required || (rest == -1 && num_args > max) {
        return Err(ArityError {
            given: num_args,
            required,
            max,
            rest: rest != -1,
        });
    }
    Ok(())
}

impl Instruction {
    /// Executes the instruction against `frame`.
    ///
    /// `depth` is the call depth of the frame, nested calls run one deeper.
    pub fn interpret(
        &self,
        frame: &mut Frame,
        interp: &Interpreter<'_>,
        depth: usize,
    ) -> Result<Flow, Exception> {
        match &self.kind {
            InstrKind::ReceiveArgs { result } => {
                let args = frame.args_array();
                frame.assign(result, args)?;
            }
            InstrKind::CheckArgsArrayArity {
                args_array,
                required,
                opt,
                rest,
            } => {
                let args = args_array.retrieve(frame)?;
                let values = args.as_array().ok_or_else(|| RuntimeError::Type {
                    expected: "Array".to_string(),
                    found: args.class_name().to_string(),
                })?;
                check_args_array_arity(values.len(), *required, *opt, *rest)?;
            }
            InstrKind::Copy { result, source } => {
                let value = source.retrieve(frame)?;
                frame.assign(result, value)?;
            }
            InstrKind::Call {
                result,
                receiver,
                method,
                args,
                closure,
            } => {
                let receiver = receiver.retrieve(frame)?;
                let args = retrieve_all(args, frame)?;
                let block = closure.as_ref().map(|body| Closure {
                    body: body.0.clone(),
                    receiver: frame.receiver.clone(),
                    scope: frame.scope.clone(),
                });
                let value = interp.invoke(&receiver, method, args, block, depth + 1)?;
                if let Some(result) = result {
                    frame.assign(result, value)?;
                }
            }
            InstrKind::Yield { result, args } => {
                let block = frame.block.clone().ok_or(RuntimeError::NoBlockGiven)?;
                let args = retrieve_all(args, frame)?;
                let value = interp.call_closure(&block, args, depth + 1)?;
                if let Some(result) = result {
                    frame.assign(result, value)?;
                }
            }
            InstrKind::Label(_) => {}
            InstrKind::Jump { target } => return Ok(Flow::Jump(*target)),
            InstrKind::BranchFalse { condition, target } => {
                if !condition.retrieve(frame)?.is_truthy() {
                    return Ok(Flow::Jump(*target));
                }
            }
            InstrKind::Return { value } => return Ok(Flow::Return(value.retrieve(frame)?)),
        }

        Ok(Flow::Next)
    }
}

fn retrieve_all(operands: &[Operand], frame: &Frame) -> Result<Vec<Value>, RuntimeError> {
    operands
        .iter()
        .map(|operand| operand.retrieve(frame))
        .collect()
}
