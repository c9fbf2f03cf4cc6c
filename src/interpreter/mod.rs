//! Direct interpretation of IR scopes.

use tracing::{instrument, trace};

use crate::{
    driver::config::InterpreterConfig,
    ir::{IrScope, Label},
    runtime::{Closure, Exception, Frame, Method, MethodTable, RuntimeError, Value},
};

mod instructions;

pub use instructions::check_args_array_arity;

/// What the interpreter does after an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Next,
    Jump(Label),
    Return(Value),
}

/// Runs scopes against frames, dispatching calls through a [`MethodTable`].
#[derive(Debug, Clone)]
pub struct Interpreter<'m> {
    methods: &'m MethodTable,
    config: InterpreterConfig,
}

impl<'m> Interpreter<'m> {
    pub fn new(methods: &'m MethodTable, config: InterpreterConfig) -> Self {
        Self { methods, config }
    }

    /// Runs `scope` to completion in `frame`.
    ///
    /// Falling off the end of the scope returns nil.
    pub fn run(&self, scope: &IrScope, frame: &mut Frame) -> Result<Value, Exception> {
        self.execute(scope, frame, 0)
    }

    pub(crate) fn execute(
        &self,
        scope: &IrScope,
        frame: &mut Frame,
        depth: usize,
    ) -> Result<Value, Exception> {
        let labels = scope.label_positions();
        let mut pc = 0;

        while let Some(idx) = scope.order.get(pc) {
            let instr = scope.instr(*idx);
            trace!("{}: {instr}", scope.name);

            let flow = instr
                .interpret(frame, self, depth)
                .map_err(|err| err.push_frame(&scope.name, instr.span))?;

            match flow {
                Flow::Next => pc += 1,
                Flow::Jump(label) => {
                    pc = *labels.get(&label).ok_or_else(|| {
                        Exception::from(RuntimeError::UndefinedLabel(label))
                            .push_frame(&scope.name, instr.span)
                    })?;
                }
                Flow::Return(value) => return Ok(value),
            }
        }

        Ok(Value::Nil)
    }

    /// Calls `method` on `receiver`.
    #[instrument(level = "debug", skip_all, fields(method = %method, depth = depth))]
    pub fn invoke(
        &self,
        receiver: &Value,
        method: &str,
        args: Vec<Value>,
        block: Option<Closure>,
        depth: usize,
    ) -> Result<Value, Exception> {
        if depth > self.config.max_call_depth {
            return Err(RuntimeError::StackOverflow { depth }.into());
        }

        let class = receiver.class_name();
        match self.methods.lookup(class, method) {
            Some(Method::Builtin(builtin)) => Ok(builtin(receiver, &args)?),
            Some(Method::Compiled(body)) => {
                let mut frame = Frame::new(body, receiver.clone(), args).with_block(block);
                self.execute(body, &mut frame, depth)
            }
            None => Err(RuntimeError::NoMethod {
                method: method.to_string(),
                class: class.to_string(),
            }
            .into()),
        }
    }

    /// Runs the block with `args`.
    pub fn call_closure(
        &self,
        closure: &Closure,
        args: Vec<Value>,
        depth: usize,
    ) -> Result<Value, Exception> {
        if depth > self.config.max_call_depth {
            return Err(RuntimeError::StackOverflow { depth }.into());
        }
        let mut frame = Frame::for_closure(closure, args);
        self.execute(&closure.body, &mut frame, depth)
    }
}
