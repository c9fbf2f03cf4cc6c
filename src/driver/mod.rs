//! Ties the passes and the interpreter together.

use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, info, instrument};

use crate::{
    interpreter::Interpreter,
    ir::{IrError, IrScope, inlining::Inliner, simplify::propagate_constants},
    runtime::{Exception, Frame, MethodTable, Value},
};

pub mod config;

use config::Config;

/// What [`Session::optimize`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    /// Compiled methods looked at.
    pub methods: usize,
    /// Operand slots rewritten by constant propagation.
    pub simplified: usize,
    /// Call sites replaced by the callee body.
    pub inlined: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub config: Config,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs the enabled passes over every compiled method of `methods`.
    ///
    /// Inlining resolves callees against the methods as they were before this
    /// pass, so the result doesn't depend on the visiting order.
    #[instrument(level = "debug", skip_all)]
    pub fn optimize(&self, methods: &mut MethodTable) -> Result<OptimizeStats, IrError> {
        let opts = self.config.optimizer;
        let mut stats = OptimizeStats::default();

        if opts.simplify {
            for (class, name, body) in sorted_methods(methods) {
                let mut scope = IrScope::clone(&body);
                let changed = propagate_constants(&mut scope, opts.force_simplify);
                if changed > 0 {
                    debug!("{class}#{name}: {changed} operands simplified");
                    methods.define(&class, &name, scope);
                }
                stats.simplified += changed;
            }
        }

        let snapshot = methods.clone();
        let inliner = Inliner::new(opts.max_inline_size, opts.max_inlined_calls);

        for (class, name, body) in sorted_methods(&snapshot) {
            stats.methods += 1;
            if !opts.inline {
                continue;
            }

            let (mut scope, inlined) =
                inliner.inline_calls(&name, &body, |callee| snapshot.compiled(&class, callee))?;
            if inlined == 0 {
                continue;
            }
            if opts.simplify {
                // Arguments of inlined calls are often constants.
                stats.simplified += propagate_constants(&mut scope, opts.force_simplify);
            }
            debug!("{class}#{name}: {inlined} calls inlined");
            methods.define(&class, &name, scope);
            stats.inlined += inlined;
        }

        info!(
            "optimized {} methods: {} operands simplified, {} calls inlined",
            stats.methods, stats.simplified, stats.inlined
        );
        Ok(stats)
    }

    pub fn interpreter<'m>(&self, methods: &'m MethodTable) -> Interpreter<'m> {
        Interpreter::new(methods, self.config.interpreter)
    }

    /// Calls `name` on `receiver` with `args`.
    pub fn run_method(
        &self,
        methods: &MethodTable,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, Exception> {
        self.interpreter(methods)
            .invoke(receiver, name, args, None, 0)
    }

    /// Runs a top level scope with `receiver` as self.
    pub fn run_script(
        &self,
        methods: &MethodTable,
        scope: &IrScope,
        receiver: Value,
    ) -> Result<Value, Exception> {
        let mut frame = Frame::new(scope, receiver, Vec::new());
        self.interpreter(methods).run(scope, &mut frame)
    }
}

fn sorted_methods(methods: &MethodTable) -> Vec<(String, String, Arc<IrScope>)> {
    methods
        .compiled_methods()
        .into_iter()
        .sorted_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)))
        .collect()
}
