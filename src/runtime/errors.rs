use std::{fmt, ops::RangeInclusive};

use thiserror::Error;

use crate::ir::{Label, Span};

/// An argument count outside of what the callee declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub struct ArityError {
    /// The number of arguments actually passed.
    pub given: usize,
    pub required: usize,
    /// `required + opt`, saturating at `usize::MAX`.
    pub max: usize,
    /// A rest parameter is declared, so `max` isn't an upper bound.
    pub rest: bool,
}

impl ArityError {
    /// The inclusive range of accepted counts, ignoring the rest parameter.
    pub fn range(&self) -> RangeInclusive<usize> {
        self.required..=self.max
    }
}

impl fmt::Display for ArityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wrong number of arguments (given {}, expected ", self.given)?;
        if self.rest {
            write!(f, "{}+)", self.required)
        } else if self.required == self.max {
            write!(f, "{})", self.required)
        } else {
            write!(f, "{}..{})", self.required, self.max)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Arity(#[from] ArityError),
    #[error("undefined method {method:?} for an instance of {class}")]
    NoMethod { method: String, class: String },
    #[error("no implicit conversion of {found} into {expected}")]
    Type { expected: String, found: String },
    #[error("no block given (yield)")]
    NoBlockGiven,
    #[error("stack level too deep ({depth} calls)")]
    StackOverflow { depth: usize },
    #[error("no dynamic scope {depth} levels up")]
    ScopeDepth { depth: u32 },
    #[error("jump to undefined label {0}")]
    UndefinedLabel(Label),
}

/// A frame the exception unwound through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    /// The scope name.
    pub scope: String,
    /// The span of the instruction that raised or called.
    pub span: Option<Span>,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "in {} at {}..{}", self.scope, span.from, span.to),
            None => write!(f, "in {}", self.scope),
        }
    }
}

/// A raised runtime error travelling up the call stack.
///
/// The trace is ordered innermost first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct Exception {
    pub error: RuntimeError,
    pub trace: Vec<TraceEntry>,
}

impl Exception {
    pub fn push_frame(mut self, scope: &str, span: Option<Span>) -> Self {
        self.trace.push(TraceEntry {
            scope: scope.to_string(),
            span,
        });
        self
    }

    /// The span where the error was raised, if known.
    pub fn origin(&self) -> Option<&TraceEntry> {
        self.trace.first()
    }
}

impl From<RuntimeError> for Exception {
    fn from(error: RuntimeError) -> Self {
        Self {
            error,
            trace: Vec::new(),
        }
    }
}

impl From<ArityError> for Exception {
    fn from(error: ArityError) -> Self {
        RuntimeError::from(error).into()
    }
}
