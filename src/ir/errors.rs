use thiserror::Error;

use crate::ir::{Label, Span};

/// A broken structural invariant of the IR.
///
/// These are compiler defects, they abort the compilation unit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IrError {
    #[error("jump to undefined label {label} in scope {scope:?}")]
    UndefinedLabel {
        scope: String,
        label: Label,
        span: Option<Span>,
    },
    #[error("label {label} defined twice in scope {scope:?}")]
    DuplicateLabel {
        scope: String,
        label: Label,
        span: Option<Span>,
    },
    #[error("temporary %t{index} out of range, scope {scope:?} has {num_temps}")]
    TempOutOfRange {
        scope: String,
        index: u32,
        num_temps: u32,
        span: Option<Span>,
    },
    #[error("local {name:?} occupies the slot reserved for self")]
    ReservedSelfSlot {
        scope: String,
        name: String,
        span: Option<Span>,
    },
    #[error("instruction at position {position} of scope {scope:?} is not a call site")]
    NotACallSite { scope: String, position: usize },
    #[error("invalid value mapping {from} -> {to}")]
    InvalidValueMapping { from: String, to: String },
}

impl IrError {
    pub fn span(&self) -> Option<Span> {
        match self {
            IrError::UndefinedLabel { span, .. }
            | IrError::DuplicateLabel { span, .. }
            | IrError::TempOutOfRange { span, .. }
            | IrError::ReservedSelfSlot { span, .. } => *span,
            IrError::NotACallSite { .. } | IrError::InvalidValueMapping { .. } => None,
        }
    }
}
