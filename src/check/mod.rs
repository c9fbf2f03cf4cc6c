//! Diagnostics for errors that carry source spans.

use std::ops::Range;

use ariadne::{ColorGenerator, Label, Report, ReportKind};

use crate::{
    ir::{IrError, Span},
    runtime::{Exception, RuntimeError},
};

#[derive(Debug, Clone)]
pub struct FileSpan {
    pub span: Range<usize>,
    pub path: String,
}

impl FileSpan {
    pub fn new(path: String, span: Range<usize>) -> Self {
        Self { path, span }
    }

    fn from_span(path: &str, span: Option<Span>) -> Self {
        Self::new(path.to_string(), span.map(Range::from).unwrap_or(0..0))
    }
}

impl ariadne::Span for FileSpan {
    type SourceId = String;

    fn source(&self) -> &Self::SourceId {
        &self.path
    }

    fn start(&self) -> usize {
        self.span.start
    }

    fn end(&self) -> usize {
        self.span.end
    }
}

fn runtime_error_code(error: &RuntimeError) -> &'static str {
    match error {
        RuntimeError::Arity(_) => "ArgumentError",
        RuntimeError::NoMethod { .. } => "NoMethodError",
        RuntimeError::Type { .. } => "TypeError",
        RuntimeError::NoBlockGiven => "LocalJumpError",
        RuntimeError::StackOverflow { .. } => "SystemStackError",
        RuntimeError::ScopeDepth { .. } | RuntimeError::UndefinedLabel(_) => "InternalError",
    }
}

/// Creates a report from an uncaught exception raised while running code
/// compiled from `path`.
///
/// The innermost frame gets the primary label, the frames it unwound
/// through are listed as notes.
pub fn exception_to_report(exception: &Exception, path: &str) -> Report<'static, FileSpan> {
    let mut colors = ColorGenerator::new();
    colors.next();

    let origin = exception.origin();
    let filespan = FileSpan::from_span(path, origin.and_then(|entry| entry.span));
    let mut report = Report::build(ReportKind::Error, filespan.clone())
        .with_code(runtime_error_code(&exception.error))
        .with_message(exception.error.to_string());

    if let Some(origin) = origin {
        report = report.with_label(
            Label::new(filespan)
                .with_message(format!("raised in {}", origin.scope))
                .with_color(colors.next()),
        );
    }

    for entry in exception.trace.iter().skip(1) {
        report = report.with_note(format!("called {entry}"));
    }

    report.finish()
}

/// Creates a report from a broken IR invariant.
pub fn ir_error_to_report(error: &IrError, path: &str) -> Report<'static, FileSpan> {
    let mut colors = ColorGenerator::new();
    colors.next();

    let filespan = FileSpan::from_span(path, error.span());
    let code = match error {
        IrError::UndefinedLabel { .. } => "UndefinedLabel",
        IrError::DuplicateLabel { .. } => "DuplicateLabel",
        IrError::TempOutOfRange { .. } => "TempOutOfRange",
        IrError::ReservedSelfSlot { .. } => "ReservedSelfSlot",
        IrError::NotACallSite { .. } => "NotACallSite",
        IrError::InvalidValueMapping { .. } => "InvalidValueMapping",
    };

    let mut report = Report::build(ReportKind::Error, filespan.clone())
        .with_code(code)
        .with_message("Invalid IR.");
    if error.span().is_some() {
        report = report.with_label(
            Label::new(filespan)
                .with_message(error.to_string())
                .with_color(colors.next()),
        );
    } else {
        report = report.with_note(error.to_string());
    }
    report.finish()
}
