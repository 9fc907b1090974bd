//! Diagnostics
//!
//! The checker accumulates [`Diagnostic`]s into an [`ErrorReport`] and
//! keeps going; nothing here aborts. A diagnostic has a severity, a
//! primary message anchored at a source span, and optionally further
//! anchored notes (e.g. the literal that closes a negation cycle).
//!
//! Rendering goes through `ariadne` given a source cache; the report type
//! itself is plain data so tests can assert on it directly.

use ariadne::{Label, Report, ReportKind};
use datalog_ast::{Span, SrcId};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A secondary message anchored at its own span
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    pub notes: Vec<Note>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            span,
            notes: Vec::new(),
        }
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            span,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, message: impl Into<String>, span: Span) -> Self {
        self.notes.push(Note {
            message: message.into(),
            span,
        });
        self
    }
}

/// Sink the checker writes diagnostics into
#[derive(Debug, Clone, Default)]
pub struct ErrorReport {
    diagnostics: Vec<Diagnostic>,
}

impl ErrorReport {
    pub fn new() -> Self {
        ErrorReport::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn error(&mut self, message: impl Into<String>, span: Span) {
        self.add(Diagnostic::error(message, span));
    }

    pub fn warning(&mut self, message: impl Into<String>, span: Span) {
        self.add(Diagnostic::warning(message, span));
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// Whether any error-severity diagnostic was emitted; errors gate the
    /// rewriting pipeline
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Render every diagnostic through ariadne
    pub fn write(
        &self,
        cache: &mut impl ariadne::Cache<SrcId>,
        out: &mut impl io::Write,
    ) -> io::Result<()> {
        for diagnostic in &self.diagnostics {
            let kind = match diagnostic.severity {
                Severity::Error => ReportKind::Error,
                Severity::Warning => ReportKind::Warning,
            };
            let mut builder = Report::build(kind, diagnostic.span.src(), diagnostic.span.start())
                .with_message(&diagnostic.message)
                .with_label(Label::new(diagnostic.span).with_message(&diagnostic.message));
            for note in &diagnostic.notes {
                builder = builder.with_label(Label::new(note.span).with_message(&note.message));
            }
            builder.finish().write(&mut *cache, &mut *out)?;
        }
        Ok(())
    }
}
