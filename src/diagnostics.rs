//! Diagnostic and fix-it data model, plus the append-only sink.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::source::{Range, Span};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Hint,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Hint => write!(f, "hint"),
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single text edit: replace the bytes of `span` with `new_text`.
///
/// The span always matches the replaced code's span exactly; edits attached
/// to one diagnostic never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// File to edit.
    pub file: PathBuf,
    /// Byte range being replaced.
    pub span: Span,
    /// Human-readable location of the replaced range.
    pub range: Range,
    /// Replacement text (empty string deletes the range).
    pub new_text: String,
}

/// A suggested fix: one or more edits applied together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fix {
    /// Description of what the fix does.
    pub message: String,
    pub edits: Vec<Edit>,
}

impl Fix {
    pub fn new(message: impl Into<String>, edits: Vec<Edit>) -> Self {
        Self {
            message: message.into(),
            edits,
        }
    }
}

/// One reported finding: location, message, and optionally a fix.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// The check that produced this diagnostic.
    pub check: crate::checks::CheckCode,
    pub severity: Severity,
    pub file: PathBuf,
    pub range: Range,
    /// Byte span anchoring the diagnostic, used for deterministic ordering.
    pub span: Span,
    pub message: String,
    pub fix: Option<Fix>,
}

/// Append-only destination for diagnostics.
///
/// The engine only ever appends; readers consume after a run completes.
/// Implementations must serialize concurrent appends themselves -- files
/// are analyzed in parallel and each translation unit reports directly.
pub trait DiagnosticSink: Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Sink that collects diagnostics into memory behind a mutex.
#[derive(Debug, Default)]
pub struct CollectingSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the sink, yielding diagnostics sorted by file then source
    /// position so output is deterministic regardless of worker scheduling.
    pub fn into_sorted(self) -> Vec<Diagnostic> {
        let mut diagnostics = self.diagnostics.into_inner().unwrap_or_else(|e| e.into_inner());
        diagnostics.sort_by(|a, b| {
            a.file
                .cmp(&b.file)
                .then(a.span.start.cmp(&b.span.start))
                .then(a.span.end.cmp(&b.span.end))
        });
        diagnostics
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(diagnostic);
    }
}
