//! Translation diagnostics and their aggregation.
//!
//! The translator records problems instead of stopping at the first one. When
//! the report turns out to be fatal, [`aggregate`] folds every entry, in the
//! order it was recorded, into a single [`TranslationFailure`] so one run shows
//! every defect in the document.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// Informational note
    Info,
    /// Recoverable problem; output is still usable unless translating strictly
    Warning,
    /// Output must not be used
    Error,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiagnosticKind::Info => "info",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Error => "error",
        })
    }
}

/// One issue discovered while translating a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationDiagnostic {
    /// Severity
    pub kind: DiagnosticKind,
    /// Location in the source document, e.g. `$.storage.files.0.path`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Human-readable description
    pub message: String,
}

impl fmt::Display for TranslationDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} at {}: {}", self.kind, path, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Ordered diagnostics from one translation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationReport {
    entries: Vec<TranslationDiagnostic>,
    strict: bool,
}

impl TranslationReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty report in which warnings are fatal
    pub fn strict() -> Self {
        Self {
            entries: Vec::new(),
            strict: true,
        }
    }

    /// Record a diagnostic
    pub fn push(&mut self, kind: DiagnosticKind, path: Option<String>, message: impl Into<String>) {
        self.entries.push(TranslationDiagnostic {
            kind,
            path,
            message: message.into(),
        });
    }

    /// Record an error at a document path
    pub fn error(&mut self, path: &str, message: impl Into<String>) {
        self.push(DiagnosticKind::Error, Some(path.to_string()), message);
    }

    /// Record a warning at a document path
    pub fn warning(&mut self, path: &str, message: impl Into<String>) {
        self.push(DiagnosticKind::Warning, Some(path.to_string()), message);
    }

    /// Record an informational note at a document path
    pub fn info(&mut self, path: &str, message: impl Into<String>) {
        self.push(DiagnosticKind::Info, Some(path.to_string()), message);
    }

    /// Diagnostics in recorded order
    pub fn entries(&self) -> &[TranslationDiagnostic] {
        &self.entries
    }

    /// Whether the report has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether warnings count as fatal
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Whether the translated output must not be used
    pub fn is_fatal(&self) -> bool {
        self.entries.iter().any(|entry| self.entry_is_fatal(entry))
    }

    fn entry_is_fatal(&self, entry: &TranslationDiagnostic) -> bool {
        match entry.kind {
            DiagnosticKind::Error => true,
            DiagnosticKind::Warning => self.strict,
            DiagnosticKind::Info => false,
        }
    }

    /// Consume the report, returning its diagnostics
    pub fn into_entries(self) -> Vec<TranslationDiagnostic> {
        self.entries
    }
}

/// One or more fatal diagnostics, reported together
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub struct TranslationFailure {
    diagnostics: Vec<TranslationDiagnostic>,
}

impl TranslationFailure {
    /// Every diagnostic from the failed translation, in recorded order
    pub fn diagnostics(&self) -> &[TranslationDiagnostic] {
        &self.diagnostics
    }
}

impl fmt::Display for TranslationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.diagnostics.len() {
            1 => writeln!(f, "1 error occurred:")?,
            n => writeln!(f, "{} errors occurred:", n)?,
        }
        for diagnostic in &self.diagnostics {
            writeln!(f, "\t* {}", diagnostic)?;
        }
        Ok(())
    }
}

/// Escalate a fatal report into a single compound error.
///
/// A non-fatal report passes through untouched so its warnings can be logged
/// by the caller. A fatal report keeps every entry, warnings included, since
/// later entries are not necessarily caused by earlier ones.
pub fn aggregate(report: TranslationReport) -> Result<TranslationReport, TranslationFailure> {
    if report.is_fatal() {
        Err(TranslationFailure {
            diagnostics: report.into_entries(),
        })
    } else {
        Ok(report)
    }
}
