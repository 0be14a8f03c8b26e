//! Run reports and the recoverable diagnostics they carry.
//!
//! Pipelines never stop on a recoverable failure. They record a
//! [`Diagnostic`] naming the affected bucket, design document or document key
//! and move on to the next unit of work. The CLI prints the report at the end
//! of the run.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Bucket directory without `config.json`.
    MissingConfiguration,
    /// `config.json` present but not valid.
    ParseError,
    /// The remote store rejected a create-bucket or insert-design request.
    WriteFailure,
    /// A local file or directory could not be read or written.
    LocalIo,
    /// A bucket could not be opened or its design documents listed.
    BucketUnavailable,
    /// Removing a design document failed for a reason other than absence.
    DeleteFailure,
    /// A single exported document could not be fetched or written.
    PerDocumentFailure,
}

/// One recoverable failure, surfaced to the operator as its own record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// Bucket, `bucket/design` or document key the failure is about.
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(kind: DiagnosticKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn error(kind: DiagnosticKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
        };
        write!(f, "[{level}] {:?} {}: {}", self.kind, self.subject, self.message)
    }
}

/// Outcome of a push run.
#[derive(Debug, Default)]
pub struct PushReport {
    /// Buckets created because no remote counterpart existed.
    pub created_buckets: Vec<String>,
    /// `(bucket, design)` pairs inserted successfully.
    pub replaced_designs: Vec<(String, String)>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome of a pull run.
#[derive(Debug, Default)]
pub struct PullReport {
    pub buckets: Vec<PulledBucket>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct PulledBucket {
    pub name: String,
    pub path: PathBuf,
    pub design_documents: usize,
    pub views: usize,
}

/// Outcome of an export run.
#[derive(Debug, Default)]
pub struct ExportReport {
    /// Number of row identifiers the query returned.
    pub requested: usize,
    pub written: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ExportReport {
    pub fn failed(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::PerDocumentFailure)
            .count()
    }
}
