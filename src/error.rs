//! Error reporting and diagnostics for the resolution pipeline.
//!
//! Every fallible stage of resolution produces a structured diagnostic with
//! a source location, a message naming the offending identifier, and
//! optional secondary labels ("first defined here") and hints.
//!
//! # Design
//!
//! - `CompileError` — single diagnostic with primary and optional secondary spans
//! - `ErrorKind` — categorizes errors by the check that detected them
//! - `Severity` — error, warning, or note
//! - `DiagnosticFormatter` — formats diagnostics with source snippets
//!
//! # Examples
//!
//! ```
//! # use props_core::error::*;
//! # use props_core::foundation::Span;
//! # let span = Span::new(0, 0, 5, 1);
//! let error = CompileError::new(
//!     ErrorKind::DuplicateIdentifier,
//!     span,
//!     "duplicated identifier \"step\"".to_string(),
//! );
//! ```

use crate::foundation::{SourceMap, Span};
use std::fmt;

/// Resolution diagnostic with source location and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Category of this error
    pub kind: ErrorKind,
    /// Severity level
    pub severity: Severity,
    /// Primary source location
    pub span: Span,
    /// Primary error message
    pub message: String,
    /// Additional labeled spans
    pub labels: Vec<Label>,
    /// Additional notes or hints
    pub notes: Vec<String>,
}

/// Category of resolution error.
///
/// # Invariant
///
/// The discriminant values must match the ERROR_KIND_NAMES array indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    /// Same name claimed twice within one scope
    DuplicateIdentifier = 0,
    /// Local name collides with a model-scope name, or a property name
    /// collides with a label name
    NameClash = 1,
    /// Formula or constant definitions form a reference cycle
    CyclicDependency = 2,
    /// Reference to a name not found in any visible scope
    UnresolvedIdentifier = 3,
    /// Undefined constant absent from the supplied values
    MissingConstantValue = 4,
    /// Type mismatch in an expression or constant declaration
    TypeMismatch = 5,
    /// Domain well-formedness rule violated
    Semantic = 6,
    /// Caller contract violated (bug in the caller, not in user input)
    Internal = 7,
}

/// Human-readable names for error kinds.
///
/// Index matches ErrorKind discriminant.
const ERROR_KIND_NAMES: &[&str] = &[
    "duplicate identifier",   // 0: DuplicateIdentifier
    "name clash",             // 1: NameClash
    "cyclic dependency",      // 2: CyclicDependency
    "unresolved identifier",  // 3: UnresolvedIdentifier
    "missing constant value", // 4: MissingConstantValue
    "type mismatch",          // 5: TypeMismatch
    "semantic error",         // 6: Semantic
    "internal error",         // 7: Internal
];

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational note (not an error)
    Note,
    /// Warning (input is valid but suspicious)
    Warning,
    /// Error (resolution cannot proceed)
    Error,
}

/// Secondary labeled span in a diagnostic.
///
/// Used to point to related code locations (e.g., "first defined here").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Source location
    pub span: Span,
    /// Label text
    pub message: String,
}

impl CompileError {
    /// Creates a new error diagnostic with severity `Error`.
    pub fn new(kind: ErrorKind, span: Span, message: String) -> Self {
        Self::with_severity(kind, Severity::Error, span, message)
    }

    /// Creates a new warning diagnostic.
    pub fn warning(kind: ErrorKind, span: Span, message: String) -> Self {
        Self::with_severity(kind, Severity::Warning, span, message)
    }

    /// Creates a new note diagnostic.
    pub fn note(kind: ErrorKind, span: Span, message: String) -> Self {
        Self::with_severity(kind, Severity::Note, span, message)
    }

    fn with_severity(kind: ErrorKind, severity: Severity, span: Span, message: String) -> Self {
        Self {
            kind,
            severity,
            span,
            message,
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Adds a secondary labeled span (for chaining).
    pub fn with_label(mut self, span: Span, message: String) -> Self {
        self.labels.push(Label { span, message });
        self
    }

    /// Adds a note or hint (for chaining).
    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }
}

impl ErrorKind {
    /// Returns a human-readable name for this error kind.
    pub fn name(self) -> &'static str {
        ERROR_KIND_NAMES[self as usize]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {}",
            self.severity,
            self.kind.name(),
            self.message
        )
    }
}

impl std::error::Error for CompileError {}

/// Result type for resolution operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// Formats diagnostics with source code context.
///
/// Produces rich error messages with:
/// - File path and line/column location
/// - Source code snippet
/// - Visual indicators (^^^) under error spans
/// - Secondary labels
/// - Notes and hints
pub struct DiagnosticFormatter<'a> {
    sources: &'a SourceMap,
}

impl<'a> DiagnosticFormatter<'a> {
    /// Creates a new diagnostic formatter over a source map.
    pub fn new(sources: &'a SourceMap) -> Self {
        Self { sources }
    }

    /// Formats a diagnostic as a string with source context.
    pub fn format(&self, error: &CompileError) -> String {
        let mut output = String::new();

        // Header: severity and message
        output.push_str(&format!(
            "{}: {}: {}\n",
            error.severity,
            error.kind.name(),
            error.message
        ));

        // Location and snippet
        let file_path = self.sources.file_path(&error.span);
        let (line, col) = self.sources.line_col(&error.span);
        output.push_str(&format!("  --> {}:{}:{}\n", file_path.display(), line, col));

        let file = self.sources.file(&error.span);
        if let Some(source_line) = file.line_text(line) {
            output.push_str("   |\n");
            output.push_str(&format!("{:3} | {}\n", line, source_line));

            // Underline
            let start_col = col as usize;
            let span_len = (error.span.end - error.span.start) as usize;
            let end_col = (start_col + span_len).min(source_line.len() + 1);
            let underline = " ".repeat(start_col.saturating_sub(1))
                + &"^".repeat(end_col.saturating_sub(start_col).max(1));
            output.push_str(&format!("   | {}\n", underline));
        }

        // Secondary labels
        for label in &error.labels {
            output.push_str(&format!("   = note: {}\n", label.message));

            let (label_line, label_col) = self.sources.line_col(&label.span);
            let label_path = self.sources.file_path(&label.span);
            output.push_str(&format!(
                "     at {}:{}:{}\n",
                label_path.display(),
                label_line,
                label_col
            ));
        }

        // Notes
        for note in &error.notes {
            output.push_str(&format!("   = help: {}\n", note));
        }

        output
    }

    /// Formats multiple diagnostics separated by blank lines.
    pub fn format_all(&self, errors: &[CompileError]) -> String {
        errors
            .iter()
            .map(|e| self.format(e))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
