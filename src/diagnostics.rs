//! Diagnostic accumulation for the Czar compiler
//!
//! Every stage (lexer, parser, type checker) pushes into a shared list and
//! keeps going rather than aborting on the first problem, so a single `cz`
//! invocation can surface more than one mistake. Compilation only actually
//! halts at a stage boundary, and only if the list contains an error.

use std::fmt;
use std::path::{Path, PathBuf};

/// Severity of a single diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single compiler diagnostic: `FILE:LINE:COL: severity: message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn error(file: impl Into<PathBuf>, line: usize, column: usize, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            file: file.into(),
            line,
            column,
            message: message.into(),
        }
    }

    pub fn warning(file: impl Into<PathBuf>, line: usize, column: usize, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            file: file.into(),
            line,
            column,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.file.display(),
            self.line,
            self.column,
            self.severity,
            self.message
        )
    }
}

/// Accumulator threaded through lexing, parsing, and type checking.
///
/// Clustered by discovery order, never by file (a single invocation only
/// ever sees one file), matching the propagation policy in the spec:
/// stages accumulate and continue, the driver aborts between stages only
/// when [`Diagnostics::has_errors`] is true.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn error(&mut self, file: &Path, line: usize, column: usize, message: impl Into<String>) {
        self.push(Diagnostic::error(file.to_path_buf(), line, column, message));
    }

    pub fn warning(&mut self, file: &Path, line: usize, column: usize, message: impl Into<String>) {
        self.push(Diagnostic::warning(file.to_path_buf(), line, column, message));
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_error)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    /// Print every diagnostic to stderr, one per line.
    pub fn print(&self) {
        for diag in &self.entries {
            eprintln!("{diag}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_has_no_errors() {
        let diags = Diagnostics::new();
        assert!(!diags.has_errors());
        assert!(diags.is_empty());
    }

    #[test]
    fn warnings_do_not_count_as_errors() {
        let mut diags = Diagnostics::new();
        diags.warning(Path::new("a.cz"), 1, 1, "mut ignored");
        assert!(!diags.has_errors());
    }

    #[test]
    fn one_error_trips_has_errors() {
        let mut diags = Diagnostics::new();
        diags.warning(Path::new("a.cz"), 1, 1, "mut ignored");
        diags.error(Path::new("a.cz"), 2, 5, "undefined identifier 'x'");
        assert!(diags.has_errors());
    }

    #[test]
    fn display_format_matches_file_line_col_severity_message() {
        let d = Diagnostic::error("a.cz", 3, 7, "type mismatch");
        assert_eq!(format!("{d}"), "a.cz:3:7: error: type mismatch");
    }
}
