//! Diagnostics: the analyser's only way of reporting a problem.
//!
//! Mirrors the source's `CompilerError` hierarchy, but as data rather than
//! as exceptions (§9 "Result-returned structured errors" design note):
//! every variant carries the fields needed to reconstruct its message,
//! never a pre-formatted string, so a host can match on `DiagnosticKind`
//! without parsing text back out of it.

use thiserror::Error;

/// Severity of a diagnostic. Errors make code generation not run for the
/// whole translation unit (§7); warnings never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// The structured payload of a diagnostic. Field names mirror the
/// source's exception constructor arguments.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DiagnosticKind {
    #[error("type hint is missing for '{symbol_id}'")]
    TypeHintMissing { symbol_id: String },

    #[error("'{type_id}' is not a valid type")]
    InvalidType { type_id: String },

    #[error("mismatched types '{expected}' and '{actual}'")]
    MismatchedTypes { expected: String, actual: String },

    #[error("unresolved reference '{symbol_id}'")]
    UnresolvedReference { symbol_id: String },

    #[error("unresolved operation: '{operation}' for type '{type_id}'")]
    UnresolvedOperation { operation: String, type_id: String },

    #[error("operation '{operation}' is not supported")]
    NotSupportedOperation { operation: String },

    #[error("too many returns for method '{method_id}'")]
    TooManyReturns { method_id: String },

    #[error("incorrect number of operands for '{operation}': expected {expected}, got {actual}")]
    IncorrectNumberOfOperands {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("unexpected argument '{argument_id}' in call to '{method_id}'")]
    UnexpectedArgument {
        method_id: String,
        argument_id: String,
    },

    #[error("argument '{argument_id}' of '{method_id}' was not filled")]
    UnfilledArgument {
        method_id: String,
        argument_id: String,
    },

    #[error("symbol '{symbol_id}' shadows a symbol from an outer scope")]
    NameShadowing { symbol_id: String },

    #[error("symbol '{symbol_id}' is declared more than once")]
    RedeclaredSymbol { symbol_id: String },
}

impl DiagnosticKind {
    /// Every variant except the two warnings (`NameShadowing`,
    /// `RedeclaredSymbol`) is an error.
    pub fn default_severity(&self) -> Severity {
        match self {
            DiagnosticKind::NameShadowing { .. } | DiagnosticKind::RedeclaredSymbol { .. } => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }
}

/// A diagnostic located at a source position, ready to render in the
/// `"<file>:<line>:<col> - <kind>: <message>"` form the external CLI
/// expects (§6.5).
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub line: u32,
    pub col: u32,
    pub severity: Severity,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(line: u32, col: u32, kind: DiagnosticKind) -> Self {
        let severity = kind.default_severity();
        Diagnostic {
            line,
            col,
            severity,
            kind,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Renders this diagnostic exactly in the form the external CLI
    /// prints verbatim: `"<file>:<line>:<col> - <kind>: <message>"`.
    pub fn render(&self, file: &str) -> String {
        format!(
            "{file}:{line}:{col} - {kind}: {message}",
            file = file,
            line = self.line,
            col = self.col,
            kind = self.severity_label(),
            message = self.kind
        )
    }

    fn severity_label(&self) -> &'static str {
        match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// The accumulated diagnostics for one translation unit, in emission
/// order. The analyser never stops at the first error (§7 "accumulate +
/// abort current sub-tree + continue siblings"): it keeps pushing into
/// this bag and lets the caller decide what to do once the whole unit has
/// been walked.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn error(&mut self, line: u32, col: u32, kind: DiagnosticKind) {
        self.push(Diagnostic::new(line, col, kind));
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Stable-sorts by `(line, col)` so diagnostics render in source order
    /// regardless of which pass (classes, events, globals, functions)
    /// reported them — the analyser visits those in a fixed category order,
    /// not necessarily the order they appear in the source.
    pub fn sort_by_position(&mut self) {
        self.0.sort_by_key(|d| (d.line, d.col));
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_matches_external_cli_format() {
        let d = Diagnostic::new(
            12,
            5,
            DiagnosticKind::UnresolvedReference {
                symbol_id: "foo".into(),
            },
        );
        assert_eq!(
            d.render("contract.py"),
            "contract.py:12:5 - error: unresolved reference 'foo'"
        );
    }

    #[test]
    fn warnings_do_not_count_as_errors() {
        let mut diags = Diagnostics::new();
        diags.error(
            1,
            1,
            DiagnosticKind::NameShadowing {
                symbol_id: "x".into(),
            },
        );
        assert!(!diags.has_errors());
        diags.error(
            2,
            1,
            DiagnosticKind::UnresolvedReference {
                symbol_id: "y".into(),
            },
        );
        assert!(diags.has_errors());
    }
}
