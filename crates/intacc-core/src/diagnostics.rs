//! Diagnostic messages and the ordered collection the pipeline accumulates.
//!
//! Every problem the analyzer finds is reported as a [`Diagnostic`] rather
//! than an error return, so a single run surfaces everything at once. Only
//! error severity suppresses emission and flips the exit code.

use std::collections::VecDeque;
use std::fmt;

use crate::span::Span;

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{text}")
    }
}

/// A single diagnostic emitted during analysis or emission.
///
/// Formats as `path:line:col: severity: message`, dropping the location
/// parts that are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The message text.
    pub message: String,
    /// The originating source path, if any.
    pub path: Option<String>,
    /// The source location, if any.
    pub span: Option<Span>,
}

impl Diagnostic {
    /// Create a diagnostic with a full source location.
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        path: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            path: Some(path.into()),
            span: Some(span),
        }
    }

    /// Create a diagnostic with no source location.
    pub fn bare(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            path: None,
            span: None,
        }
    }

    pub fn error(message: impl Into<String>, path: impl Into<String>, span: Span) -> Self {
        Self::new(Severity::Error, message, path, span)
    }

    pub fn warning(message: impl Into<String>, path: impl Into<String>, span: Span) -> Self {
        Self::new(Severity::Warning, message, path, span)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::bare(Severity::Info, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, &self.span) {
            (Some(path), Some(span)) => {
                write!(f, "{}:{}: {}: {}", path, span, self.severity, self.message)
            }
            (Some(path), None) => write!(f, "{}: {}: {}", path, self.severity, self.message),
            (None, Some(span)) => write!(f, "{}: {}: {}", span, self.severity, self.message),
            (None, None) => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// An ordered collection of diagnostics.
///
/// Order is exactly insertion order; the reporter depends on this for
/// deterministic logs.
#[derive(Debug, Default)]
pub struct Diagnostics {
    diagnostics: VecDeque<Diagnostic>,
    has_errors: bool,
}

impl Diagnostics {
    /// Create a new, empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic, tracking whether any error has been seen.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Error {
            self.has_errors = true;
        }
        self.diagnostics.push_back(diagnostic);
    }

    /// Append every diagnostic from `iter`, preserving order.
    pub fn extend(&mut self, iter: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in iter {
            self.push(diagnostic);
        }
    }

    /// Whether any error-severity diagnostic has been recorded.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// Write all diagnostics to `writer`, one line each, in order.
    pub fn emit<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for diagnostic in &self.diagnostics {
            writeln!(writer, "{diagnostic}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_full_location() {
        let d = Diagnostic::error("unexpected token", "Foo.cs", Span::new(10, 5, 1));
        assert_eq!(d.to_string(), "Foo.cs:10:5: error: unexpected token");
    }

    #[test]
    fn display_without_span() {
        let d = Diagnostic::bare(Severity::Info, "granting internal access to 'Consumer'");
        assert_eq!(d.to_string(), "info: granting internal access to 'Consumer'");
    }

    #[test]
    fn error_tracking() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning("w", "a.cs", Span::point(1, 1)));
        assert!(!diags.has_errors());
        diags.push(Diagnostic::error("e", "a.cs", Span::point(2, 1)));
        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warning_count(), 1);
    }

    #[test]
    fn emit_preserves_order() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::error("first", "a.cs", Span::point(1, 1)));
        diags.push(Diagnostic::error("second", "a.cs", Span::point(2, 1)));

        let mut out = Vec::new();
        diags.emit(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("first"));
        assert!(lines[1].contains("second"));
    }
}
