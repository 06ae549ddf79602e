//! Shared domain types for the intacc workspace: spans, diagnostics, the
//! error taxonomy, accessibility classification, and the validated
//! configuration value.

pub mod accessibility;
pub mod diagnostics;
pub mod error;
pub mod options;
pub mod span;
pub mod symbols;

pub use accessibility::Accessibility;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{
    CompileError, ConfigError, EmissionError, LexerError, ParseError, ParseErrorKind, ParseErrors,
    ReferenceError, SourceReadError,
};
pub use options::{LanguageLevel, OptimizationLevel, Options, TargetKind};
pub use span::Span;
pub use symbols::TypeKind;
