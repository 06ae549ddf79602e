//! Unified error types for the compilation pipeline.
//!
//! ## Error hierarchy
//!
//! ```text
//! CompileError (top-level wrapper)
//! ├── ConfigError      - invalid options, rejected before any work begins
//! ├── SourceReadError  - an input file could not be read (fatal)
//! ├── ReferenceError   - a referenced module could not be loaded (fatal)
//! └── EmissionError    - the backend refused to produce output (fatal)
//! ```
//!
//! Lexer and parse problems deliberately do NOT appear here: the front-end
//! always produces a tree and surfaces them as diagnostics, so the user sees
//! every syntax error of a run at once. [`LexerError`] and [`ParseError`]
//! exist for the front-end's internal accounting before that conversion.

use std::path::PathBuf;

use thiserror::Error;

use crate::span::Span;

// ============================================================================
// Lexer errors
// ============================================================================

/// Errors that occur during tokenization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexerError {
    #[error("unexpected character '{ch}' at {span}")]
    UnexpectedChar { ch: char, span: Span },

    #[error("unterminated string literal at {span}")]
    UnterminatedString { span: Span },

    #[error("unterminated character literal at {span}")]
    UnterminatedChar { span: Span },

    #[error("unterminated comment at {span}")]
    UnterminatedComment { span: Span },
}

impl LexerError {
    /// Get the span where this error occurred.
    pub fn span(&self) -> Span {
        match self {
            LexerError::UnexpectedChar { span, .. } => *span,
            LexerError::UnterminatedString { span } => *span,
            LexerError::UnterminatedChar { span } => *span,
            LexerError::UnterminatedComment { span } => *span,
        }
    }
}

// ============================================================================
// Parse errors
// ============================================================================

/// Categories of parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// A specific token was expected but not found.
    ExpectedToken,
    /// An unexpected token was encountered.
    UnexpectedToken,
    /// Unexpected end of file.
    UnexpectedEof,
    /// An identifier was expected.
    ExpectedIdentifier,
    /// A declaration was expected.
    ExpectedDeclaration,
    /// A type member was expected.
    ExpectedMember,
    /// Conflicting or repeated modifiers.
    ConflictingModifiers,
    /// Malformed attribute list.
    InvalidAttribute,
    /// Malformed preprocessor directive.
    InvalidDirective,
    /// `#endif`/`#else`/`#elif` without a matching `#if`.
    UnbalancedDirective,
    /// `#if` region never closed.
    UnterminatedDirective,
    /// Error reported by the lexer.
    LexError,
}

impl ParseErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseErrorKind::ExpectedToken => "expected token",
            ParseErrorKind::UnexpectedToken => "unexpected token",
            ParseErrorKind::UnexpectedEof => "unexpected end of file",
            ParseErrorKind::ExpectedIdentifier => "expected identifier",
            ParseErrorKind::ExpectedDeclaration => "expected declaration",
            ParseErrorKind::ExpectedMember => "expected member",
            ParseErrorKind::ConflictingModifiers => "conflicting modifiers",
            ParseErrorKind::InvalidAttribute => "invalid attribute",
            ParseErrorKind::InvalidDirective => "invalid preprocessor directive",
            ParseErrorKind::UnbalancedDirective => "unbalanced preprocessor directive",
            ParseErrorKind::UnterminatedDirective => "unterminated conditional directive",
            ParseErrorKind::LexError => "lexical error",
        }
    }
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parse error with location and context.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct ParseError {
    /// The category of this error.
    pub kind: ParseErrorKind,
    /// Where the error occurred.
    pub span: Span,
    /// A detailed message.
    pub message: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
        }
    }

    pub fn expected_token(span: Span, expected: &str, found: &str) -> Self {
        Self::new(
            ParseErrorKind::ExpectedToken,
            span,
            format!("expected {expected}, found {found}"),
        )
    }

    pub fn unexpected_token(span: Span, token: &str) -> Self {
        Self::new(
            ParseErrorKind::UnexpectedToken,
            span,
            format!("unexpected token '{token}'"),
        )
    }

    pub fn unexpected_eof(span: Span) -> Self {
        Self::new(ParseErrorKind::UnexpectedEof, span, "unexpected end of file")
    }

    pub fn expected_identifier(span: Span, found: &str) -> Self {
        Self::new(
            ParseErrorKind::ExpectedIdentifier,
            span,
            format!("expected identifier, found {found}"),
        )
    }
}

impl From<LexerError> for ParseError {
    fn from(error: LexerError) -> Self {
        ParseError::new(ParseErrorKind::LexError, error.span(), error.to_string())
    }
}

/// A collection of parse errors, accumulated while the parser recovers and
/// keeps going.
#[derive(Debug, Clone, Default)]
pub struct ParseErrors {
    errors: Vec<ParseError>,
}

impl ParseErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn push(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParseError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<ParseError> {
        self.errors
    }
}

impl IntoIterator for ParseErrors {
    type Item = ParseError;
    type IntoIter = std::vec::IntoIter<ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

// ============================================================================
// Configuration errors
// ============================================================================

/// Invalid or conflicting options, rejected before any compilation work.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("output path must not be empty")]
    EmptyOutputPath,

    #[error("at least one input path is required")]
    NoInputs,

    #[error("'{name}' is not a valid assembly name")]
    InvalidAssemblyName { name: String },

    #[error("'{name}' is not a valid preprocessor symbol")]
    InvalidDefine { name: String },
}

// ============================================================================
// Source read errors
// ============================================================================

/// An input file could not be read. Fatal: with no text there is no tree to
/// analyze, so the pipeline aborts before computing any diagnostic.
#[derive(Debug, Error)]
#[error("cannot read source file '{}'", path.display())]
pub struct SourceReadError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

// ============================================================================
// Reference errors
// ============================================================================

/// A referenced module could not be loaded. Fatal before emission: a stale
/// or absent reference would produce silently wrong bindings.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("cannot read referenced module '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("referenced module '{}' is malformed: {detail}", path.display())]
    Format { path: PathBuf, detail: String },
}

impl ReferenceError {
    /// The reference path this error is about.
    pub fn path(&self) -> &PathBuf {
        match self {
            ReferenceError::Io { path, .. } => path,
            ReferenceError::Format { path, .. } => path,
        }
    }
}

// ============================================================================
// Emission errors
// ============================================================================

/// The backend refused to produce output despite no prior error diagnostic.
#[derive(Debug, Error)]
pub enum EmissionError {
    #[error("cannot write output '{}'", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("emission attempted in state {state}")]
    WrongState { state: &'static str },
}

// ============================================================================
// Unified error type
// ============================================================================

/// The top-level error for a whole invocation.
///
/// Everything here is fatal; ordinary semantic problems travel through the
/// diagnostics channel instead.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    SourceRead(#[from] SourceReadError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Emission(#[from] EmissionError),
}
