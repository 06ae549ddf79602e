//! C# subset parser crate.
//!
//! This crate provides the front half of the pipeline: preprocessing,
//! lexing, and declaration-level parsing of C# source files. It includes:
//! - Conditional-compilation preprocessing (`#if`/`#define`)
//! - Lexical analysis (tokenization)
//! - Abstract Syntax Tree (AST) definitions for declarations
//! - A recovering parser that always produces a tree
//!
//! # Example
//!
//! ```
//! use intacc_parser::Parser;
//! use bumpalo::Bump;
//!
//! let arena = Bump::new();
//! let source = r#"
//!     [assembly: InternalsVisibleTo("Acme.Tests")]
//!
//!     namespace Acme {
//!         internal class Widget {
//!             public int Count { get; set; }
//!         }
//!     }
//! "#;
//!
//! let (unit, errors) = Parser::parse(source, &[], &arena);
//! assert!(errors.is_empty());
//! assert_eq!(unit.assembly_attrs().len(), 1);
//! ```

pub mod lexer;

pub mod preprocess;

pub mod ast;

// Re-export commonly used types at crate root
pub use ast::{CompilationUnit, Parser};
pub use lexer::{Lexer, Token, TokenKind};
pub use preprocess::{Preprocessed, preprocess};
