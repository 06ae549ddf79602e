//! Abstract Syntax Tree (AST) for the C# subset.
//!
//! This module provides:
//! - AST node definitions for declarations
//! - A recovering parser producing trees plus collected errors
//! - Error types re-exported from the core crate
//!
//! # Example
//!
//! ```
//! use intacc_parser::Parser;
//! use bumpalo::Bump;
//!
//! let arena = Bump::new();
//! let source = r#"
//!     namespace Acme {
//!         internal class Widget {
//!             public int Count { get; set; }
//!         }
//!     }
//! "#;
//!
//! let (unit, errors) = Parser::parse(source, &[], &arena);
//! assert!(errors.is_empty());
//! assert_eq!(unit.items().len(), 1);
//! ```

pub mod decl;
mod parser;

pub use intacc_core::{ParseError, ParseErrorKind, ParseErrors};

pub use decl::*;
pub use parser::Parser;

/// A parsed source file.
///
/// The unit borrows from an arena allocator. All AST nodes are allocated in
/// the arena and remain valid for the lifetime of the arena, so the units of
/// a whole compilation can share one arena.
#[derive(Debug)]
pub struct CompilationUnit<'ast> {
    items: &'ast [Item<'ast>],
    span: intacc_core::Span,
}

impl<'ast> CompilationUnit<'ast> {
    pub(crate) fn new(items: &'ast [Item<'ast>], span: intacc_core::Span) -> Self {
        Self { items, span }
    }

    /// Get the top-level items in this unit.
    pub fn items(&self) -> &[Item<'ast>] {
        self.items
    }

    /// Get the source location span of this unit.
    pub fn span(&self) -> intacc_core::Span {
        self.span
    }

    /// Assembly-level attributes, at the top level or inside namespaces.
    ///
    /// C# only permits them before any declaration, but the rewriter wants
    /// to see every grant the author wrote, so the walk is forgiving.
    pub fn assembly_attrs(&self) -> Vec<&AssemblyAttrDecl<'ast>> {
        fn walk<'a, 'ast>(items: &'a [Item<'ast>], out: &mut Vec<&'a AssemblyAttrDecl<'ast>>) {
            for item in items {
                match item {
                    Item::AssemblyAttr(attr) => out.push(attr),
                    Item::Namespace(ns) => walk(ns.items, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(self.items, &mut out);
        out
    }

    /// All type declarations, recursing into namespaces (not into nested
    /// types; callers that need those walk `TypeDecl::nested` themselves).
    pub fn types(&self) -> Vec<&TypeDecl<'ast>> {
        fn walk<'a, 'ast>(items: &'a [Item<'ast>], out: &mut Vec<&'a TypeDecl<'ast>>) {
            for item in items {
                match item {
                    Item::Type(decl) => out.push(decl),
                    Item::Namespace(ns) => walk(ns.items, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(self.items, &mut out);
        out
    }
}
