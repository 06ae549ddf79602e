//! Declaration AST nodes for the C# subset.
//!
//! Provides nodes for everything the accessibility analysis needs:
//! - Using directives
//! - Assembly-level attributes (`[assembly: InternalsVisibleTo("...")]`)
//! - Namespaces
//! - Type declarations (class, struct, interface, enum, delegate)
//! - Members, reduced to a signature plus a skipped body

use std::fmt;

use bitflags::bitflags;

use intacc_core::{Accessibility, Span, TypeKind};

/// An identifier with its source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident<'ast> {
    pub text: &'ast str,
    pub span: Span,
}

impl<'ast> Ident<'ast> {
    pub fn new(text: &'ast str, span: Span) -> Self {
        Self { text, span }
    }
}

impl fmt::Display for Ident<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text)
    }
}

/// A dotted name such as `System.Runtime.CompilerServices`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualifiedName<'ast> {
    pub parts: &'ast [Ident<'ast>],
}

impl<'ast> QualifiedName<'ast> {
    pub fn new(parts: &'ast [Ident<'ast>]) -> Self {
        Self { parts }
    }

    /// Last segment, e.g. `InternalsVisibleTo` in the fully qualified form.
    pub fn last(&self) -> Option<&Ident<'ast>> {
        self.parts.last()
    }

    pub fn span(&self) -> Span {
        match (self.parts.first(), self.parts.last()) {
            (Some(first), Some(last)) => first.span.merge(last.span),
            _ => Span::default(),
        }
    }
}

impl fmt::Display for QualifiedName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(part.text)?;
        }
        Ok(())
    }
}

bitflags! {
    /// Non-accessibility modifiers on a type or member declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u16 {
        const STATIC   = 1 << 0;
        const ABSTRACT = 1 << 1;
        const SEALED   = 1 << 2;
        const PARTIAL  = 1 << 3;
        const READONLY = 1 << 4;
        const UNSAFE   = 1 << 5;
        const NEW      = 1 << 6;
        const CONST    = 1 << 7;
    }
}

/// A top-level or namespace-level item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Item<'ast> {
    Using(UsingDecl<'ast>),
    AssemblyAttr(AssemblyAttrDecl<'ast>),
    Namespace(NamespaceDecl<'ast>),
    Type(TypeDecl<'ast>),
}

impl Item<'_> {
    /// Get the span of this item.
    pub fn span(&self) -> Span {
        match self {
            Self::Using(d) => d.span,
            Self::AssemblyAttr(d) => d.span,
            Self::Namespace(d) => d.span,
            Self::Type(d) => d.span,
        }
    }
}

/// A `using` directive.
///
/// Examples:
/// - `using System;`
/// - `using static System.Math;`
/// - `using Alias = Some.Type;`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsingDecl<'ast> {
    pub name: QualifiedName<'ast>,
    /// `using static ...`
    pub is_static: bool,
    /// Alias target for `using Alias = Name;`
    pub alias: Option<Ident<'ast>>,
    pub span: Span,
}

/// An assembly-level attribute, `[assembly: Name("argument")]`.
///
/// Only the attribute name and a single string argument are retained;
/// that is all the grant scan needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblyAttrDecl<'ast> {
    pub name: QualifiedName<'ast>,
    /// First string-literal argument, unquoted.
    pub argument: Option<&'ast str>,
    pub span: Span,
}

impl AssemblyAttrDecl<'_> {
    /// Whether this attribute grants internal access, matching both the
    /// short and fully qualified attribute names.
    pub fn is_internal_access_grant(&self) -> bool {
        matches!(
            self.name.last().map(|id| id.text),
            Some("InternalsVisibleTo") | Some("InternalsVisibleToAttribute")
        )
    }
}

/// A namespace declaration with nested items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NamespaceDecl<'ast> {
    pub name: QualifiedName<'ast>,
    pub items: &'ast [Item<'ast>],
    /// File-scoped form, `namespace Foo;`
    pub is_file_scoped: bool,
    pub span: Span,
}

/// A type declaration (class, struct, interface, enum, or delegate).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeDecl<'ast> {
    pub kind: TypeKind,
    /// Accessibility written in source, if any.
    pub declared_accessibility: Option<Accessibility>,
    pub modifiers: Modifiers,
    pub name: Ident<'ast>,
    /// Base type and interfaces after the `:`.
    pub bases: &'ast [QualifiedName<'ast>],
    pub members: &'ast [MemberDecl<'ast>],
    /// Nested type declarations.
    pub nested: &'ast [TypeDecl<'ast>],
    pub span: Span,
}

impl TypeDecl<'_> {
    /// Effective accessibility of a top-level type; C# defaults to internal.
    pub fn effective_accessibility(&self) -> Accessibility {
        self.declared_accessibility
            .unwrap_or(Accessibility::Internal)
    }

    /// Effective accessibility when nested inside `enclosing`.
    pub fn effective_nested_accessibility(&self, enclosing: Accessibility) -> Accessibility {
        self.declared_accessibility
            .unwrap_or(Accessibility::Private)
            .constrained_by(enclosing)
    }

    /// Whether anything in this type (or a nested type) uses unsafe code.
    pub fn contains_unsafe(&self) -> bool {
        self.modifiers.contains(Modifiers::UNSAFE)
            || self.members.iter().any(|m| m.uses_unsafe())
            || self.nested.iter().any(|t| t.contains_unsafe())
    }
}

/// What kind of member a declaration is, at the level of detail the
/// analysis needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Method,
    Property,
    EnumVariant,
}

/// A member declaration. Bodies are skipped during parsing; only the
/// signature and an unsafe marker survive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemberDecl<'ast> {
    pub kind: MemberKind,
    pub declared_accessibility: Option<Accessibility>,
    pub modifiers: Modifiers,
    pub name: Ident<'ast>,
    /// Whether the skipped body contained an `unsafe` or `fixed` token.
    pub body_has_unsafe: bool,
    pub span: Span,
}

impl MemberDecl<'_> {
    /// Effective accessibility; members default to private.
    pub fn effective_accessibility(&self) -> Accessibility {
        self.declared_accessibility.unwrap_or(Accessibility::Private)
    }

    pub fn uses_unsafe(&self) -> bool {
        self.modifiers.contains(Modifiers::UNSAFE) || self.body_has_unsafe
    }
}
