//! Token types for the C#-subset lexer.
//!
//! Only the tokens the declaration grammar cares about get their own kind;
//! everything else inside skipped bodies lexes as [`TokenKind::Op`] so the
//! lexer never has to reject operator soup it does not understand.

use intacc_core::Span;
use std::fmt;

/// A token from the source code.
///
/// The `'ast` lifetime refers to the arena where the lexeme string is
/// allocated. This allows the (preprocessed) source string to be freed after
/// lexing, since all string content is copied into the arena.
#[derive(Clone, Copy, PartialEq)]
pub struct Token<'ast> {
    /// The type of token.
    pub kind: TokenKind,
    /// The source text of this token (allocated in arena).
    pub lexeme: &'ast str,
    /// Location in source.
    pub span: Span,
}

impl<'ast> Token<'ast> {
    /// Create a new token.
    #[inline]
    pub fn new(kind: TokenKind, lexeme: &'ast str, span: Span) -> Self {
        Self { kind, lexeme, span }
    }

    /// Whether this token is one of the accessibility keywords.
    pub fn is_accessibility_keyword(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Public | TokenKind::Internal | TokenKind::Protected | TokenKind::Private
        )
    }

    /// Whether this token starts a type declaration (`class`, `struct`, ...).
    pub fn is_type_keyword(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Class
                | TokenKind::Struct
                | TokenKind::Interface
                | TokenKind::Enum
                | TokenKind::Delegate
        )
    }

    /// The lexeme when it carries information, the kind description
    /// otherwise. Used in parse error messages.
    pub fn describe_lexeme(&self) -> &str {
        if self.lexeme.is_empty() {
            self.kind.describe()
        } else {
            self.lexeme
        }
    }
}

impl fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?} @ {:?})", self.kind, self.lexeme, self.span)
    }
}

/// All token types the lexer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // =========================================
    // Literals
    // =========================================
    /// Numeric literal: `42`, `0xFF`, `3.14f`
    NumberLiteral,
    /// String literal: `"hello"`, `@"c:\path"`
    StringLiteral,
    /// Character literal: `'a'`
    CharLiteral,

    // =========================================
    // Identifiers
    // =========================================
    /// User-defined identifier (including `@`-verbatim identifiers)
    Identifier,

    // =========================================
    // Keywords - declarations
    // =========================================
    /// `using`
    Using,
    /// `namespace`
    Namespace,
    /// `class`
    Class,
    /// `struct`
    Struct,
    /// `interface`
    Interface,
    /// `enum`
    Enum,
    /// `delegate`
    Delegate,

    // =========================================
    // Keywords - accessibility
    // =========================================
    /// `public`
    Public,
    /// `internal`
    Internal,
    /// `protected`
    Protected,
    /// `private`
    Private,

    // =========================================
    // Keywords - modifiers
    // =========================================
    /// `static`
    Static,
    /// `unsafe`
    Unsafe,
    /// `fixed` (only legal in unsafe contexts)
    Fixed,
    /// `readonly`
    Readonly,
    /// `const`
    Const,
    /// `abstract`
    Abstract,
    /// `sealed`
    Sealed,
    /// `partial`
    Partial,
    /// `new`
    New,
    /// `void`
    Void,

    // =========================================
    // Punctuation
    // =========================================
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `;`
    Semicolon,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `=`
    Assign,
    /// Any other operator sequence (`+`, `=>`, `??`, ...)
    Op,

    // =========================================
    // Special
    // =========================================
    /// Lexical error (details recorded separately)
    Error,
    /// End of input
    Eof,
}

impl TokenKind {
    /// Short human-readable description, used in parse error messages.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::NumberLiteral => "number literal",
            TokenKind::StringLiteral => "string literal",
            TokenKind::CharLiteral => "character literal",
            TokenKind::Identifier => "identifier",
            TokenKind::Using => "'using'",
            TokenKind::Namespace => "'namespace'",
            TokenKind::Class => "'class'",
            TokenKind::Struct => "'struct'",
            TokenKind::Interface => "'interface'",
            TokenKind::Enum => "'enum'",
            TokenKind::Delegate => "'delegate'",
            TokenKind::Public => "'public'",
            TokenKind::Internal => "'internal'",
            TokenKind::Protected => "'protected'",
            TokenKind::Private => "'private'",
            TokenKind::Static => "'static'",
            TokenKind::Unsafe => "'unsafe'",
            TokenKind::Fixed => "'fixed'",
            TokenKind::Readonly => "'readonly'",
            TokenKind::Const => "'const'",
            TokenKind::Abstract => "'abstract'",
            TokenKind::Sealed => "'sealed'",
            TokenKind::Partial => "'partial'",
            TokenKind::New => "'new'",
            TokenKind::Void => "'void'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Semicolon => "';'",
            TokenKind::Colon => "':'",
            TokenKind::Comma => "','",
            TokenKind::Dot => "'.'",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::Assign => "'='",
            TokenKind::Op => "operator",
            TokenKind::Error => "invalid token",
            TokenKind::Eof => "end of file",
        }
    }
}

/// Look up a keyword by its lexeme. Returns `None` for plain identifiers.
pub fn lookup_keyword(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "using" => TokenKind::Using,
        "namespace" => TokenKind::Namespace,
        "class" => TokenKind::Class,
        "struct" => TokenKind::Struct,
        "interface" => TokenKind::Interface,
        "enum" => TokenKind::Enum,
        "delegate" => TokenKind::Delegate,
        "public" => TokenKind::Public,
        "internal" => TokenKind::Internal,
        "protected" => TokenKind::Protected,
        "private" => TokenKind::Private,
        "static" => TokenKind::Static,
        "unsafe" => TokenKind::Unsafe,
        "fixed" => TokenKind::Fixed,
        "readonly" => TokenKind::Readonly,
        "const" => TokenKind::Const,
        "abstract" => TokenKind::Abstract,
        "sealed" => TokenKind::Sealed,
        "partial" => TokenKind::Partial,
        "new" => TokenKind::New,
        "void" => TokenKind::Void,
        _ => return None,
    };
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup() {
        assert_eq!(lookup_keyword("class"), Some(TokenKind::Class));
        assert_eq!(lookup_keyword("internal"), Some(TokenKind::Internal));
        assert_eq!(lookup_keyword("assembly"), None); // contextual, stays an identifier
        assert_eq!(lookup_keyword("Foo"), None);
    }

    #[test]
    fn token_category_helpers() {
        let t = Token::new(TokenKind::Internal, "internal", Span::new(1, 1, 8));
        assert!(t.is_accessibility_keyword());
        assert!(!t.is_type_keyword());

        let t = Token::new(TokenKind::Struct, "struct", Span::new(1, 1, 6));
        assert!(t.is_type_keyword());
    }
}
