//! Recovering declaration parser for the C# subset.
//!
//! The parser only models what the accessibility analysis needs: using
//! directives, assembly attributes, namespaces, and type declarations down
//! to member signatures. Member bodies are skipped over balanced braces,
//! noting whether they contain `unsafe` or `fixed` tokens on the way.
//!
//! Parsing never aborts. Errors are collected and the parser synchronizes
//! to the next plausible declaration start, so a single bad declaration
//! does not hide the rest of the file's diagnostics.

use bumpalo::Bump;
use bumpalo::collections::Vec as BVec;

use intacc_core::{Accessibility, Span, TypeKind};

use crate::ast::decl::{
    AssemblyAttrDecl, Ident, Item, MemberDecl, MemberKind, Modifiers, NamespaceDecl,
    QualifiedName, TypeDecl, UsingDecl,
};
use crate::ast::{CompilationUnit, ParseError, ParseErrorKind, ParseErrors};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::preprocess::preprocess;

pub struct Parser<'ast> {
    lexer: Lexer<'ast, 'ast>,
    arena: &'ast Bump,
    errors: ParseErrors,
}

impl<'ast> Parser<'ast> {
    /// Parse one source file, always producing a tree.
    ///
    /// `defines` feeds the preprocessor. Lexer, preprocessor, and parser
    /// errors all end up in the returned [`ParseErrors`].
    pub fn parse(
        source: &str,
        defines: &[String],
        arena: &'ast Bump,
    ) -> (CompilationUnit<'ast>, ParseErrors) {
        let preprocessed = preprocess(source, defines);

        let mut errors = ParseErrors::new();
        for error in preprocessed.errors {
            errors.push(error);
        }

        let text: &'ast str = arena.alloc_str(&preprocessed.text);
        let mut parser = Parser {
            lexer: Lexer::new(text, arena),
            arena,
            errors,
        };

        let items = parser.parse_items(None);
        let span = match (items.first(), items.last()) {
            (Some(first), Some(last)) => first.span().merge(last.span()),
            _ => Span::point(1, 1),
        };
        let unit = CompilationUnit::new(items, span);

        for error in parser.lexer.take_errors() {
            parser.errors.push(ParseError::from(error));
        }
        (unit, parser.errors)
    }

    // =========================================
    // Token plumbing
    // =========================================

    fn peek(&mut self) -> Token<'ast> {
        self.lexer.peek()
    }

    fn peek_nth(&mut self, n: usize) -> Token<'ast> {
        self.lexer.peek_nth(n)
    }

    fn advance(&mut self) -> Token<'ast> {
        self.lexer.next_token()
    }

    fn check(&mut self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token<'ast>> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'ast>, ParseError> {
        let token = self.peek();
        if token.kind == kind {
            Ok(self.advance())
        } else {
            Err(ParseError::expected_token(
                token.span,
                kind.describe(),
                token.describe_lexeme(),
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<Ident<'ast>, ParseError> {
        let token = self.peek();
        if token.kind == TokenKind::Identifier {
            self.advance();
            Ok(Ident::new(token.lexeme, token.span))
        } else {
            Err(ParseError::expected_identifier(
                token.span,
                token.describe_lexeme(),
            ))
        }
    }

    /// Skip forward to the next plausible declaration start after an error.
    fn synchronize(&mut self) {
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::Eof | TokenKind::RBrace => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::Using
                | TokenKind::Namespace
                | TokenKind::LBracket
                | TokenKind::Class
                | TokenKind::Struct
                | TokenKind::Interface
                | TokenKind::Enum
                | TokenKind::Delegate
                | TokenKind::Public
                | TokenKind::Internal
                | TokenKind::Protected
                | TokenKind::Private => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // =========================================
    // Items
    // =========================================

    /// Parse items until `terminator` (or end of file when `None`).
    fn parse_items(&mut self, terminator: Option<TokenKind>) -> &'ast [Item<'ast>] {
        let mut items = BVec::new_in(self.arena);

        loop {
            let token = self.peek();
            if token.kind == TokenKind::Eof {
                break;
            }
            if Some(token.kind) == terminator {
                break;
            }
            if token.kind == TokenKind::Semicolon {
                self.advance();
                continue;
            }

            match self.parse_item() {
                Ok(Some(item)) => items.push(item),
                Ok(None) => {}
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize();
                }
            }
            // A parse path that consumed nothing would loop forever.
            if self.peek() == token {
                self.advance();
            }
        }

        items.into_bump_slice()
    }

    /// Parse a single item; `Ok(None)` means a tolerated construct that
    /// produces no node (e.g. a non-assembly attribute consumed here).
    fn parse_item(&mut self) -> Result<Option<Item<'ast>>, ParseError> {
        match self.peek().kind {
            TokenKind::Using => Ok(Some(Item::Using(self.parse_using()?))),
            TokenKind::Namespace => Ok(Some(Item::Namespace(self.parse_namespace()?))),
            TokenKind::LBracket => {
                if self.is_assembly_attribute() {
                    Ok(Some(Item::AssemblyAttr(self.parse_assembly_attr()?)))
                } else {
                    // Type-level attribute; skip it, the declaration follows.
                    self.skip_bracketed()?;
                    Ok(None)
                }
            }
            TokenKind::Error => {
                // Lexer already recorded the underlying error.
                self.advance();
                Ok(None)
            }
            _ => Ok(Some(Item::Type(self.parse_type_decl()?))),
        }
    }

    fn is_assembly_attribute(&mut self) -> bool {
        let target = self.peek_nth(1);
        target.kind == TokenKind::Identifier
            && target.lexeme == "assembly"
            && self.peek_nth(2).kind == TokenKind::Colon
    }

    /// `using [static] Qualified;` or `using Alias = Qualified;`
    fn parse_using(&mut self) -> Result<UsingDecl<'ast>, ParseError> {
        let start = self.expect(TokenKind::Using)?.span;

        let is_static = self.eat(TokenKind::Static).is_some();

        let mut alias = None;
        if self.peek().kind == TokenKind::Identifier && self.peek_nth(1).kind == TokenKind::Assign
        {
            alias = Some(self.expect_ident()?);
            self.advance(); // `=`
        }

        let name = self.parse_qualified_name()?;
        let end = self.expect(TokenKind::Semicolon)?.span;

        Ok(UsingDecl {
            name,
            is_static,
            alias,
            span: start.merge(end),
        })
    }

    /// `[assembly: Name("argument")]`
    fn parse_assembly_attr(&mut self) -> Result<AssemblyAttrDecl<'ast>, ParseError> {
        let start = self.expect(TokenKind::LBracket)?.span;
        self.advance(); // `assembly`
        self.expect(TokenKind::Colon)?;

        let name = self.parse_qualified_name()?;

        let mut argument = None;
        if self.eat(TokenKind::LParen).is_some() {
            let token = self.peek();
            if token.kind == TokenKind::StringLiteral {
                self.advance();
                argument = Some(unquote(token.lexeme, self.arena));
            } else if token.kind != TokenKind::RParen {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidAttribute,
                    token.span,
                    format!(
                        "assembly attribute argument must be a string literal, found {}",
                        token.describe_lexeme()
                    ),
                ));
            }
            // Anything after the first argument is irrelevant here.
            self.skip_until_balanced(TokenKind::LParen, TokenKind::RParen, 1)?;
        }

        let end = self.expect(TokenKind::RBracket)?.span;
        Ok(AssemblyAttrDecl {
            name,
            argument,
            span: start.merge(end),
        })
    }

    /// `namespace Qualified { items }` or file-scoped `namespace Qualified;`
    fn parse_namespace(&mut self) -> Result<NamespaceDecl<'ast>, ParseError> {
        let start = self.expect(TokenKind::Namespace)?.span;
        let name = self.parse_qualified_name()?;

        if let Some(semi) = self.eat(TokenKind::Semicolon) {
            // File-scoped: the rest of the file belongs to this namespace.
            let items = self.parse_items(None);
            return Ok(NamespaceDecl {
                name,
                items,
                is_file_scoped: true,
                span: start.merge(semi.span),
            });
        }

        self.expect(TokenKind::LBrace)?;
        let items = self.parse_items(Some(TokenKind::RBrace));
        let end = self.expect(TokenKind::RBrace)?.span;

        Ok(NamespaceDecl {
            name,
            items,
            is_file_scoped: false,
            span: start.merge(end),
        })
    }

    fn parse_qualified_name(&mut self) -> Result<QualifiedName<'ast>, ParseError> {
        let mut parts = BVec::new_in(self.arena);
        parts.push(self.expect_ident()?);
        while self.eat(TokenKind::Dot).is_some() {
            parts.push(self.expect_ident()?);
        }
        Ok(QualifiedName::new(parts.into_bump_slice()))
    }

    // =========================================
    // Type declarations
    // =========================================

    fn parse_type_decl(&mut self) -> Result<TypeDecl<'ast>, ParseError> {
        let start = self.peek().span;
        let (accessibility, modifiers) = self.parse_modifiers()?;

        let token = self.peek();
        match token.kind {
            TokenKind::Class => self.parse_struct_like(TypeKind::Class, accessibility, modifiers, start),
            TokenKind::Struct => {
                self.parse_struct_like(TypeKind::Struct, accessibility, modifiers, start)
            }
            TokenKind::Interface => {
                self.parse_struct_like(TypeKind::Interface, accessibility, modifiers, start)
            }
            TokenKind::Enum => self.parse_enum(accessibility, modifiers, start),
            TokenKind::Delegate => self.parse_delegate(accessibility, modifiers, start),
            _ => Err(ParseError::new(
                ParseErrorKind::ExpectedDeclaration,
                token.span,
                format!(
                    "expected a type declaration, found {}",
                    token.describe_lexeme()
                ),
            )),
        }
    }

    /// Parse the accessibility and modifier keywords ahead of a declaration.
    fn parse_modifiers(&mut self) -> Result<(Option<Accessibility>, Modifiers), ParseError> {
        let mut accessibility: Option<Accessibility> = None;
        let mut modifiers = Modifiers::empty();

        loop {
            let token = self.peek();
            let parsed = match token.kind {
                TokenKind::Public => Some(Accessibility::Public),
                TokenKind::Internal => Some(Accessibility::Internal),
                TokenKind::Protected => Some(Accessibility::Protected),
                TokenKind::Private => Some(Accessibility::Private),
                TokenKind::Static => {
                    self.advance();
                    modifiers |= Modifiers::STATIC;
                    continue;
                }
                TokenKind::Abstract => {
                    self.advance();
                    modifiers |= Modifiers::ABSTRACT;
                    continue;
                }
                TokenKind::Sealed => {
                    self.advance();
                    modifiers |= Modifiers::SEALED;
                    continue;
                }
                TokenKind::Partial => {
                    self.advance();
                    modifiers |= Modifiers::PARTIAL;
                    continue;
                }
                TokenKind::Readonly => {
                    self.advance();
                    modifiers |= Modifiers::READONLY;
                    continue;
                }
                TokenKind::Unsafe => {
                    self.advance();
                    modifiers |= Modifiers::UNSAFE;
                    continue;
                }
                TokenKind::New => {
                    // `new` is both a modifier and an operator; as the first
                    // word of a declaration it only ever hides a member.
                    self.advance();
                    modifiers |= Modifiers::NEW;
                    continue;
                }
                TokenKind::Const => {
                    self.advance();
                    modifiers |= Modifiers::CONST;
                    continue;
                }
                _ => None,
            };

            let Some(parsed) = parsed else {
                return Ok((accessibility, modifiers));
            };
            self.advance();

            accessibility = Some(match (accessibility, parsed) {
                (None, single) => single,
                (Some(Accessibility::Protected), Accessibility::Internal)
                | (Some(Accessibility::Internal), Accessibility::Protected) => {
                    Accessibility::ProtectedInternal
                }
                (Some(Accessibility::Private), Accessibility::Protected)
                | (Some(Accessibility::Protected), Accessibility::Private) => {
                    Accessibility::PrivateProtected
                }
                (Some(existing), repeated) => {
                    return Err(ParseError::new(
                        ParseErrorKind::ConflictingModifiers,
                        token.span,
                        format!("'{existing}' cannot be combined with '{repeated}'"),
                    ));
                }
            });
        }
    }

    /// Parse class, struct, and interface declarations (they share shape).
    fn parse_struct_like(
        &mut self,
        kind: TypeKind,
        accessibility: Option<Accessibility>,
        modifiers: Modifiers,
        start: Span,
    ) -> Result<TypeDecl<'ast>, ParseError> {
        self.advance(); // `class` / `struct` / `interface`
        let name = self.expect_ident()?;
        self.skip_generic_params()?;

        let bases = if self.eat(TokenKind::Colon).is_some() {
            self.parse_base_list()?
        } else {
            &[][..]
        };
        self.skip_where_clauses()?;

        // Forward declarations carry no body.
        if let Some(semi) = self.eat(TokenKind::Semicolon) {
            return Ok(TypeDecl {
                kind,
                declared_accessibility: accessibility,
                modifiers,
                name,
                bases,
                members: &[],
                nested: &[],
                span: start.merge(semi.span),
            });
        }

        self.expect(TokenKind::LBrace)?;
        let (members, nested) = self.parse_members();
        let end = self.expect(TokenKind::RBrace)?.span;
        self.eat(TokenKind::Semicolon);

        Ok(TypeDecl {
            kind,
            declared_accessibility: accessibility,
            modifiers,
            name,
            bases,
            members,
            nested,
            span: start.merge(end),
        })
    }

    fn parse_base_list(&mut self) -> Result<&'ast [QualifiedName<'ast>], ParseError> {
        let mut bases = BVec::new_in(self.arena);
        loop {
            bases.push(self.parse_qualified_name()?);
            self.skip_generic_args()?;
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        Ok(bases.into_bump_slice())
    }

    /// Skip `<...>` generic parameter lists, including variance keywords.
    fn skip_generic_params(&mut self) -> Result<(), ParseError> {
        if self.check(TokenKind::Lt) {
            self.advance();
            self.skip_until_balanced(TokenKind::Lt, TokenKind::Gt, 1)?;
        }
        Ok(())
    }

    fn skip_generic_args(&mut self) -> Result<(), ParseError> {
        self.skip_generic_params()
    }

    /// Skip `where T : constraint` clauses up to the body.
    fn skip_where_clauses(&mut self) -> Result<(), ParseError> {
        while self.peek().kind == TokenKind::Identifier && self.peek().lexeme == "where" {
            self.advance();
            loop {
                let token = self.peek();
                match token.kind {
                    TokenKind::LBrace | TokenKind::Semicolon => return Ok(()),
                    TokenKind::Identifier if token.lexeme == "where" => break,
                    TokenKind::Lt => {
                        self.advance();
                        self.skip_until_balanced(TokenKind::Lt, TokenKind::Gt, 1)?;
                    }
                    TokenKind::Eof => return Err(ParseError::unexpected_eof(token.span)),
                    _ => {
                        self.advance();
                    }
                }
            }
        }
        Ok(())
    }

    /// `enum Name [: underlying] { A, B = 2, }`
    fn parse_enum(
        &mut self,
        accessibility: Option<Accessibility>,
        modifiers: Modifiers,
        start: Span,
    ) -> Result<TypeDecl<'ast>, ParseError> {
        self.advance(); // `enum`
        let name = self.expect_ident()?;

        if self.eat(TokenKind::Colon).is_some() {
            self.parse_qualified_name()?; // underlying type
        }

        if let Some(semi) = self.eat(TokenKind::Semicolon) {
            return Ok(TypeDecl {
                kind: TypeKind::Enum,
                declared_accessibility: accessibility,
                modifiers,
                name,
                bases: &[],
                members: &[],
                nested: &[],
                span: start.merge(semi.span),
            });
        }

        self.expect(TokenKind::LBrace)?;
        let mut members = BVec::new_in(self.arena);
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            if self.check(TokenKind::LBracket) {
                self.skip_bracketed()?;
                continue;
            }
            let variant = self.expect_ident()?;
            members.push(MemberDecl {
                kind: MemberKind::EnumVariant,
                declared_accessibility: None,
                modifiers: Modifiers::empty(),
                name: variant,
                body_has_unsafe: false,
                span: variant.span,
            });
            if self.eat(TokenKind::Assign).is_some() {
                // Constant expression; skip to the separator.
                loop {
                    match self.peek().kind {
                        TokenKind::Comma | TokenKind::RBrace => break,
                        TokenKind::Eof => {
                            return Err(ParseError::unexpected_eof(self.peek().span));
                        }
                        _ => {
                            self.advance();
                        }
                    }
                }
            }
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        let end = self.expect(TokenKind::RBrace)?.span;
        self.eat(TokenKind::Semicolon);

        Ok(TypeDecl {
            kind: TypeKind::Enum,
            declared_accessibility: accessibility,
            modifiers,
            name,
            bases: &[],
            members: members.into_bump_slice(),
            nested: &[],
            span: start.merge(end),
        })
    }

    /// `delegate ReturnType Name<T>(params);`
    fn parse_delegate(
        &mut self,
        accessibility: Option<Accessibility>,
        modifiers: Modifiers,
        start: Span,
    ) -> Result<TypeDecl<'ast>, ParseError> {
        self.advance(); // `delegate`

        // The name is the last identifier before the parameter list.
        let mut name = None;
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::LParen => break,
                TokenKind::Identifier => {
                    self.advance();
                    name = Some(Ident::new(token.lexeme, token.span));
                }
                TokenKind::Lt => {
                    // A type parameter list must not shadow the name.
                    self.advance();
                    self.skip_until_balanced(TokenKind::Lt, TokenKind::Gt, 1)?;
                }
                TokenKind::Semicolon | TokenKind::Eof => {
                    return Err(ParseError::new(
                        ParseErrorKind::ExpectedDeclaration,
                        token.span,
                        "delegate declaration is missing its parameter list",
                    ));
                }
                _ => {
                    self.advance();
                }
            }
        }
        let Some(name) = name else {
            return Err(ParseError::expected_identifier(
                self.peek().span,
                self.peek().describe_lexeme(),
            ));
        };

        self.expect(TokenKind::LParen)?;
        self.skip_until_balanced(TokenKind::LParen, TokenKind::RParen, 1)?;
        self.skip_where_clauses()?;
        let end = self.expect(TokenKind::Semicolon)?.span;

        Ok(TypeDecl {
            kind: TypeKind::Delegate,
            declared_accessibility: accessibility,
            modifiers,
            name,
            bases: &[],
            members: &[],
            nested: &[],
            span: start.merge(end),
        })
    }

    // =========================================
    // Members
    // =========================================

    /// Parse members until the closing brace, splitting nested types out.
    fn parse_members(&mut self) -> (&'ast [MemberDecl<'ast>], &'ast [TypeDecl<'ast>]) {
        let mut members = BVec::new_in(self.arena);
        let mut nested = BVec::new_in(self.arena);

        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::RBrace | TokenKind::Eof => break,
                TokenKind::Semicolon => {
                    self.advance();
                    continue;
                }
                TokenKind::LBracket => {
                    if let Err(error) = self.skip_bracketed() {
                        self.errors.push(error);
                        self.synchronize();
                    }
                    continue;
                }
                _ => {}
            }

            match self.parse_member_or_nested() {
                Ok(MemberOrNested::Member(member)) => members.push(member),
                Ok(MemberOrNested::Nested(decl)) => nested.push(decl),
                Err(error) => {
                    self.errors.push(error);
                    self.member_recover();
                }
            }
        }

        (members.into_bump_slice(), nested.into_bump_slice())
    }

    fn parse_member_or_nested(&mut self) -> Result<MemberOrNested<'ast>, ParseError> {
        let start = self.peek().span;
        let (accessibility, modifiers) = self.parse_modifiers()?;

        if self.peek().is_type_keyword() {
            // Nested type; re-parse keeps its own modifier handling simple.
            let decl = match self.peek().kind {
                TokenKind::Enum => self.parse_enum(accessibility, modifiers, start)?,
                TokenKind::Delegate => self.parse_delegate(accessibility, modifiers, start)?,
                other => {
                    let kind = match other {
                        TokenKind::Class => TypeKind::Class,
                        TokenKind::Struct => TypeKind::Struct,
                        _ => TypeKind::Interface,
                    };
                    self.parse_struct_like(kind, accessibility, modifiers, start)?
                }
            };
            return Ok(MemberOrNested::Nested(decl));
        }

        self.parse_member_signature(accessibility, modifiers, start)
            .map(MemberOrNested::Member)
    }

    /// Heuristic signature scan: the last identifier before the first `(`,
    /// `{`, `=`, or `;` names the member, and the delimiter decides its kind.
    fn parse_member_signature(
        &mut self,
        accessibility: Option<Accessibility>,
        modifiers: Modifiers,
        start: Span,
    ) -> Result<MemberDecl<'ast>, ParseError> {
        let mut last_ident: Option<Ident<'ast>> = None;
        let mut body_has_unsafe = modifiers.contains(Modifiers::UNSAFE);

        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::LParen => {
                    let name = last_ident.ok_or_else(|| {
                        ParseError::new(
                            ParseErrorKind::ExpectedMember,
                            token.span,
                            "method declaration is missing a name",
                        )
                    })?;
                    self.advance();
                    body_has_unsafe |=
                        self.skip_until_balanced(TokenKind::LParen, TokenKind::RParen, 1)?;
                    let end = self.skip_member_tail(&mut body_has_unsafe)?;
                    return Ok(MemberDecl {
                        kind: MemberKind::Method,
                        declared_accessibility: accessibility,
                        modifiers,
                        name,
                        body_has_unsafe,
                        span: start.merge(end),
                    });
                }
                TokenKind::LBrace => {
                    let name = last_ident.ok_or_else(|| {
                        ParseError::new(
                            ParseErrorKind::ExpectedMember,
                            token.span,
                            "property declaration is missing a name",
                        )
                    })?;
                    self.advance();
                    body_has_unsafe |=
                        self.skip_until_balanced(TokenKind::LBrace, TokenKind::RBrace, 1)?;
                    let mut end = token.span;
                    // Auto-property initializer: `{ get; } = value;`
                    if self.eat(TokenKind::Assign).is_some() {
                        body_has_unsafe |= self.skip_to_semicolon()?;
                    }
                    if let Some(semi) = self.eat(TokenKind::Semicolon) {
                        end = semi.span;
                    }
                    return Ok(MemberDecl {
                        kind: MemberKind::Property,
                        declared_accessibility: accessibility,
                        modifiers,
                        name,
                        body_has_unsafe,
                        span: start.merge(end),
                    });
                }
                TokenKind::Assign | TokenKind::Semicolon => {
                    let name = last_ident.ok_or_else(|| {
                        ParseError::new(
                            ParseErrorKind::ExpectedMember,
                            token.span,
                            "field declaration is missing a name",
                        )
                    })?;
                    let end = if token.kind == TokenKind::Assign {
                        self.advance();
                        body_has_unsafe |= self.skip_to_semicolon()?;
                        self.expect(TokenKind::Semicolon)?.span
                    } else {
                        self.advance().span
                    };
                    return Ok(MemberDecl {
                        kind: MemberKind::Field,
                        declared_accessibility: accessibility,
                        modifiers,
                        name,
                        body_has_unsafe,
                        span: start.merge(end),
                    });
                }
                TokenKind::Op if token.lexeme == "=>" => {
                    // Expression-bodied property: `Type Name => expr;`
                    let name = last_ident.ok_or_else(|| {
                        ParseError::new(
                            ParseErrorKind::ExpectedMember,
                            token.span,
                            "property declaration is missing a name",
                        )
                    })?;
                    self.advance();
                    body_has_unsafe |= self.skip_to_semicolon()?;
                    let end = self.expect(TokenKind::Semicolon)?.span;
                    return Ok(MemberDecl {
                        kind: MemberKind::Property,
                        declared_accessibility: accessibility,
                        modifiers,
                        name,
                        body_has_unsafe,
                        span: start.merge(end),
                    });
                }
                TokenKind::Identifier => {
                    self.advance();
                    last_ident = Some(Ident::new(token.lexeme, token.span));
                }
                TokenKind::Lt => {
                    // Generic arguments or parameters inside the signature.
                    self.advance();
                    self.skip_until_balanced(TokenKind::Lt, TokenKind::Gt, 1)?;
                }
                TokenKind::Unsafe | TokenKind::Fixed => {
                    self.advance();
                    body_has_unsafe = true;
                }
                TokenKind::RBrace | TokenKind::Eof => {
                    return Err(ParseError::new(
                        ParseErrorKind::ExpectedMember,
                        token.span,
                        "incomplete member declaration",
                    ));
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// After a parameter list: abstract `;`, expression body `=> ...;`, or a
    /// braced body. Returns the end span; flags unsafe tokens seen inside.
    fn skip_member_tail(&mut self, body_has_unsafe: &mut bool) -> Result<Span, ParseError> {
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::Semicolon => return Ok(self.advance().span),
                TokenKind::LBrace => {
                    self.advance();
                    *body_has_unsafe |=
                        self.skip_until_balanced(TokenKind::LBrace, TokenKind::RBrace, 1)?;
                    return Ok(token.span);
                }
                TokenKind::Op if token.lexeme == "=>" => {
                    self.advance();
                    *body_has_unsafe |= self.skip_to_semicolon()?;
                    return Ok(self.expect(TokenKind::Semicolon)?.span);
                }
                TokenKind::Unsafe | TokenKind::Fixed => {
                    self.advance();
                    *body_has_unsafe = true;
                }
                TokenKind::Eof => return Err(ParseError::unexpected_eof(token.span)),
                _ => {
                    // Constructor initializers and where-clauses land here.
                    self.advance();
                }
            }
        }
    }

    /// Recovery inside a type body: skip to the end of the broken member.
    fn member_recover(&mut self) {
        let mut depth = 0u32;
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::Eof => return,
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::LBrace => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.advance();
                    if depth == 0 {
                        return;
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // =========================================
    // Token skipping
    // =========================================

    /// Skip until the matching closer, starting from `depth` opens already
    /// consumed. Returns whether an `unsafe` or `fixed` token was seen.
    fn skip_until_balanced(
        &mut self,
        open: TokenKind,
        close: TokenKind,
        mut depth: u32,
    ) -> Result<bool, ParseError> {
        let mut saw_unsafe = false;
        while depth > 0 {
            let token = self.advance();
            match token.kind {
                TokenKind::Eof => return Err(ParseError::unexpected_eof(token.span)),
                TokenKind::Unsafe | TokenKind::Fixed => saw_unsafe = true,
                kind if kind == open => depth += 1,
                kind if kind == close => depth -= 1,
                _ => {}
            }
        }
        Ok(saw_unsafe)
    }

    /// Skip an attribute list, `[` through the matching `]`.
    fn skip_bracketed(&mut self) -> Result<(), ParseError> {
        self.expect(TokenKind::LBracket)?;
        self.skip_until_balanced(TokenKind::LBracket, TokenKind::RBracket, 1)?;
        Ok(())
    }

    /// Skip to the next `;` at the current nesting level without consuming
    /// it. Returns whether an `unsafe` or `fixed` token was seen.
    fn skip_to_semicolon(&mut self) -> Result<bool, ParseError> {
        let mut saw_unsafe = false;
        let mut braces = 0u32;
        let mut parens = 0u32;
        let mut brackets = 0u32;
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::Semicolon if braces == 0 && parens == 0 && brackets == 0 => {
                    return Ok(saw_unsafe);
                }
                TokenKind::Eof => return Err(ParseError::unexpected_eof(token.span)),
                TokenKind::LBrace => braces += 1,
                TokenKind::RBrace => braces = braces.saturating_sub(1),
                TokenKind::LParen => parens += 1,
                TokenKind::RParen => parens = parens.saturating_sub(1),
                TokenKind::LBracket => brackets += 1,
                TokenKind::RBracket => brackets = brackets.saturating_sub(1),
                TokenKind::Unsafe | TokenKind::Fixed => saw_unsafe = true,
                _ => {}
            }
            self.advance();
        }
    }
}

enum MemberOrNested<'ast> {
    Member(MemberDecl<'ast>),
    Nested(TypeDecl<'ast>),
}

/// Strip the quotes from a string-literal lexeme, resolving simple escapes.
fn unquote<'ast>(lexeme: &str, arena: &'ast Bump) -> &'ast str {
    if let Some(body) = lexeme
        .strip_prefix("@\"")
        .and_then(|s| s.strip_suffix('"'))
    {
        return arena.alloc_str(&body.replace("\"\"", "\""));
    }
    let body = lexeme
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(lexeme);
    if !body.contains('\\') {
        return arena.alloc_str(body);
    }
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    arena.alloc_str(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse<'ast>(source: &str, arena: &'ast Bump) -> (CompilationUnit<'ast>, ParseErrors) {
        Parser::parse(source, &[], arena)
    }

    fn only_type<'a, 'ast>(unit: &'a CompilationUnit<'ast>) -> &'a TypeDecl<'ast> {
        match &unit.items()[0] {
            Item::Type(decl) => decl,
            other => panic!("expected a type declaration, got {other:?}"),
        }
    }

    #[test]
    fn parse_using_directives() {
        let arena = Bump::new();
        let source = "using System;\nusing static System.Math;\nusing IO = System.IO;\n";
        let (unit, errors) = parse(source, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(unit.items().len(), 3);
        match &unit.items()[1] {
            Item::Using(u) => assert!(u.is_static),
            other => panic!("unexpected {other:?}"),
        }
        match &unit.items()[2] {
            Item::Using(u) => assert_eq!(u.alias.unwrap().text, "IO"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_assembly_attribute() {
        let arena = Bump::new();
        let source = r#"[assembly: System.Runtime.CompilerServices.InternalsVisibleTo("Consumer")]"#;
        let (unit, errors) = parse(source, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        match &unit.items()[0] {
            Item::AssemblyAttr(attr) => {
                assert!(attr.is_internal_access_grant());
                assert_eq!(attr.argument, Some("Consumer"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn type_level_attribute_is_skipped() {
        let arena = Bump::new();
        let source = "[Serializable]\ninternal class Widget { }\n";
        let (unit, errors) = parse(source, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(unit.items().len(), 1);
        assert_eq!(only_type(&unit).name.text, "Widget");
    }

    #[test]
    fn parse_namespace_with_types() {
        let arena = Bump::new();
        let source = "namespace Acme.Widgets { public class A { } internal struct B { } }";
        let (unit, errors) = parse(source, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        match &unit.items()[0] {
            Item::Namespace(ns) => {
                assert_eq!(ns.name.to_string(), "Acme.Widgets");
                assert_eq!(ns.items.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_file_scoped_namespace() {
        let arena = Bump::new();
        let source = "namespace Acme;\npublic class A { }\n";
        let (unit, errors) = parse(source, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        match &unit.items()[0] {
            Item::Namespace(ns) => {
                assert!(ns.is_file_scoped);
                assert_eq!(ns.items.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn accessibility_combinations() {
        let arena = Bump::new();
        let source = r#"
            public class A {
                protected internal int X;
                private protected int Y;
            }
        "#;
        let (unit, errors) = parse(source, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        let decl = only_type(&unit);
        assert_eq!(
            decl.members[0].declared_accessibility,
            Some(Accessibility::ProtectedInternal)
        );
        assert_eq!(
            decl.members[1].declared_accessibility,
            Some(Accessibility::PrivateProtected)
        );
    }

    #[test]
    fn conflicting_accessibility_is_an_error() {
        let arena = Bump::new();
        let (_, errors) = parse("public internal class A { }", &arena);
        assert!(
            errors
                .iter()
                .any(|e| e.kind == ParseErrorKind::ConflictingModifiers)
        );
    }

    #[test]
    fn members_are_classified() {
        let arena = Bump::new();
        let source = r#"
            public class Widget {
                private int count;
                public string Name { get; set; } = "widget";
                internal void Render(int depth) { count += depth; }
                public int Total => count;
            }
        "#;
        let (unit, errors) = parse(source, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        let decl = only_type(&unit);
        let kinds: Vec<MemberKind> = decl.members.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MemberKind::Field,
                MemberKind::Property,
                MemberKind::Method,
                MemberKind::Property,
            ]
        );
        assert_eq!(decl.members[2].name.text, "Render");
    }

    #[test]
    fn unsafe_body_is_detected() {
        let arena = Bump::new();
        let source = r#"
            public class Raw {
                public void Poke() { unsafe { } }
                public void Safe() { }
            }
        "#;
        let (unit, errors) = parse(source, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        let decl = only_type(&unit);
        assert!(decl.members[0].body_has_unsafe);
        assert!(!decl.members[1].body_has_unsafe);
        assert!(decl.contains_unsafe());
    }

    #[test]
    fn nested_types_are_collected() {
        let arena = Bump::new();
        let source = r#"
            public class Outer {
                private class Inner { int x; }
                public enum Mode { On, Off }
            }
        "#;
        let (unit, errors) = parse(source, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        let decl = only_type(&unit);
        assert_eq!(decl.nested.len(), 2);
        assert_eq!(decl.nested[0].name.text, "Inner");
        assert_eq!(decl.nested[1].kind, TypeKind::Enum);
    }

    #[test]
    fn enum_with_explicit_values() {
        let arena = Bump::new();
        let source = "internal enum Color : byte { Red, Green = 1 << 1, Blue = 4, }";
        let (unit, errors) = parse(source, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        let decl = only_type(&unit);
        assert_eq!(decl.kind, TypeKind::Enum);
        let names: Vec<&str> = decl.members.iter().map(|m| m.name.text).collect();
        assert_eq!(names, vec!["Red", "Green", "Blue"]);
    }

    #[test]
    fn delegate_declaration() {
        let arena = Bump::new();
        let source = "public delegate System.Int32 Transform<T>(T input);";
        let (unit, errors) = parse(source, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        let decl = only_type(&unit);
        assert_eq!(decl.kind, TypeKind::Delegate);
        assert_eq!(decl.name.text, "Transform");
    }

    #[test]
    fn generic_delegate_keeps_its_own_name() {
        let arena = Bump::new();
        let source = "internal delegate TResult Map<TSource, TResult>(TSource input);";
        let (unit, errors) = parse(source, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(only_type(&unit).name.text, "Map");
    }

    #[test]
    fn base_list_with_generics() {
        let arena = Bump::new();
        let source = "public class Registry : Dictionary<string, int>, IDisposable { }";
        let (unit, errors) = parse(source, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        let decl = only_type(&unit);
        let bases: Vec<String> = decl.bases.iter().map(|b| b.to_string()).collect();
        assert_eq!(bases, vec!["Dictionary", "IDisposable"]);
    }

    #[test]
    fn generic_type_with_where_clause() {
        let arena = Bump::new();
        let source = "public class Pool<T> where T : class, new() { T item; }";
        let (unit, errors) = parse(source, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(only_type(&unit).name.text, "Pool");
    }

    #[test]
    fn recovery_keeps_later_declarations() {
        let arena = Bump::new();
        let source = r#"
            public clazz Broken { }
            internal class Fine { }
        "#;
        let (unit, errors) = parse(source, &arena);
        assert!(!errors.is_empty());
        assert!(unit.items().iter().any(|item| matches!(
            item,
            Item::Type(t) if t.name.text == "Fine"
        )));
    }

    #[test]
    fn recovery_inside_type_body() {
        let arena = Bump::new();
        let source = r#"
            public class Widget {
                ???;
                public int Ok;
            }
        "#;
        let (unit, errors) = parse(source, &arena);
        assert!(!errors.is_empty());
        let decl = only_type(&unit);
        assert!(decl.members.iter().any(|m| m.name.text == "Ok"));
    }

    #[test]
    fn preprocessor_feeds_the_parser() {
        let arena = Bump::new();
        let source = "#if HIDDEN\npublic class Gone { }\n#endif\npublic class Kept { }\n";
        let (unit, errors) = parse(source, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(unit.items().len(), 1);
        assert_eq!(only_type(&unit).name.text, "Kept");
    }

    #[test]
    fn defines_reach_the_preprocessor() {
        let arena = Bump::new();
        let source = "#if FEATURE\npublic class Extra { }\n#endif\n";
        let defines = vec!["FEATURE".to_string()];
        let (unit, errors) = Parser::parse(source, &defines, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(unit.items().len(), 1);
    }

    #[test]
    fn spans_survive_preprocessing() {
        let arena = Bump::new();
        let source = "#if GONE\nx\n#endif\npublic class Kept { }\n";
        let (unit, _) = parse(source, &arena);
        assert_eq!(only_type(&unit).name.span.line, 4);
    }

    #[test]
    fn unquote_verbatim_and_escapes() {
        let arena = Bump::new();
        assert_eq!(unquote(r#""plain""#, &arena), "plain");
        assert_eq!(unquote(r#""a\nb""#, &arena), "a\nb");
        assert_eq!(unquote(r#"@"say ""hi""""#, &arena), r#"say "hi""#);
    }
}
