//! Lexer for the C#-subset source language.
//!
//! Converts (already preprocessed) source text into a stream of [`Token`]s,
//! dispatching on the first character. All string content is copied into the
//! arena so the source buffer can be dropped after lexing.
//!
//! Errors never stop the stream: the lexer records them and produces
//! [`TokenKind::Error`] tokens, matching the front-end policy of always
//! producing a tree and surfacing problems as diagnostics.

use std::collections::VecDeque;

use bumpalo::Bump;

use intacc_core::{LexerError, Span};

use super::cursor::{Cursor, is_ident_continue, is_ident_start};
use super::token::{Token, TokenKind, lookup_keyword};

/// Lexer for source code.
///
/// Provides lookahead via [`peek`](Self::peek) and [`peek_nth`](Self::peek_nth).
///
/// The `'src` lifetime is the source string being lexed (temporary).
/// The `'ast` lifetime is the arena where token lexemes are allocated.
pub struct Lexer<'src, 'ast> {
    /// Low-level character cursor.
    cursor: Cursor<'src>,
    /// Arena for allocating token lexemes.
    arena: &'ast Bump,
    /// Lookahead buffer for peeking.
    lookahead: VecDeque<Token<'ast>>,
    /// Accumulated errors.
    errors: Vec<LexerError>,
}

impl<'src, 'ast> Lexer<'src, 'ast> {
    /// Create a new lexer for the given source text.
    pub fn new(source: &'src str, arena: &'ast Bump) -> Self {
        Self {
            cursor: Cursor::new(source),
            arena,
            lookahead: VecDeque::with_capacity(4),
            errors: Vec::new(),
        }
    }

    /// Take accumulated errors, leaving an empty vec.
    pub fn take_errors(&mut self) -> Vec<LexerError> {
        std::mem::take(&mut self.errors)
    }

    /// Check if any errors occurred.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Consume and return the next token.
    pub fn next_token(&mut self) -> Token<'ast> {
        if let Some(token) = self.lookahead.pop_front() {
            return token;
        }
        self.scan_token()
    }

    /// Peek at the next token without consuming it.
    pub fn peek(&mut self) -> Token<'ast> {
        self.peek_nth(0)
    }

    /// Peek at the nth upcoming token (0 = next).
    pub fn peek_nth(&mut self, n: usize) -> Token<'ast> {
        while self.lookahead.len() <= n {
            let token = self.scan_token();
            self.lookahead.push_back(token);
        }
        self.lookahead[n]
    }

    // =========================================
    // Internal: token scanning
    // =========================================

    fn scan_token(&mut self) -> Token<'ast> {
        self.skip_whitespace();

        if self.cursor.is_eof() {
            return self.make_eof();
        }

        let start_line = self.cursor.line();
        let start_col = self.cursor.column();
        let start_offset = self.cursor.offset();

        match self.cursor.peek().unwrap() {
            '/' => self.scan_slash(start_line, start_col, start_offset),
            '"' => self.scan_string(start_line, start_col, start_offset),
            '\'' => self.scan_char(start_line, start_col, start_offset),
            '@' => self.scan_verbatim(start_line, start_col, start_offset),
            c if c.is_ascii_digit() => self.scan_number(start_line, start_col, start_offset),
            '.' if self.cursor.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.scan_number(start_line, start_col, start_offset)
            }
            c if is_ident_start(c) => self.scan_identifier(start_line, start_col, start_offset),
            _ => self.scan_operator(start_line, start_col, start_offset),
        }
    }

    /// Skip whitespace and BOM.
    fn skip_whitespace(&mut self) {
        if self.cursor.offset() == 0 && self.cursor.eat('\u{FEFF}') {
            // UTF-8 BOM at start of file
        }
        while self.cursor.check(|c| c.is_whitespace()) {
            self.cursor.advance();
        }
    }

    fn make_eof(&self) -> Token<'ast> {
        let span = Span::point(self.cursor.line(), self.cursor.column());
        Token::new(TokenKind::Eof, "", span)
    }

    /// Create a token from start position to current position, copying the
    /// lexeme into the arena.
    fn make_token(
        &self,
        kind: TokenKind,
        start_line: u32,
        start_col: u32,
        start_offset: u32,
    ) -> Token<'ast> {
        let len = self.cursor.offset() - start_offset;
        let span = Span::new(start_line, start_col, len);
        let lexeme = self.arena.alloc_str(self.cursor.slice_from(start_offset));
        Token::new(kind, lexeme, span)
    }

    /// Record an error and produce an error token.
    fn make_error(&mut self, error: LexerError) -> Token<'ast> {
        let span = error.span();
        self.errors.push(error);
        Token::new(TokenKind::Error, "", span)
    }

    // =========================================
    // Scanning: comments and slash
    // =========================================

    fn scan_slash(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Token<'ast> {
        self.cursor.advance(); // consume '/'

        match self.cursor.peek() {
            Some('/') => {
                // Line comment (including `///` doc comments)
                while let Some(c) = self.cursor.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.cursor.advance();
                }
                self.scan_token()
            }
            Some('*') => {
                self.cursor.advance();
                self.scan_block_comment(start_line, start_col, start_offset)
            }
            _ => self.make_token(TokenKind::Op, start_line, start_col, start_offset),
        }
    }

    fn scan_block_comment(
        &mut self,
        start_line: u32,
        start_col: u32,
        start_offset: u32,
    ) -> Token<'ast> {
        loop {
            match self.cursor.peek() {
                None => {
                    let len = self.cursor.offset() - start_offset;
                    let span = Span::new(start_line, start_col, len);
                    return self.make_error(LexerError::UnterminatedComment { span });
                }
                Some('*') => {
                    self.cursor.advance();
                    if self.cursor.eat('/') {
                        return self.scan_token();
                    }
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
    }

    // =========================================
    // Scanning: literals
    // =========================================

    /// Scan a regular string literal with backslash escapes.
    fn scan_string(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Token<'ast> {
        self.cursor.advance(); // opening quote

        loop {
            match self.cursor.peek() {
                None | Some('\n') => {
                    let len = self.cursor.offset() - start_offset;
                    let span = Span::new(start_line, start_col, len);
                    return self.make_error(LexerError::UnterminatedString { span });
                }
                Some('\\') => {
                    self.cursor.advance();
                    self.cursor.advance(); // whatever is escaped
                }
                Some('"') => {
                    self.cursor.advance();
                    return self.make_token(
                        TokenKind::StringLiteral,
                        start_line,
                        start_col,
                        start_offset,
                    );
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
    }

    fn scan_char(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Token<'ast> {
        self.cursor.advance(); // opening quote

        loop {
            match self.cursor.peek() {
                None | Some('\n') => {
                    let len = self.cursor.offset() - start_offset;
                    let span = Span::new(start_line, start_col, len);
                    return self.make_error(LexerError::UnterminatedChar { span });
                }
                Some('\\') => {
                    self.cursor.advance();
                    self.cursor.advance();
                }
                Some('\'') => {
                    self.cursor.advance();
                    return self.make_token(
                        TokenKind::CharLiteral,
                        start_line,
                        start_col,
                        start_offset,
                    );
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
    }

    /// Scan `@"..."` verbatim strings and `@ident` verbatim identifiers.
    fn scan_verbatim(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Token<'ast> {
        self.cursor.advance(); // consume '@'

        match self.cursor.peek() {
            Some('"') => {
                self.cursor.advance();
                loop {
                    match self.cursor.peek() {
                        None => {
                            let len = self.cursor.offset() - start_offset;
                            let span = Span::new(start_line, start_col, len);
                            return self.make_error(LexerError::UnterminatedString { span });
                        }
                        Some('"') => {
                            self.cursor.advance();
                            // `""` is an escaped quote inside a verbatim string
                            if !self.cursor.eat('"') {
                                return self.make_token(
                                    TokenKind::StringLiteral,
                                    start_line,
                                    start_col,
                                    start_offset,
                                );
                            }
                        }
                        Some(_) => {
                            self.cursor.advance();
                        }
                    }
                }
            }
            Some(c) if is_ident_start(c) => {
                self.cursor.eat_while(is_ident_continue);
                // Verbatim identifiers are never keywords
                self.make_token(TokenKind::Identifier, start_line, start_col, start_offset)
            }
            _ => {
                let span = Span::new(start_line, start_col, 1);
                self.make_error(LexerError::UnexpectedChar { ch: '@', span })
            }
        }
    }

    /// Scan a numeric literal. One kind covers integers, hex, floats, and
    /// suffixes; the declaration grammar never inspects the value.
    fn scan_number(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Token<'ast> {
        if self.cursor.check_hex_prefix() {
            self.cursor.advance();
            self.cursor.advance();
            self.cursor
                .eat_while(|c| c.is_ascii_hexdigit() || c == '_');
        } else {
            self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
            if self.cursor.peek() == Some('.')
                && self.cursor.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
            {
                self.cursor.advance();
                self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
            }
            if self.cursor.check(|c| c == 'e' || c == 'E') {
                self.cursor.advance();
                if self.cursor.check(|c| c == '+' || c == '-') {
                    self.cursor.advance();
                }
                self.cursor.eat_while(|c| c.is_ascii_digit());
            }
        }
        // Type suffixes: f, d, m, u, l and combinations
        self.cursor.eat_while(|c| c.is_ascii_alphabetic());
        self.make_token(TokenKind::NumberLiteral, start_line, start_col, start_offset)
    }

    fn scan_identifier(
        &mut self,
        start_line: u32,
        start_col: u32,
        start_offset: u32,
    ) -> Token<'ast> {
        let text = self.cursor.eat_while(is_ident_continue);
        let kind = lookup_keyword(text).unwrap_or(TokenKind::Identifier);
        self.make_token(kind, start_line, start_col, start_offset)
    }

    // =========================================
    // Scanning: operators and punctuation
    // =========================================

    fn scan_operator(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Token<'ast> {
        let ch = self.cursor.advance().unwrap();

        let kind = match ch {
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ':' => {
                // `::` is a namespace alias qualifier, not a base-list colon
                if self.cursor.eat(':') {
                    TokenKind::Op
                } else {
                    TokenKind::Colon
                }
            }
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '=' => {
                if self.cursor.eat('=') || self.cursor.eat('>') {
                    TokenKind::Op
                } else {
                    TokenKind::Assign
                }
            }
            '<' => {
                if self.cursor.eat('=') || self.cursor.eat('<') {
                    TokenKind::Op
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.cursor.eat('=') {
                    TokenKind::Op
                } else {
                    TokenKind::Gt
                }
            }
            '+' | '-' | '*' | '/' | '%' | '&' | '|' | '^' | '!' | '~' | '?' => {
                // Fold the common digraphs into the same catch-all kind
                if self.cursor.check(|c| c == '=' || c == ch) {
                    self.cursor.advance();
                }
                TokenKind::Op
            }
            other => {
                let span = Span::new(start_line, start_col, other.len_utf8() as u32);
                return self.make_error(LexerError::UnexpectedChar { ch: other, span });
            }
        };
        self.make_token(kind, start_line, start_col, start_offset)
    }
}

impl Cursor<'_> {
    /// Whether the cursor sits on a `0x`/`0X` hex prefix.
    fn check_hex_prefix(&self) -> bool {
        self.peek() == Some('0') && self.peek_nth(1).is_some_and(|c| c == 'x' || c == 'X')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_kinds(source: &str) -> Vec<TokenKind> {
        let arena = Bump::new();
        let mut lexer = Lexer::new(source, &arena);
        let mut kinds = Vec::new();
        loop {
            let token = lexer.next_token();
            if token.kind == TokenKind::Eof {
                break;
            }
            kinds.push(token.kind);
        }
        kinds
    }

    #[test]
    fn lex_type_declaration() {
        let kinds = lex_kinds("internal class Bar { }");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Internal,
                TokenKind::Class,
                TokenKind::Identifier,
                TokenKind::LBrace,
                TokenKind::RBrace,
            ]
        );
    }

    #[test]
    fn lex_assembly_attribute() {
        let kinds = lex_kinds(r#"[assembly: InternalsVisibleTo("Consumer")]"#);
        assert_eq!(
            kinds,
            vec![
                TokenKind::LBracket,
                TokenKind::Identifier, // assembly is contextual
                TokenKind::Colon,
                TokenKind::Identifier,
                TokenKind::LParen,
                TokenKind::StringLiteral,
                TokenKind::RParen,
                TokenKind::RBracket,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let kinds = lex_kinds("// line\n/* block */ class /* another */ Foo");
        assert_eq!(
            kinds,
            vec![TokenKind::Class, TokenKind::Identifier]
        );
    }

    #[test]
    fn verbatim_string_with_escaped_quotes() {
        let arena = Bump::new();
        let mut lexer = Lexer::new(r#"@"say ""hi"" now""#, &arena);
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::StringLiteral);
        assert_eq!(token.lexeme, r#"@"say ""hi"" now""#);
        assert!(!lexer.has_errors());
    }

    #[test]
    fn unterminated_string_is_an_error_token() {
        let arena = Bump::new();
        let mut lexer = Lexer::new("\"abc", &arena);
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Error);
        assert!(lexer.has_errors());
        assert!(matches!(
            lexer.take_errors()[0],
            LexerError::UnterminatedString { .. }
        ));
    }

    #[test]
    fn numbers_with_suffixes_and_hex() {
        assert_eq!(
            lex_kinds("42 0xFF 3.14f 1e-5 100UL"),
            vec![TokenKind::NumberLiteral; 5]
        );
    }

    #[test]
    fn operator_soup_does_not_error() {
        let arena = Bump::new();
        let mut lexer = Lexer::new("a => b ?? c == *p->q", &arena);
        loop {
            let token = lexer.next_token();
            assert_ne!(token.kind, TokenKind::Error);
            if token.kind == TokenKind::Eof {
                break;
            }
        }
        assert!(!lexer.has_errors());
    }

    #[test]
    fn peek_does_not_consume() {
        let arena = Bump::new();
        let mut lexer = Lexer::new("class Foo", &arena);
        assert_eq!(lexer.peek().kind, TokenKind::Class);
        assert_eq!(lexer.peek_nth(1).kind, TokenKind::Identifier);
        assert_eq!(lexer.next_token().kind, TokenKind::Class);
    }

    #[test]
    fn spans_track_lines() {
        let arena = Bump::new();
        let mut lexer = Lexer::new("class\nFoo", &arena);
        let class = lexer.next_token();
        assert_eq!((class.span.line, class.span.col), (1, 1));
        let foo = lexer.next_token();
        assert_eq!((foo.span.line, foo.span.col), (2, 1));
    }
}
