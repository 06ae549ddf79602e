//! Conditional-compilation preprocessor.
//!
//! Runs before the lexer: evaluates `#if`/`#elif`/`#else`/`#endif` regions
//! against the defined symbol set and blanks out inactive lines and
//! directive lines, preserving the line count so all downstream spans still
//! point into the original file.
//!
//! Condition grammar: `||`, `&&`, `!`, parentheses, `true`, `false`, and
//! symbol names. Malformed directives are recoverable errors: the region is
//! treated as inactive and scanning continues.

use rustc_hash::FxHashSet;

use intacc_core::{ParseError, ParseErrorKind, Span};

/// One `#if`/`#elif`/`#else` region on the stack.
struct Frame {
    /// Emission state just outside this region.
    parent_active: bool,
    /// Whether some branch (including the current one) has matched.
    taken: bool,
    /// Whether the current branch emits lines.
    active: bool,
    /// Whether `#else` has been seen (no more branches allowed).
    in_else: bool,
}

/// Result of preprocessing one source file.
pub struct Preprocessed {
    /// The filtered text; inactive and directive lines are blank.
    pub text: String,
    /// Recoverable directive errors.
    pub errors: Vec<ParseError>,
}

/// Preprocess `source` with the given defined symbols.
///
/// `defines` seeds the symbol set; in-file `#define`/`#undef` mutate it from
/// that point on, as the original front-end does.
pub fn preprocess(source: &str, defines: &[String]) -> Preprocessed {
    let mut symbols: FxHashSet<String> = defines.iter().cloned().collect();
    let mut stack: Vec<Frame> = Vec::new();
    let mut errors = Vec::new();
    let mut text = String::with_capacity(source.len());

    for (index, line) in source.lines().enumerate() {
        let line_no = index as u32 + 1;
        let trimmed = line.trim_start();

        if let Some(directive) = trimmed.strip_prefix('#') {
            let col = (line.len() - trimmed.len()) as u32 + 1;
            let span = Span::new(line_no, col, trimmed.len() as u32);
            handle_directive(directive, span, &mut symbols, &mut stack, &mut errors);
            text.push('\n');
            continue;
        }

        if current_active(&stack) {
            text.push_str(line);
        }
        text.push('\n');
    }

    for _ in &stack {
        errors.push(ParseError::new(
            ParseErrorKind::UnterminatedDirective,
            Span::point(source.lines().count() as u32, 1),
            "#if region is never closed with #endif",
        ));
    }

    Preprocessed { text, errors }
}

/// Whether lines are currently being emitted.
fn current_active(stack: &[Frame]) -> bool {
    stack.last().is_none_or(|f| f.active)
}

fn handle_directive(
    directive: &str,
    span: Span,
    symbols: &mut FxHashSet<String>,
    stack: &mut Vec<Frame>,
    errors: &mut Vec<ParseError>,
) {
    let mut parts = directive.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or("").trim();

    match name {
        "define" | "undef" => {
            if !current_active(stack) {
                return;
            }
            if !is_symbol(rest) {
                errors.push(ParseError::new(
                    ParseErrorKind::InvalidDirective,
                    span,
                    format!("#{name} requires a symbol name"),
                ));
                return;
            }
            if name == "define" {
                symbols.insert(rest.to_string());
            } else {
                symbols.remove(rest);
            }
        }
        "if" => {
            let parent_active = current_active(stack);
            let value = eval_condition(rest, span, symbols, errors);
            stack.push(Frame {
                parent_active,
                taken: value,
                active: parent_active && value,
                in_else: false,
            });
        }
        "elif" => match stack.last_mut() {
            None => errors.push(unbalanced(span, "#elif")),
            Some(frame) => {
                if frame.in_else {
                    errors.push(ParseError::new(
                        ParseErrorKind::UnbalancedDirective,
                        span,
                        "#elif after #else",
                    ));
                    return;
                }
                if frame.taken {
                    frame.active = false;
                } else {
                    let value = eval_condition(rest, span, symbols, errors);
                    frame.taken = value;
                    frame.active = frame.parent_active && value;
                }
            }
        },
        "else" => match stack.last_mut() {
            None => errors.push(unbalanced(span, "#else")),
            Some(frame) => {
                if frame.in_else {
                    errors.push(ParseError::new(
                        ParseErrorKind::UnbalancedDirective,
                        span,
                        "duplicate #else",
                    ));
                    return;
                }
                frame.in_else = true;
                if frame.taken {
                    frame.active = false;
                } else {
                    frame.taken = true;
                    frame.active = frame.parent_active;
                }
            }
        },
        "endif" => {
            if stack.pop().is_none() {
                errors.push(unbalanced(span, "#endif"));
            }
        }
        // Structural/no-op directives the original front-end tolerates.
        "region" | "endregion" | "pragma" | "nullable" => {}
        other => errors.push(ParseError::new(
            ParseErrorKind::InvalidDirective,
            span,
            format!("unknown preprocessor directive '#{other}'"),
        )),
    }
}

fn unbalanced(span: Span, what: &str) -> ParseError {
    ParseError::new(
        ParseErrorKind::UnbalancedDirective,
        span,
        format!("{what} without matching #if"),
    )
}

fn is_symbol(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// Condition expressions
// ============================================================================

struct CondParser<'a> {
    tokens: Vec<&'a str>,
    pos: usize,
}

/// Evaluate a directive condition; malformed conditions report an error and
/// evaluate to false (the region stays inactive).
fn eval_condition(
    text: &str,
    span: Span,
    symbols: &FxHashSet<String>,
    errors: &mut Vec<ParseError>,
) -> bool {
    let mut parser = CondParser {
        tokens: tokenize_condition(text),
        pos: 0,
    };
    if parser.tokens.is_empty() {
        errors.push(ParseError::new(
            ParseErrorKind::InvalidDirective,
            span,
            "missing condition",
        ));
        return false;
    }
    match parser.or_expr(symbols) {
        Ok(value) if parser.pos == parser.tokens.len() => value,
        Ok(_) | Err(()) => {
            errors.push(ParseError::new(
                ParseErrorKind::InvalidDirective,
                span,
                format!("malformed condition '{text}'"),
            ));
            false
        }
    }
}

fn tokenize_condition(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = text.trim();
    while !rest.is_empty() {
        let len = if rest.starts_with("&&") || rest.starts_with("||") {
            2
        } else if rest.starts_with('!') || rest.starts_with('(') || rest.starts_with(')') {
            1
        } else {
            // An identifier run, or a single junk character the parser
            // will reject as malformed.
            match rest.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_')) {
                Some(0) => rest.chars().next().map_or(1, char::len_utf8),
                Some(n) => n,
                None => rest.len(),
            }
        };
        tokens.push(&rest[..len]);
        rest = rest[len..].trim_start();
    }
    tokens
}

impl CondParser<'_> {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<&str> {
        let token = self.tokens.get(self.pos).copied();
        self.pos += 1;
        token
    }

    fn or_expr(&mut self, symbols: &FxHashSet<String>) -> Result<bool, ()> {
        let mut value = self.and_expr(symbols)?;
        while self.peek() == Some("||") {
            self.bump();
            value |= self.and_expr(symbols)?;
        }
        Ok(value)
    }

    fn and_expr(&mut self, symbols: &FxHashSet<String>) -> Result<bool, ()> {
        let mut value = self.unary(symbols)?;
        while self.peek() == Some("&&") {
            self.bump();
            value &= self.unary(symbols)?;
        }
        Ok(value)
    }

    fn unary(&mut self, symbols: &FxHashSet<String>) -> Result<bool, ()> {
        match self.bump() {
            Some("!") => Ok(!self.unary(symbols)?),
            Some("(") => {
                let value = self.or_expr(symbols)?;
                if self.bump() == Some(")") { Ok(value) } else { Err(()) }
            }
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(ident) if is_symbol(ident) => Ok(symbols.contains(ident)),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str, defines: &[&str]) -> Preprocessed {
        let defines: Vec<String> = defines.iter().map(|s| s.to_string()).collect();
        preprocess(source, &defines)
    }

    #[test]
    fn passthrough_without_directives() {
        let result = run("class Foo { }\n", &[]);
        assert!(result.errors.is_empty());
        assert_eq!(result.text, "class Foo { }\n");
    }

    #[test]
    fn inactive_region_is_blanked_and_lines_preserved() {
        let source = "#if DEBUG\nclass Hidden { }\n#endif\nclass Kept { }\n";
        let result = run(source, &[]);
        assert!(result.errors.is_empty());
        assert_eq!(result.text, "\n\n\nclass Kept { }\n");
    }

    #[test]
    fn defined_symbol_activates_region() {
        let source = "#if DEBUG\nclass Shown { }\n#endif\n";
        let result = run(source, &["DEBUG"]);
        assert_eq!(result.text, "\nclass Shown { }\n\n");
    }

    #[test]
    fn else_takes_the_other_branch() {
        let source = "#if A\none\n#else\ntwo\n#endif\n";
        assert_eq!(run(source, &["A"]).text.trim(), "one");
        assert_eq!(run(source, &[]).text.trim(), "two");
    }

    #[test]
    fn elif_chain_picks_first_match() {
        let source = "#if A\na\n#elif B\nb\n#elif C\nc\n#else\nd\n#endif\n";
        assert_eq!(run(source, &["A", "B"]).text.trim(), "a");
        assert_eq!(run(source, &["B", "C"]).text.trim(), "b");
        assert_eq!(run(source, &["C"]).text.trim(), "c");
        assert_eq!(run(source, &[]).text.trim(), "d");
    }

    #[test]
    fn condition_operators() {
        let source = "#if A && (B || !C)\nyes\n#endif\n";
        assert_eq!(run(source, &["A", "B"]).text.trim(), "yes");
        assert_eq!(run(source, &["A"]).text.trim(), "yes"); // !C holds
        assert_eq!(run(source, &["A", "C"]).text.trim(), "");
        assert_eq!(run(source, &["B"]).text.trim(), "");
    }

    #[test]
    fn in_file_define_and_undef() {
        let source = "#define X\n#if X\none\n#endif\n#undef X\n#if X\ntwo\n#endif\n";
        let result = run(source, &[]);
        assert!(result.errors.is_empty());
        assert_eq!(result.text.trim(), "one");
    }

    #[test]
    fn define_inside_inactive_region_is_ignored() {
        let source = "#if NOPE\n#define X\n#endif\n#if X\nhidden\n#endif\n";
        assert_eq!(run(source, &[]).text.trim(), "");
    }

    #[test]
    fn nested_regions() {
        let source = "#if A\n#if B\ninner\n#endif\nouter\n#endif\n";
        assert_eq!(run(source, &["A"]).text.trim(), "outer");
        let both = run(source, &["A", "B"]);
        assert!(both.text.contains("inner") && both.text.contains("outer"));
        assert_eq!(run(source, &["B"]).text.trim(), "");
    }

    #[test]
    fn unterminated_if_is_reported() {
        let result = run("#if A\nx\n", &[]);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ParseErrorKind::UnterminatedDirective);
    }

    #[test]
    fn unbalanced_endif_is_reported() {
        let result = run("#endif\n", &[]);
        assert_eq!(result.errors[0].kind, ParseErrorKind::UnbalancedDirective);
    }

    #[test]
    fn else_after_else_is_reported() {
        let result = run("#if A\n#else\n#else\n#endif\n", &[]);
        assert_eq!(result.errors[0].kind, ParseErrorKind::UnbalancedDirective);
    }

    #[test]
    fn malformed_condition_is_inactive() {
        let result = run("#if &&\nx\n#endif\n", &[]);
        assert_eq!(result.errors[0].kind, ParseErrorKind::InvalidDirective);
        assert_eq!(result.text.trim(), "");
    }

    #[test]
    fn region_and_pragma_are_tolerated() {
        let source = "#region stuff\nclass A { }\n#endregion\n#pragma warning disable\n";
        let result = run(source, &[]);
        assert!(result.errors.is_empty());
        assert!(result.text.contains("class A"));
    }
}
