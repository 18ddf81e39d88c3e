//! Tokenizer for PromQL-style query expressions.
//!
//! Only the token classes the rewriter needs are distinguished. Selector and
//! bracket spans are single tokens, so their contents are never mistaken for
//! metric names.

use crate::selector::quoted_len;
use crate::template::find_variable;

/// Token classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Metric, function, keyword or label name
    Ident,
    /// `{...}` selector, braces included
    Selector,
    /// `[...]` range or subquery, brackets included
    Bracket,
    /// Template-variable placeholder
    Protected,
    /// Quoted string literal
    Str,
    /// Number or duration (`0.5`, `1e3`, `5m`, `1h30m`)
    Number,
    /// `# ...` up to end of line
    Comment,
    Whitespace,
    /// Any other single character
    Punct,
}

/// A token as a byte range into the source expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }
}

/// Split an expression into tokens.
///
/// Returns `None` for an unterminated string, selector, bracket or `${`
/// placeholder, or for a stray `}` / `]`.
pub fn tokenize(input: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        let rest = &input[pos..];
        let (kind, len) = next_token(rest)?;
        tokens.push(Token {
            kind,
            start: pos,
            end: pos + len,
        });
        pos += len;
    }

    Some(tokens)
}

/// Lex one token at the start of a non-empty `rest`.
fn next_token(rest: &str) -> Option<(TokenKind, usize)> {
    let c = rest.chars().next()?;

    if c.is_whitespace() {
        let len = rest.find(|c: char| !c.is_whitespace()).unwrap_or(rest.len());
        return Some((TokenKind::Whitespace, len));
    }

    if c == '#' {
        let len = rest.find('\n').unwrap_or(rest.len());
        return Some((TokenKind::Comment, len));
    }

    // Placeholders before brackets: `[[var]]` would otherwise lex as a range
    if let Some(var) = find_variable(rest) {
        return Some((TokenKind::Protected, var.len));
    }
    if let Some(after) = rest.strip_prefix("${") {
        // Malformed but closed placeholder, still protected
        let close = after.find('}')?;
        return Some((TokenKind::Protected, 2 + close + 1));
    }

    match c {
        '"' | '\'' | '`' => Some((TokenKind::Str, quoted_len(rest)?)),
        '{' => Some((TokenKind::Selector, selector_len(rest)?)),
        '[' => Some((TokenKind::Bracket, bracket_len(rest)?)),
        '}' | ']' => None,
        c if c.is_ascii_digit() => Some((TokenKind::Number, number_len(rest))),
        '.' if rest[1..].starts_with(|c: char| c.is_ascii_digit()) => {
            Some((TokenKind::Number, number_len(rest)))
        }
        c if is_ident_start(c) => Some((TokenKind::Ident, ident_len(rest))),
        c => Some((TokenKind::Punct, c.len_utf8())),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':'
}

/// Non-ASCII letters and digits continue a name so a selector never lands mid-word.
fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == ':'
}

fn ident_len(rest: &str) -> usize {
    rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len())
}

/// Length of a number or duration literal, including `1e-3` style exponents.
fn number_len(rest: &str) -> usize {
    let bytes = rest.as_bytes();
    let hex = rest.starts_with("0x") || rest.starts_with("0X");
    let mut end = 0;

    while end < bytes.len() {
        let b = bytes[end];
        let is_exponent_sign = (b == b'+' || b == b'-')
            && !hex
            && end > 0
            && matches!(bytes[end - 1], b'e' | b'E')
            && bytes[..end - 1].iter().all(|b| b.is_ascii_digit() || *b == b'.');
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || is_exponent_sign {
            end += 1;
        } else {
            break;
        }
    }
    end
}

/// Length of a `{...}` span. Quoted literals may contain `}`.
fn selector_len(rest: &str) -> Option<usize> {
    let mut pos = 1;
    while pos < rest.len() {
        let tail = &rest[pos..];
        let c = tail.chars().next()?;
        match c {
            '}' => return Some(pos + 1),
            '"' | '\'' | '`' => pos += quoted_len(tail)?,
            _ => pos += c.len_utf8(),
        }
    }
    None
}

/// Length of a `[...]` span, counting nested brackets.
fn bracket_len(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in rest.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
