//! Label injection into full query expressions.

use crate::matcher::{LabelMatcher, LabelValue, MatchOp};
use crate::selector::merge_matcher;
use crate::Result;

use super::lexer::{tokenize, Token, TokenKind};

/// Operator and modifier keywords; never metric names.
const KEYWORDS: &[&str] = &[
    "and",
    "or",
    "unless",
    "atan2",
    "bool",
    "offset",
    "by",
    "without",
    "on",
    "ignoring",
    "group_left",
    "group_right",
    "inf",
    "nan",
];

/// Keywords that may be followed by a parenthesized label list.
const GROUPING_KEYWORDS: &[&str] = &["by", "without", "on", "ignoring", "group_left", "group_right"];

/// Add `key<op>"value"` to every metric reference in `expr`.
///
/// Existing selectors are merged in place. Bare metric names get a new
/// selector right after the name, before any `[range]` suffix. Template
/// placeholders are never touched, and an expression that fails to tokenize
/// is returned as is.
pub fn add_label_to_query(
    expr: &str,
    key: &str,
    value: impl Into<LabelValue>,
    op: MatchOp,
) -> Result<String> {
    let matcher = LabelMatcher::new(key, op, value)?;

    if is_protected_token(expr) {
        return Ok(expr.to_string());
    }

    let Some(tokens) = tokenize(expr) else {
        return Ok(expr.to_string());
    };

    Ok(rewrite(expr, &tokens, &matcher))
}

/// Whether the whole expression is a single template placeholder.
fn is_protected_token(expr: &str) -> bool {
    match tokenize(expr.trim()).as_deref() {
        Some([token]) => token.kind == TokenKind::Protected,
        _ => false,
    }
}

fn rewrite(expr: &str, tokens: &[Token], matcher: &LabelMatcher) -> String {
    let new_selector = format!("{{{}}}", matcher);
    let mut out = String::with_capacity(expr.len() + new_selector.len());

    let mut paren_depth = 0usize;
    // Paren depths of the open `by (...)`-style label lists
    let mut label_lists: Vec<usize> = Vec::new();
    let mut grouping_pending = false;

    for (i, token) in tokens.iter().enumerate() {
        let text = token.text(expr);

        if matches!(token.kind, TokenKind::Whitespace | TokenKind::Comment) {
            out.push_str(text);
            continue;
        }
        let after_grouping_keyword = std::mem::take(&mut grouping_pending);

        match token.kind {
            TokenKind::Selector => {
                out.push_str(&merge_matcher(&text[1..text.len() - 1], matcher));
            }
            TokenKind::Punct if text == "(" => {
                paren_depth += 1;
                if after_grouping_keyword {
                    label_lists.push(paren_depth);
                }
                out.push_str(text);
            }
            TokenKind::Punct if text == ")" => {
                if label_lists.last() == Some(&paren_depth) {
                    label_lists.pop();
                }
                paren_depth = paren_depth.saturating_sub(1);
                out.push_str(text);
            }
            TokenKind::Ident => {
                out.push_str(text);
                // label names inside `by (...)` are left alone
                let in_label_list = label_lists.last() == Some(&paren_depth);
                if in_label_list {
                    continue;
                }
                if is_keyword(text) {
                    grouping_pending = GROUPING_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(text));
                } else if is_bare_metric(expr, tokens, i) {
                    out.push_str(&new_selector);
                }
            }
            _ => out.push_str(text),
        }
    }

    out
}

fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

/// An identifier that names a metric and has no selector of its own.
fn is_bare_metric(expr: &str, tokens: &[Token], index: usize) -> bool {
    let token = &tokens[index];

    // Glued to a placeholder, e.g. `${prefix}_total`
    let glued_before = index > 0 && {
        let prev = &tokens[index - 1];
        prev.kind == TokenKind::Protected && prev.end == token.start
    };
    let glued_after = tokens
        .get(index + 1)
        .is_some_and(|next| next.kind == TokenKind::Protected);
    if glued_before || glued_after {
        return false;
    }

    let next = tokens[index + 1..]
        .iter()
        .find(|t| !matches!(t.kind, TokenKind::Whitespace | TokenKind::Comment));

    match next {
        // function call
        Some(t) if t.kind == TokenKind::Punct && t.text(expr) == "(" => false,
        Some(t) if t.kind == TokenKind::Selector => false,
        // aggregation with a leading modifier: `sum by (job) (...)`
        Some(t) if t.kind == TokenKind::Ident => {
            let word = t.text(expr);
            !(word.eq_ignore_ascii_case("by") || word.eq_ignore_ascii_case("without"))
        }
        _ => true,
    }
}
