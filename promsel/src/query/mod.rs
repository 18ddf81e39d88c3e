//! Label injection for PromQL-style query expressions.
//!
//! # Token classes
//!
//! - **Identifiers**: metric names, function names, keywords, grouping labels
//! - **Selectors**: `{job="api"}`, merged in place
//! - **Brackets**: `[5m]`, `[1h:5m]`, passed through
//! - **Placeholders**: `$var`, `${var}`, `[[var]]`, never rewritten
//! - **Strings, numbers, durations, comments**: passed through
//!
//! Only identifiers that name a metric (not followed by `(`, not a keyword,
//! not inside a `by (...)` list) receive a synthesized selector.

mod lexer;
mod rewrite;

pub use lexer::{tokenize, Token, TokenKind};
pub use rewrite::add_label_to_query;

#[cfg(test)]
mod tests;
