//! Selector merge engine.
//!
//! A selector body is the matcher list between `{` and `}`. Merging keeps
//! label keys unique and the matcher list ordered by key.

use std::fmt;

use crate::matcher::{LabelMatcher, LabelValue, MatchOp, Quote};
use crate::Result;

/// Parsed matcher list of a selector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectorBody {
    matchers: Vec<LabelMatcher>,
}

impl SelectorBody {
    /// Parse the text between the braces of a selector.
    ///
    /// Returns `None` if the text is not a well-formed matcher list.
    pub fn parse(body: &str) -> Option<Self> {
        let mut matchers = Vec::new();
        let mut remaining = body.trim_start();

        while !remaining.is_empty() {
            let (matcher, rest) = try_parse_matcher(remaining)?;
            matchers.push(matcher);
            remaining = rest.trim_start();

            if remaining.is_empty() {
                break;
            }
            // Separator; a trailing comma is allowed
            remaining = remaining.strip_prefix(',')?.trim_start();
        }

        Some(Self { matchers })
    }

    pub fn matchers(&self) -> &[LabelMatcher] {
        &self.matchers
    }

    pub fn get(&self, key: &str) -> Option<&LabelMatcher> {
        self.matchers.iter().find(|m| m.key == key)
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Merge a matcher, replacing any matcher with the same key.
    pub fn merge(&mut self, matcher: LabelMatcher) {
        self.matchers.retain(|m| m.key != matcher.key);
        self.matchers.push(matcher);
        // stable, so repeated keys written by the user keep their order
        self.matchers.sort_by(|a, b| a.key.cmp(&b.key));
    }
}

impl fmt::Display for SelectorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, m) in self.matchers.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", m)?;
        }
        f.write_str("}")
    }
}

/// Merge `key<op>"value"` into a selector body and return the braced selector.
///
/// An empty key is an `InvalidArgument` error. A body that does not parse is
/// returned braced and otherwise untouched.
pub fn merge_label(
    selector_body: &str,
    key: &str,
    value: impl Into<LabelValue>,
    op: MatchOp,
) -> Result<String> {
    let matcher = LabelMatcher::new(key, op, value)?;
    Ok(merge_matcher(selector_body, &matcher))
}

/// Merge an already validated matcher into a selector body.
pub(crate) fn merge_matcher(selector_body: &str, matcher: &LabelMatcher) -> String {
    match SelectorBody::parse(selector_body) {
        Some(mut body) => {
            body.merge(matcher.clone());
            body.to_string()
        }
        None => format!("{{{}}}", selector_body),
    }
}

/// Try to parse one matcher (`key<op>"value"`).
fn try_parse_matcher(input: &str) -> Option<(LabelMatcher, &str)> {
    let key_end = label_name_len(input);
    if key_end == 0 {
        return None;
    }
    let key = &input[..key_end];

    let after_key = input[key_end..].trim_start();
    let (op, op_len) = MatchOp::strip_prefix(after_key)?;
    let after_op = after_key[op_len..].trim_start();

    let (value, quote, rest) = try_parse_quoted(after_op)?;

    Some((
        LabelMatcher {
            key: key.to_string(),
            op,
            value: value.to_string(),
            quote,
        },
        rest,
    ))
}

/// Length of a label name (`[A-Za-z_][A-Za-z0-9_]*`) at the start of `input`.
pub(crate) fn label_name_len(input: &str) -> usize {
    for (i, c) in input.char_indices() {
        let ok = if i == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };
        if !ok {
            return i;
        }
    }
    input.len()
}

/// Try to parse a quoted literal. Returns the raw contents, quote style and rest.
fn try_parse_quoted(input: &str) -> Option<(&str, Quote, &str)> {
    let quote = Quote::from_char(input.chars().next()?)?;
    let end = quoted_len(input)?;
    // quote chars are single-byte
    Some((&input[1..end - 1], quote, &input[end..]))
}

/// Byte length of the quoted literal at the start of `input`, quotes included.
///
/// Backslash escapes apply inside `"` and `'` literals but not backtick ones.
pub(crate) fn quoted_len(input: &str) -> Option<usize> {
    let quote = input.chars().next()?;
    let escapes = quote != '`';
    let mut chars = input.char_indices().skip(1);

    while let Some((i, c)) = chars.next() {
        if escapes && c == '\\' {
            chars.next()?;
        } else if c == quote {
            return Some(i + 1);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_merge_into_empty_body() {
        assert_eq!(merge_label("", "job", "api", MatchOp::Eq).unwrap(), r#"{job="api"}"#);
    }

    #[test]
    fn test_merge_into_existing_body() {
        let result = merge_label(r#"env="prod""#, "job", "api", MatchOp::Eq).unwrap();
        assert_eq!(result, r#"{env="prod",job="api"}"#);
    }

    #[test]
    fn test_merge_uses_operator() {
        let result = merge_label("", "status", "5..", MatchOp::Regex).unwrap();
        assert_eq!(result, r#"{status=~"5.."}"#);
    }

    #[test]
    fn test_merge_identical_is_idempotent() {
        let once = merge_label(r#"job="api""#, "job", "api", MatchOp::Eq).unwrap();
        assert_eq!(once, r#"{job="api"}"#);
        let inner = &once[1..once.len() - 1];
        assert_eq!(merge_label(inner, "job", "api", MatchOp::Eq).unwrap(), once);
    }

    #[test]
    fn test_merge_replaces_same_key() {
        let result = merge_label(r#"a="1",job="old",z="9""#, "job", "new", MatchOp::NotEq).unwrap();
        assert_eq!(result, r#"{a="1",job!="new",z="9"}"#);
    }

    #[test]
    fn test_merge_collapses_duplicate_keys() {
        let result = merge_label(r#"job="a",job=~"b""#, "job", "c", MatchOp::Eq).unwrap();
        assert_eq!(result, r#"{job="c"}"#);
    }

    #[test]
    fn test_merge_sorts_by_key() {
        let result = merge_label(r#"zone="b", app="x""#, "method", "GET", MatchOp::Eq).unwrap();
        assert_eq!(result, r#"{app="x",method="GET",zone="b"}"#);
    }

    #[test]
    fn test_merge_empty_key_fails() {
        for body in ["", r#"job="api""#, "garbage{"] {
            assert!(matches!(
                merge_label(body, "", "v", MatchOp::Eq),
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_merge_infinity() {
        let result = merge_label("", "le", f64::INFINITY, MatchOp::Eq).unwrap();
        assert_eq!(result, r#"{le="+Inf"}"#);
    }

    #[test]
    fn test_existing_literals_are_preserved() {
        let body = r#"path=~'/api/.*', msg="say \"hi\", bye", raw=`a\b`"#;
        let result = merge_label(body, "job", "x", MatchOp::Eq).unwrap();
        assert_eq!(
            result,
            r#"{job="x",msg="say \"hi\", bye",path=~'/api/.*',raw=`a\b`}"#
        );
    }

    #[test]
    fn test_trailing_comma_and_whitespace() {
        let result = merge_label(r#"  a = "1" ,  "#, "b", "2", MatchOp::Eq).unwrap();
        assert_eq!(result, r#"{a="1",b="2"}"#);
    }

    #[test]
    fn test_malformed_body_is_left_alone() {
        assert_eq!(merge_label(r#"job="#, "a", "b", MatchOp::Eq).unwrap(), r#"{job=}"#);
        assert_eq!(merge_label(r#"job="x"#, "a", "b", MatchOp::Eq).unwrap(), r#"{job="x}"#);
        assert_eq!(merge_label(r#"a="1" b="2""#, "c", "3", MatchOp::Eq).unwrap(), r#"{a="1" b="2"}"#);
    }

    #[test]
    fn test_parse_body() {
        let body = SelectorBody::parse(r#"job="api",code!~"5..""#).unwrap();
        assert_eq!(body.len(), 2);
        let code = body.get("code").unwrap();
        assert_eq!(code.op, MatchOp::NotRegex);
        assert_eq!(code.value, "5..");
        assert!(SelectorBody::parse("   ").unwrap().is_empty());
    }

    #[test]
    fn test_quoted_len() {
        assert_eq!(quoted_len(r#""abc" rest"#), Some(5));
        assert_eq!(quoted_len(r#""a\"c""#), Some(6));
        assert_eq!(quoted_len(r"`a\`"), Some(4));
        assert_eq!(quoted_len(r#""open"#), None);
    }
}
