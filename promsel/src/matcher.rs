//! Label matcher building blocks: operators, values and single matchers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::selector::{label_name_len, quoted_len};
use crate::{Error, Result};

/// Matcher operators accepted inside a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MatchOp {
    /// `=` exact match
    #[default]
    Eq,
    /// `!=` exact mismatch
    NotEq,
    /// `=~` regex match
    Regex,
    /// `!~` regex mismatch
    NotRegex,
}

impl MatchOp {
    /// Operator text as it appears in a selector.
    pub fn as_str(self) -> &'static str {
        match self {
            MatchOp::Eq => "=",
            MatchOp::NotEq => "!=",
            MatchOp::Regex => "=~",
            MatchOp::NotRegex => "!~",
        }
    }

    /// Whether the value is interpreted as a regular expression.
    pub fn is_regex(self) -> bool {
        matches!(self, MatchOp::Regex | MatchOp::NotRegex)
    }

    /// Match an operator at the start of `input`, returning it with its byte length.
    pub(crate) fn strip_prefix(input: &str) -> Option<(MatchOp, usize)> {
        // 2-char operators before `=`
        if input.starts_with("=~") {
            Some((MatchOp::Regex, 2))
        } else if input.starts_with("!~") {
            Some((MatchOp::NotRegex, 2))
        } else if input.starts_with("!=") {
            Some((MatchOp::NotEq, 2))
        } else if input.starts_with('=') {
            Some((MatchOp::Eq, 1))
        } else {
            None
        }
    }
}

impl fmt::Display for MatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match MatchOp::strip_prefix(s) {
            Some((op, len)) if len == s.len() => Ok(op),
            _ => Err(Error::InvalidArgument(format!("unknown matcher operator: {:?}", s))),
        }
    }
}

impl TryFrom<String> for MatchOp {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<MatchOp> for String {
    fn from(op: MatchOp) -> Self {
        op.as_str().to_string()
    }
}

/// A label value, either text or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelValue {
    Text(String),
    Number(f64),
}

impl LabelValue {
    /// The text, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LabelValue::Text(s) => Some(s),
            LabelValue::Number(_) => None,
        }
    }
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelValue::Text(s) => f.write_str(s),
            LabelValue::Number(n) => f.write_str(&format_number(*n)),
        }
    }
}

impl From<&str> for LabelValue {
    fn from(s: &str) -> Self {
        LabelValue::Text(s.to_string())
    }
}

impl From<String> for LabelValue {
    fn from(s: String) -> Self {
        LabelValue::Text(s)
    }
}

impl From<f64> for LabelValue {
    fn from(n: f64) -> Self {
        LabelValue::Number(n)
    }
}

impl From<i64> for LabelValue {
    fn from(n: i64) -> Self {
        LabelValue::Number(n as f64)
    }
}

/// Render a number the way label values expect it.
///
/// Positive infinity becomes `+Inf` (histogram `le` bucket convention).
/// Integral values print without a fraction. Magnitudes from 1e21 up and
/// below 1e-6 use exponent form.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "+Inf".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else if n == 0.0 {
        // also covers -0.0
        "0".to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        // exponent form, sign always written: 1e+21, 1.5e-7
        let exp = format!("{:e}", n);
        match exp.split_once('e') {
            Some((mantissa, power)) if !power.starts_with('-') => format!("{}e+{}", mantissa, power),
            _ => exp,
        }
    } else if n.fract() == 0.0 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

/// Escape a value for use inside a regex matcher.
///
/// Backslashes are doubled, then each `'` becomes `\\'`. Numbers pass through.
pub fn regex_escape(value: &LabelValue) -> LabelValue {
    match value {
        LabelValue::Text(s) => LabelValue::Text(s.replace('\\', "\\\\").replace('\'', "\\\\'")),
        LabelValue::Number(_) => value.clone(),
    }
}

/// Quote character a matcher value was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quote {
    #[default]
    Double,
    Single,
    Backtick,
}

impl Quote {
    pub fn as_char(self) -> char {
        match self {
            Quote::Double => '"',
            Quote::Single => '\'',
            Quote::Backtick => '`',
        }
    }

    pub(crate) fn from_char(c: char) -> Option<Quote> {
        match c {
            '"' => Some(Quote::Double),
            '\'' => Some(Quote::Single),
            '`' => Some(Quote::Backtick),
            _ => None,
        }
    }
}

/// A single `key<op>"value"` matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMatcher {
    /// Label name (never empty)
    pub key: String,
    pub op: MatchOp,
    /// Literal text between the quotes, escapes kept as written
    pub value: String,
    pub quote: Quote,
}

impl LabelMatcher {
    /// Build a double-quoted matcher.
    ///
    /// The key must be a label name (`[A-Za-z_][A-Za-z0-9_]*`) and the value
    /// must form a closed `"..."` literal as written, so the matcher always
    /// parses back.
    pub fn new(key: impl Into<String>, op: MatchOp, value: impl Into<LabelValue>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::InvalidArgument("label key must not be empty".to_string()));
        }
        if label_name_len(&key) != key.len() {
            return Err(Error::InvalidArgument(format!("invalid label key: {:?}", key)));
        }

        let value = value.into().to_string();
        let literal = format!("\"{}\"", value);
        if quoted_len(&literal) != Some(literal.len()) {
            return Err(Error::InvalidArgument(format!(
                "label value does not form a quoted literal: {:?}",
                value
            )));
        }

        Ok(Self {
            key,
            op,
            value,
            quote: Quote::Double,
        })
    }
}

impl fmt::Display for LabelMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = self.quote.as_char();
        write!(f, "{}{}{}{}{}", self.key, self.op, q, self.value, q)
    }
}
