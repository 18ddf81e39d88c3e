//! Adhoc filters: dashboard-wide label matchers folded into every query.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::matcher::{regex_escape, LabelValue, MatchOp};
use crate::query::add_label_to_query;
use crate::{Error, Result};

/// A user-supplied `key<op>value` filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdhocFilter {
    pub key: String,
    #[serde(default)]
    pub operator: MatchOp,
    pub value: LabelValue,
}

impl AdhocFilter {
    pub fn new(key: impl Into<String>, operator: MatchOp, value: impl Into<LabelValue>) -> Self {
        Self {
            key: key.into(),
            operator,
            value: value.into(),
        }
    }

    /// Value as it goes into the selector; regex operators get it escaped.
    fn effective_value(&self) -> LabelValue {
        if self.operator.is_regex() {
            regex_escape(&self.value)
        } else {
            self.value.clone()
        }
    }
}

impl fmt::Display for AdhocFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.key, self.operator, self.value)
    }
}

/// Parse `key<op>value`, e.g. `job=~api.*`. The value is taken verbatim.
impl FromStr for AdhocFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let op_start = s
            .find(|c: char| c == '=' || c == '!')
            .ok_or_else(|| Error::InvalidArgument(format!("filter has no operator: {:?}", s)))?;

        let key = s[..op_start].trim();
        if key.is_empty() {
            return Err(Error::InvalidArgument(format!("filter has no key: {:?}", s)));
        }

        let (operator, op_len) = MatchOp::strip_prefix(&s[op_start..])
            .ok_or_else(|| Error::InvalidArgument(format!("filter has no operator: {:?}", s)))?;
        let value = &s[op_start + op_len..];

        Ok(Self::new(key, operator, value))
    }
}

/// Fold `filters` left to right into `expr`.
///
/// Equivalent to calling [`add_label_to_query`] once per filter; an empty
/// list returns `expr` unchanged. Regex-operator values are escaped first.
pub fn apply_adhoc_filters(expr: &str, filters: &[AdhocFilter]) -> Result<String> {
    filters.iter().try_fold(expr.to_string(), |acc, filter| {
        add_label_to_query(&acc, &filter.key, filter.effective_value(), filter.operator)
    })
}
