//! Template-variable placeholders.
//!
//! Three placeholder forms are recognized, all of them protected from query
//! rewriting:
//!
//! - `$name`
//! - `${name}`, `${name.field}`, `${name:format}`
//! - `[[name]]`, `[[name:format]]` (legacy form)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A placeholder found at the start of a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableRef<'a> {
    /// Byte length of the whole placeholder
    pub len: usize,
    pub name: &'a str,
    /// `${name.field}` path, if any
    pub field_path: Option<&'a str>,
    /// `${name:format}` or `[[name:format]]` format, if any
    pub format: Option<&'a str>,
}

/// Recognize a template-variable placeholder at the start of `input`.
pub fn find_variable(input: &str) -> Option<VariableRef<'_>> {
    if let Some(after) = input.strip_prefix("${") {
        let close = after.find('}')?;
        let inner = &after[..close];
        let (head, format) = split_once_opt(inner, ':');
        let (name, field_path) = split_once_opt(head, '.');
        if !is_word(name) {
            return None;
        }
        return Some(VariableRef {
            len: 2 + close + 1,
            name,
            field_path,
            format,
        });
    }

    if let Some(after) = input.strip_prefix("[[") {
        let close = after.find("]]")?;
        let inner = &after[..close];
        let (name, format) = split_once_opt(inner, ':');
        if !is_word(name) || !format.map_or(true, is_word) {
            return None;
        }
        return Some(VariableRef {
            len: 2 + close + 2,
            name,
            field_path: None,
            format,
        });
    }

    if let Some(after) = input.strip_prefix('$') {
        let end = word_len(after);
        if end == 0 {
            return None;
        }
        return Some(VariableRef {
            len: 1 + end,
            name: &after[..end],
            field_path: None,
            format: None,
        });
    }

    None
}

fn split_once_opt(s: &str, sep: char) -> (&str, Option<&str>) {
    match s.split_once(sep) {
        Some((a, b)) => (a, Some(b)),
        None => (s, None),
    }
}

fn word_len(s: &str) -> usize {
    s.char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map_or(s.len(), |(i, _)| i)
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && word_len(s) == s.len()
}

/// Value bound to a template variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Single(String),
    Multi(Vec<String>),
}

impl VariableValue {
    /// Text substituted for the placeholder. Multi-values become a regex alternation.
    pub fn serialize(&self) -> String {
        match self {
            VariableValue::Single(s) => s.clone(),
            VariableValue::Multi(values) => values.join("|"),
        }
    }
}

impl From<&str> for VariableValue {
    fn from(s: &str) -> Self {
        VariableValue::Single(s.to_string())
    }
}

impl From<Vec<String>> for VariableValue {
    fn from(values: Vec<String>) -> Self {
        VariableValue::Multi(values)
    }
}

/// Named template variables, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateVariables(BTreeMap<String, VariableValue>);

impl TemplateVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<VariableValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&VariableValue> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace known placeholders in `text`. Unknown ones are kept verbatim.
    pub fn interpolate(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut remaining = text;

        while let Some(pos) = remaining.find(|c: char| c == '$' || c == '[') {
            out.push_str(&remaining[..pos]);
            remaining = &remaining[pos..];

            match find_variable(remaining) {
                Some(var) => {
                    match self.get(var.name) {
                        Some(value) => out.push_str(&value.serialize()),
                        None => out.push_str(&remaining[..var.len]),
                    }
                    remaining = &remaining[var.len..];
                }
                None => {
                    // '$' and '[' are single-byte
                    out.push_str(&remaining[..1]);
                    remaining = &remaining[1..];
                }
            }
        }

        out.push_str(remaining);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_dollar_variable() {
        let var = find_variable("$job + 1").unwrap();
        assert_eq!(var.name, "job");
        assert_eq!(var.len, 4);
    }

    #[test]
    fn test_find_braced_variable() {
        let var = find_variable("${__rate_interval}]").unwrap();
        assert_eq!(var.name, "__rate_interval");
        assert_eq!(var.len, "${__rate_interval}".len());

        let var = find_variable("${host.name:regex}").unwrap();
        assert_eq!(var.name, "host");
        assert_eq!(var.field_path, Some("name"));
        assert_eq!(var.format, Some("regex"));
    }

    #[test]
    fn test_find_legacy_variable() {
        let var = find_variable("[[interval:raw]]").unwrap();
        assert_eq!(var.name, "interval");
        assert_eq!(var.format, Some("raw"));
        assert_eq!(var.len, 16);
    }

    #[test]
    fn test_not_a_variable() {
        assert!(find_variable("$").is_none());
        assert!(find_variable("$ x").is_none());
        assert!(find_variable("${}").is_none());
        assert!(find_variable("${open").is_none());
        assert!(find_variable("[[5m]").is_none());
        assert!(find_variable("[5m]").is_none());
        assert!(find_variable("metric").is_none());
    }

    #[test]
    fn test_serialize_variable_value() {
        assert_eq!(VariableValue::from("abc").serialize(), "abc");
        assert_eq!(VariableValue::Multi(vec![]).serialize(), "");
        let multi = VariableValue::from(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(multi.serialize(), "a|b|c");
    }

    #[test]
    fn test_interpolate() {
        let mut vars = TemplateVariables::new();
        vars.insert("job", "api");
        vars.insert("instance", vec!["a".to_string(), "b".to_string()]);

        let out = vars.interpolate(r#"up{job="$job",instance=~"${instance}"}[[job]] $unknown"#);
        assert_eq!(out, r#"up{job="api",instance=~"a|b"}api $unknown"#);
    }

    #[test]
    fn test_interpolate_leaves_plain_text() {
        let vars = TemplateVariables::new();
        let text = "rate(metric[5m]) * $__interval_ms $";
        assert_eq!(vars.interpolate(text), text);
    }

    #[test]
    fn test_variables_deserialize_from_toml() {
        let vars: TemplateVariables = toml::from_str("job = \"api\"\nzones = [\"a\", \"b\"]\n").unwrap();
        assert_eq!(vars.get("job"), Some(&VariableValue::from("api")));
        assert_eq!(vars.get("zones").map(VariableValue::serialize), Some("a|b".to_string()));
    }
}
