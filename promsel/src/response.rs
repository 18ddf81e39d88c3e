//! Response normalizer for label, tag and series list payloads.
//!
//! The backend answers list requests with a single data frame whose first
//! field holds one JSON-encoded string, shaped `{"data": [...]}`. Decoding is
//! forgiving: anything unexpected yields an empty list.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Random-access view over a field's values, for columnar in-memory frames.
pub trait ValueVector: fmt::Debug + Send + Sync {
    fn get(&self, index: usize) -> Option<Value>;
}

impl ValueVector for Vec<Value> {
    fn get(&self, index: usize) -> Option<Value> {
        self.as_slice().get(index).cloned()
    }
}

/// The values of one field, from whichever sources the producer populated.
#[derive(Debug, Clone, Default)]
pub struct FieldValues {
    vector: Option<Arc<dyn ValueVector>>,
    buffer: Option<Vec<Value>>,
    indexed: Option<Value>,
}

impl FieldValues {
    pub fn from_vector(vector: Arc<dyn ValueVector>) -> Self {
        Self {
            vector: Some(vector),
            ..Default::default()
        }
    }

    pub fn from_buffer(buffer: Vec<Value>) -> Self {
        Self {
            buffer: Some(buffer),
            ..Default::default()
        }
    }

    /// First value, trying the accessor, then the buffer, then plain indexing.
    ///
    /// A null value counts as missing and falls through to the next source.
    pub fn first(&self) -> Option<Value> {
        self.vector
            .as_ref()
            .and_then(|v| v.get(0))
            .filter(|v| !v.is_null())
            .or_else(|| {
                self.buffer
                    .as_ref()
                    .and_then(|b| b.first())
                    .filter(|v| !v.is_null())
                    .cloned()
            })
            .or_else(|| {
                let first = match self.indexed.as_ref()? {
                    Value::Array(items) => items.first(),
                    Value::Object(map) => map.get("0"),
                    _ => None,
                };
                first.filter(|v| !v.is_null()).cloned()
            })
    }
}

impl From<Value> for FieldValues {
    fn from(value: Value) -> Self {
        let buffer = match &value {
            Value::Object(map) => map.get("buffer").and_then(Value::as_array).cloned(),
            _ => None,
        };
        Self {
            vector: None,
            buffer,
            indexed: Some(value),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(deserializer).map(FieldValues::from)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub values: FieldValues,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataFrame {
    #[serde(default)]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseError {
    #[serde(default)]
    pub message: String,
}

/// A backend query result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub data: Vec<DataFrame>,
    #[serde(default)]
    pub error: Option<ResponseError>,
}

impl QueryResponse {
    /// First value of the first field of the first frame.
    pub fn first_value(&self) -> Option<Value> {
        self.data.first()?.fields.first()?.values.first()
    }

    /// Fail with `Error::Backend` if the response carries an error.
    pub fn check(&self) -> Result<()> {
        match &self.error {
            Some(err) => Err(Error::Backend(err.message.clone())),
            None => Ok(()),
        }
    }
}

/// `{ "text": ... }` record for tag keys, tag values and series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub text: String,
}

/// `{ "name": ... }` record for metric-name labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Tag(TagRecord),
    Label(LabelRecord),
}

impl Record {
    pub fn text(&self) -> &str {
        match self {
            Record::Tag(t) => &t.text,
            Record::Label(l) => &l.name,
        }
    }
}

/// Which list request a payload answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListVariant {
    /// Adhoc filter keys
    TagKeys,
    /// Adhoc filter values for one key
    TagValues,
    /// Metric names for the query editor
    StaticLabels,
    /// Series for a query variable
    MetricFind,
}

impl ListVariant {
    /// Request id the backend dispatches on.
    pub fn ref_id(self) -> &'static str {
        match self {
            ListVariant::TagKeys => "getKeysForAdHocFilter",
            ListVariant::TagValues => "getValueforKeyAdHocFilter",
            ListVariant::StaticLabels => "fetchLabels",
            ListVariant::MetricFind => "metricFindQuery",
        }
    }

    /// Whether a response `error` member is raised rather than decoded.
    ///
    /// Static label loading runs in the background and always degrades to
    /// an empty list.
    pub fn surfaces_backend_errors(self) -> bool {
        !matches!(self, ListVariant::StaticLabels)
    }
}

impl fmt::Display for ListVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListVariant::TagKeys => "tag-keys",
            ListVariant::TagValues => "tag-values",
            ListVariant::StaticLabels => "labels",
            ListVariant::MetricFind => "metric-find",
        };
        f.write_str(name)
    }
}

impl FromStr for ListVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [
            ListVariant::TagKeys,
            ListVariant::TagValues,
            ListVariant::StaticLabels,
            ListVariant::MetricFind,
        ]
        .into_iter()
        .find(|v| v.to_string() == s || v.ref_id() == s)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown list variant: {:?}", s)))
    }
}

/// Decode the list payload of `response` into records.
///
/// Returns an empty list when the payload is missing, not a string, not
/// JSON, or has no `data` array.
pub fn decode_list_payload(response: &QueryResponse, variant: ListVariant) -> Vec<Record> {
    let Some(entries) = payload_entries(response) else {
        return Vec::new();
    };

    match variant {
        ListVariant::TagKeys | ListVariant::TagValues => entries
            .iter()
            .filter_map(scalar_text)
            .map(|text| Record::Tag(TagRecord { text }))
            .collect(),
        ListVariant::StaticLabels => entries
            .iter()
            .filter_map(scalar_text)
            .map(|name| Record::Label(LabelRecord { name }))
            .collect(),
        ListVariant::MetricFind => entries
            .iter()
            .filter_map(|entry| entry.as_object().map(series_text))
            .map(|text| Record::Tag(TagRecord { text }))
            .collect(),
    }
}

/// Decode `response`, first raising its `error` member if `variant` surfaces
/// backend errors.
pub fn decode_list_response(response: &QueryResponse, variant: ListVariant) -> Result<Vec<Record>> {
    if variant.surfaces_backend_errors() {
        response.check()?;
    }
    Ok(decode_list_payload(response, variant))
}

/// Parse a raw JSON response, then decode it like [`decode_list_payload`].
pub fn decode_response_json(raw: &str, variant: ListVariant) -> Vec<Record> {
    match serde_json::from_str::<QueryResponse>(raw) {
        Ok(response) => decode_list_payload(&response, variant),
        Err(e) => {
            warn!(error = %e, %variant, "failed to parse query response");
            Vec::new()
        }
    }
}

fn payload_entries(response: &QueryResponse) -> Option<Vec<Value>> {
    let text = match response.first_value() {
        Some(Value::String(text)) => text,
        other => {
            debug!(found = ?other, "list payload is not a string");
            return None;
        }
    };

    let parsed: Value = match serde_json::from_str(&text) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "failed to decode list payload");
            return None;
        }
    };

    match parsed {
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(entries)) => Some(entries),
            _ => {
                debug!("list payload has no data array");
                None
            }
        },
        _ => {
            debug!("list payload is not an object");
            None
        }
    }
}

/// Text of a scalar entry; null and compound entries have none.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `name{k="v",...}` for one series record, members in document order.
fn series_text(series: &Map<String, Value>) -> String {
    let name = series
        .get("__name__")
        .and_then(scalar_text)
        .unwrap_or_default();

    let matchers: Vec<String> = series
        .iter()
        .filter(|(key, _)| key.as_str() != "__name__")
        .map(|(key, value)| {
            let value = scalar_text(value).unwrap_or_else(|| value.to_string());
            format!("{}=\"{}\"", key, value)
        })
        .collect();

    format!("{}{{{}}}", name, matchers.join(","))
}
