//! Panel query records and the request targets sent to the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::filters::{apply_adhoc_filters, AdhocFilter};
use crate::response::ListVariant;
use crate::template::TemplateVariables;
use crate::{Error, Result};

/// A panel query as stored in a dashboard.
///
/// Members this type does not model are kept in `extra` and written back
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryModel {
    #[serde(default)]
    pub ref_id: String,
    #[serde(default)]
    pub expr: String,
    #[serde(default)]
    pub expr_prom: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend_format_prom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_text_prom: Option<String>,
    #[serde(default)]
    pub expr_sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend_format_sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_text_sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefetch_count_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convert_sql_results: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_fill_secs: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Prepare `query` for execution.
///
/// `expr` is interpolated. `exprProm` and `exprSql` get the adhoc filters
/// folded in first and are interpolated afterwards, so placeholders inside
/// filter values are expanded too.
pub fn apply_template_variables(
    query: &QueryModel,
    filters: &[AdhocFilter],
    vars: &TemplateVariables,
) -> Result<QueryModel> {
    let expr_prom = apply_adhoc_filters(&query.expr_prom, filters)?;
    let expr_sql = apply_adhoc_filters(&query.expr_sql, filters)?;

    Ok(QueryModel {
        expr: vars.interpolate(&query.expr),
        expr_prom: vars.interpolate(&expr_prom),
        expr_sql: vars.interpolate(&expr_sql),
        ..query.clone()
    })
}

/// Dashboard time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Build a range from epoch milliseconds.
    pub fn from_epoch_ms(from: i64, to: i64) -> Result<Self> {
        let at = |ms: i64| {
            DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| Error::InvalidArgument(format!("timestamp out of range: {}", ms)))
        };
        Ok(Self::new(at(from)?, at(to)?))
    }

    pub fn from_ms(&self) -> i64 {
        self.from.timestamp_millis()
    }

    pub fn to_ms(&self) -> i64 {
        self.to.timestamp_millis()
    }

    pub fn from_secs(&self) -> i64 {
        self.from.timestamp()
    }

    pub fn to_secs(&self) -> i64 {
        self.to.timestamp()
    }
}

/// One entry of the `targets` list in a backend query request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryTarget {
    pub ref_id: String,
    pub raw_query_text: String,
    pub expr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr_prom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr_sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_lang: Option<String>,
    /// Epoch milliseconds, as text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_columns: Option<Vec<String>>,
}

impl QueryTarget {
    fn blank(variant: ListVariant, raw_query_text: impl Into<String>) -> Self {
        Self {
            ref_id: variant.ref_id().to_string(),
            raw_query_text: raw_query_text.into(),
            expr: String::new(),
            expr_prom: Some(String::new()),
            expr_sql: Some(String::new()),
            query_lang: None,
            time_from: None,
            time_to: None,
            time_columns: Some(Vec::new()),
        }
    }

    /// Metric-name request. Without a time range there is nothing to ask for.
    pub fn fetch_labels(range: Option<&TimeRange>) -> Option<Self> {
        let range = range?;
        Some(Self {
            time_from: Some(range.from_ms().to_string()),
            time_to: Some(range.to_ms().to_string()),
            time_columns: None,
            ..Self::blank(ListVariant::StaticLabels, "")
        })
    }

    pub fn tag_keys() -> Self {
        Self::blank(ListVariant::TagKeys, "")
    }

    pub fn tag_values(key: &str) -> Self {
        Self::blank(ListVariant::TagValues, key)
    }

    /// Series request for a query variable. Bounds are sent as epoch seconds.
    pub fn metric_find(query: &str, lang: &str, range: &TimeRange) -> Self {
        let text = format!("{}&start={}&end={}", query, range.from_secs(), range.to_secs());
        Self {
            expr: text.clone(),
            expr_prom: None,
            expr_sql: None,
            query_lang: Some(lang.to_string()),
            ..Self::blank(ListVariant::MetricFind, text)
        }
    }
}
