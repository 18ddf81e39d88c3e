//! CLI command implementations.

use std::io::{self, Read, Write};

use serde::Serialize;
use tracing::debug;

use promsel::{
    add_label_to_query, apply_adhoc_filters, apply_template_variables, decode_list_response,
    merge_label, regex_escape, AdhocFilter, Config, Error, LabelValue, ListVariant, MatchOp,
    QueryModel, QueryResponse, QueryTarget, TimeRange,
};

/// Request body the data source posts to the backend.
#[derive(Serialize)]
struct TargetRequest<'a> {
    targets: [&'a QueryTarget; 1],
}

/// Read a whole file, or stdin when no file is given.
fn read_input(file: Option<&str>) -> promsel::Result<String> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut content = String::new();
            io::stdin().read_to_string(&mut content)?;
            Ok(content)
        }
    }
}

/// Resolve `-o`, falling back to the configured default operator.
fn resolve_op(op: Option<&str>, config: &Config) -> promsel::Result<MatchOp> {
    match op {
        Some(op) => op.parse(),
        None => Ok(config.default_operator),
    }
}

fn parse_value(value: &str, numeric: bool) -> promsel::Result<LabelValue> {
    if !numeric {
        return Ok(LabelValue::from(value));
    }
    value
        .trim()
        .parse::<f64>()
        .map(LabelValue::Number)
        .map_err(|_| Error::InvalidArgument(format!("not a number: {:?}", value)))
}

/// Initialize the config root.
pub fn init() -> promsel::Result<()> {
    let config = Config::default_location()?;
    config.initialize()?;
    println!("promsel initialized at {}", config.root.display());
    Ok(())
}

/// Merge one matcher into a selector body.
pub fn merge(body: &str, key: &str, value: &str, op: Option<&str>, numeric: bool) -> promsel::Result<()> {
    let config = Config::load()?;
    let op = resolve_op(op, &config)?;
    let value = parse_value(value, numeric)?;

    let body = body.trim();
    let body = body
        .strip_prefix('{')
        .and_then(|b| b.strip_suffix('}'))
        .unwrap_or(body);

    println!("{}", merge_label(body, key, value, op)?);
    Ok(())
}

/// Add a matcher to every metric in an expression.
pub fn add(expr: &str, key: &str, value: &str, op: Option<&str>, numeric: bool) -> promsel::Result<()> {
    let config = Config::load()?;
    let op = resolve_op(op, &config)?;
    let value = parse_value(value, numeric)?;

    println!("{}", add_label_to_query(expr, key, value, op)?);
    Ok(())
}

/// Apply config filters, then command-line filters, to an expression.
pub fn apply(expr: &str, filters: &[String], use_config_filters: bool) -> promsel::Result<()> {
    let config = Config::load()?;

    let mut all: Vec<AdhocFilter> = if use_config_filters {
        config.filters.clone()
    } else {
        Vec::new()
    };
    for filter in filters {
        all.push(filter.parse()?);
    }
    debug!(count = all.len(), "applying adhoc filters");

    println!("{}", apply_adhoc_filters(expr, &all)?);
    Ok(())
}

pub fn escape(value: &str) -> promsel::Result<()> {
    println!("{}", regex_escape(&LabelValue::from(value)));
    Ok(())
}

/// Decode a list response and print one JSON record per line.
pub fn decode(variant: &str, file: Option<&str>) -> promsel::Result<()> {
    let variant: ListVariant = variant.parse()?;
    let raw = read_input(file)?;
    let response: QueryResponse = serde_json::from_str(&raw)?;

    let records = decode_list_response(&response, variant)?;
    debug!(%variant, count = records.len(), "decoded list payload");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for record in &records {
        writeln!(out, "{}", serde_json::to_string(record)?)?;
    }
    Ok(())
}

/// Apply config filters and variables to a panel query.
pub fn render(file: Option<&str>) -> promsel::Result<()> {
    let config = Config::load()?;
    let raw = read_input(file)?;
    let query: QueryModel = serde_json::from_str(&raw)?;

    let rendered = apply_template_variables(&query, &config.filters, &config.variables)?;
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

/// Print the request body for a list variant.
pub fn target(
    variant: &str,
    key: Option<&str>,
    query: Option<&str>,
    lang: &str,
    range: Option<(i64, i64)>,
) -> promsel::Result<()> {
    let variant: ListVariant = variant.parse()?;
    let range = range
        .map(|(from, to)| TimeRange::from_epoch_ms(from, to))
        .transpose()?;

    let target = match variant {
        ListVariant::TagKeys => QueryTarget::tag_keys(),
        ListVariant::TagValues => {
            let key = key.ok_or_else(|| Error::InvalidArgument("tag-values needs --key".to_string()))?;
            QueryTarget::tag_values(key)
        }
        ListVariant::StaticLabels => QueryTarget::fetch_labels(range.as_ref())
            .ok_or_else(|| Error::InvalidArgument("labels needs --from and --to".to_string()))?,
        ListVariant::MetricFind => {
            let query = query.ok_or_else(|| Error::InvalidArgument("metric-find needs --query".to_string()))?;
            let range = range
                .ok_or_else(|| Error::InvalidArgument("metric-find needs --from and --to".to_string()))?;
            QueryTarget::metric_find(query, lang, &range)
        }
    };

    let request = TargetRequest { targets: [&target] };
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}
