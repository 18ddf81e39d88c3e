//! Tests for the query tokenizer and rewriter.

use super::*;
use crate::matcher::MatchOp;
use crate::Error;

fn add(expr: &str) -> String {
    add_label_to_query(expr, "job", "api", MatchOp::Eq).unwrap()
}

fn kinds(expr: &str) -> Vec<TokenKind> {
    tokenize(expr).unwrap().iter().map(|t| t.kind).collect()
}

#[test]
fn test_bare_metric() {
    assert_eq!(add("http_requests_total"), r#"http_requests_total{job="api"}"#);
}

#[test]
fn test_existing_selector() {
    assert_eq!(
        add(r#"http_requests_total{method="GET"}"#),
        r#"http_requests_total{job="api",method="GET"}"#
    );
}

#[test]
fn test_existing_label_replaced() {
    assert_eq!(add(r#"up{job="old"}"#), r#"up{job="api"}"#);
}

#[test]
fn test_template_variable_untouched() {
    assert_eq!(add("${__rate_interval}"), "${__rate_interval}");
    assert_eq!(add("  $interval "), "  $interval ");
    assert_eq!(add("[[interval]]"), "[[interval]]");
}

#[test]
fn test_infinity_value() {
    let result = add_label_to_query("metric", "le", f64::INFINITY, MatchOp::Eq).unwrap();
    assert_eq!(result, r#"metric{le="+Inf"}"#);
}

#[test]
fn test_regex_operator() {
    let result = add_label_to_query("up", "status", "5..", MatchOp::Regex).unwrap();
    assert_eq!(result, r#"up{status=~"5.."}"#);
}

#[test]
fn test_empty_key_fails() {
    for expr in ["metric", "", "${x}", "up{"] {
        assert!(matches!(
            add_label_to_query(expr, "", "v", MatchOp::Eq),
            Err(Error::InvalidArgument(_))
        ));
    }
}

#[test]
fn test_nested_functions() {
    assert_eq!(
        add("sum(rate(http_requests_total[5m]))"),
        r#"sum(rate(http_requests_total{job="api"}[5m]))"#
    );
}

#[test]
fn test_multiple_metrics() {
    assert_eq!(add("foo / bar"), r#"foo{job="api"} / bar{job="api"}"#);
}

#[test]
fn test_grouping_labels_are_not_metrics() {
    assert_eq!(
        add("sum by (instance) (rate(x[5m]))"),
        r#"sum by (instance) (rate(x{job="api"}[5m]))"#
    );
    assert_eq!(
        add("sum(rate(x[5m])) without (instance, pod)"),
        r#"sum(rate(x{job="api"}[5m])) without (instance, pod)"#
    );
    assert_eq!(
        add("histogram_quantile(0.9, sum(rate(b_bucket[5m])) by (le))"),
        r#"histogram_quantile(0.9, sum(rate(b_bucket{job="api"}[5m])) by (le))"#
    );
}

#[test]
fn test_vector_matching() {
    assert_eq!(
        add(r#"a / on(instance) group_left(node) b{c="d"}"#),
        r#"a{job="api"} / on(instance) group_left(node) b{c="d",job="api"}"#
    );
    assert_eq!(add("up and on() down"), r#"up{job="api"} and on() down{job="api"}"#);
}

#[test]
fn test_keywords_and_literals() {
    assert_eq!(add("up == bool 1"), r#"up{job="api"} == bool 1"#);
    assert_eq!(add("up > NaN"), r#"up{job="api"} > NaN"#);
    assert_eq!(add("count(up) > 1e+3"), r#"count(up{job="api"}) > 1e+3"#);
    assert_eq!(add("rate(x[5m] offset 1h)"), r#"rate(x{job="api"}[5m] offset 1h)"#);
    assert_eq!(add("up @ start()"), r#"up{job="api"} @ start()"#);
}

#[test]
fn test_string_arguments_untouched() {
    assert_eq!(
        add(r#"label_replace(up, "dst", "$1", "src", "(.*)")"#),
        r#"label_replace(up{job="api"}, "dst", "$1", "src", "(.*)")"#
    );
    assert_eq!(
        add(r#"label_join(up, "x", "{", "a")"#),
        r#"label_join(up{job="api"}, "x", "{", "a")"#
    );
}

#[test]
fn test_range_with_variable() {
    assert_eq!(
        add("rate(metric[$__rate_interval])"),
        r#"rate(metric{job="api"}[$__rate_interval])"#
    );
    assert_eq!(
        add("rate(metric[${__rate_interval}])"),
        r#"rate(metric{job="api"}[${__rate_interval}])"#
    );
}

#[test]
fn test_subquery() {
    assert_eq!(
        add("max_over_time(rate(x[1m])[1h:5m])"),
        r#"max_over_time(rate(x{job="api"}[1m])[1h:5m])"#
    );
}

#[test]
fn test_variable_metric_names() {
    assert_eq!(add(r#"$metric{a="1"}"#), r#"$metric{a="1",job="api"}"#);
    assert_eq!(add("${prefix}_total"), "${prefix}_total");
    assert_eq!(add(r#"${prefix}_total{a="1"}"#), r#"${prefix}_total{a="1",job="api"}"#);
}

#[test]
fn test_selector_without_metric_name() {
    assert_eq!(add(r#"{__name__="up"}"#), r#"{__name__="up",job="api"}"#);
    assert_eq!(add(r#"metric {a="1"}"#), r#"metric {a="1",job="api"}"#);
}

#[test]
fn test_recording_rule_name() {
    assert_eq!(add("job:http_requests:rate5m"), r#"job:http_requests:rate5m{job="api"}"#);
}

#[test]
fn test_non_ascii_name_not_split() {
    assert_eq!(add("metric_é"), r#"metric_é{job="api"}"#);
    assert_eq!(add("rate(größe_total[5m])"), r#"rate(größe_total{job="api"}[5m])"#);
    let expr = "metric_é + 1";
    let texts: Vec<&str> = tokenize(expr).unwrap().iter().map(|t| t.text(expr)).collect();
    assert_eq!(texts, vec!["metric_é", " ", "+", " ", "1"]);
}

#[test]
fn test_comments_preserved() {
    assert_eq!(add("# total\nup"), "# total\nup{job=\"api\"}");
}

#[test]
fn test_malformed_expression_unchanged() {
    for expr in [r#"up{job="x""#, "rate(up[5m)", "up}", r#"up{job="x}"#, "${open"] {
        assert_eq!(add(expr), expr);
    }
}

#[test]
fn test_empty_expression() {
    assert_eq!(add(""), "");
    assert_eq!(add("   "), "   ");
}

#[test]
fn test_deterministic() {
    let expr = "sum(rate(a[5m])) / sum(rate(b[5m]))";
    assert_eq!(add(expr), add(expr));
}

#[test]
fn test_tokenize_kinds() {
    use TokenKind::*;
    assert_eq!(
        kinds("rate(x[5m])"),
        vec![Ident, Punct, Ident, Bracket, Punct]
    );
    assert_eq!(
        kinds(r#"up{a="}"} > 0.5 # c"#),
        vec![Ident, Selector, Whitespace, Punct, Whitespace, Number, Whitespace, Comment]
    );
    assert_eq!(kinds("$a [[b]] ${c}"), vec![Protected, Whitespace, Protected, Whitespace, Protected]);
}

#[test]
fn test_tokenize_spans() {
    let expr = "sum(up)";
    let tokens = tokenize(expr).unwrap();
    let texts: Vec<&str> = tokens.iter().map(|t| t.text(expr)).collect();
    assert_eq!(texts, vec!["sum", "(", "up", ")"]);
}

#[test]
fn test_tokenize_rejects_unterminated() {
    assert!(tokenize(r#"up{a="b"#).is_none());
    assert!(tokenize("'open").is_none());
    assert!(tokenize("x[5m").is_none());
    assert!(tokenize("x]").is_none());
}
