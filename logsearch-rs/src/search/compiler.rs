//! Backend query compiler
//!
//! Turns a [`NormalizedQuery`] into parameterized SQL against the events
//! table. Field names come from the fixed store schema and are written into
//! the text; every caller-supplied value is passed as a bound parameter,
//! never interpolated.

use serde_json::Value;

use super::types::{CompiledQuery, Filter, FilterKind, NormalizedQuery, TextSearch};
use crate::storage::BindValue;

/// Compile a normalized query into SQL text plus ordered bind parameters.
/// Never fails; filters that produce no condition are simply absent from
/// the text.
pub fn compile(query: &NormalizedQuery) -> CompiledQuery {
    let mut text = String::from("SELECT * FROM events WHERE 1=1");
    let (conditions, mut params) = filter_conditions(&query.filters);
    for condition in &conditions {
        text.push_str(" AND ");
        text.push_str(condition);
    }

    // the fuzzy path fetches the full filtered set and narrows in-process,
    // so no text condition is compiled for it
    if !query.fuzzy {
        if let Some(search) = &query.text_search {
            let (text_conditions, text_params) = text_search_conditions(search);
            for condition in &text_conditions {
                text.push_str(" AND ");
                text.push_str(condition);
            }
            params.extend(text_params);
        }
    }

    if !query.sort.is_empty() {
        let order: Vec<String> = query
            .sort
            .iter()
            .map(|s| format!("{} {}", s.field, s.direction.as_sql()))
            .collect();
        text.push_str(" ORDER BY ");
        text.push_str(&order.join(", "));
    }

    // pagination happens in-process after ranking, so the limit covers
    // the window end rather than the page size
    text.push_str(" LIMIT ?");
    let limit = query.size.saturating_add(query.from);
    params.push(BindValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

    CompiledQuery { text, params }
}

/// Translate filters into SQL conditions and bind parameters, in declaration
/// order. Shared with the aggregation evaluator, which reuses the filter set
/// without the text search.
pub(crate) fn filter_conditions(filters: &[Filter]) -> (Vec<String>, Vec<BindValue>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    for filter in filters {
        match &filter.kind {
            FilterKind::Term(value) => {
                conditions.push(format!("{} = ?", filter.field));
                params.push(to_bind(value));
            }
            FilterKind::Range(bounds) => {
                let mut parts = Vec::new();
                if let Some(value) = &bounds.gte {
                    parts.push(format!("{} >= ?", filter.field));
                    params.push(to_bind(value));
                }
                if let Some(value) = &bounds.lte {
                    parts.push(format!("{} <= ?", filter.field));
                    params.push(to_bind(value));
                }
                if let Some(value) = &bounds.gt {
                    parts.push(format!("{} > ?", filter.field));
                    params.push(to_bind(value));
                }
                if let Some(value) = &bounds.lt {
                    parts.push(format!("{} < ?", filter.field));
                    params.push(to_bind(value));
                }
                if !parts.is_empty() {
                    conditions.push(parts.join(" AND "));
                }
            }
            FilterKind::Wildcard(pattern) => {
                conditions.push(format!("{} LIKE ?", filter.field));
                params.push(BindValue::Text(
                    pattern.replace('*', "%").replace('?', "_"),
                ));
            }
        }
    }

    (conditions, params)
}

fn text_search_conditions(search: &TextSearch) -> (Vec<String>, Vec<BindValue>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if search.is_query_string {
        for token in search.query.split_whitespace() {
            // boolean keywords inside the mini-syntax are discarded as no-ops
            if matches!(token, "AND" | "OR" | "NOT") {
                continue;
            }
            if let Some((field, value)) = token.split_once(':') {
                conditions.push(format!("{} LIKE ?", field));
                params.push(BindValue::Text(format!("%{}%", value)));
            } else {
                conditions.push(format!("{} LIKE ?", search.field));
                params.push(BindValue::Text(format!("%{}%", token)));
            }
        }
    } else {
        conditions.push(format!("{} LIKE ?", search.field));
        params.push(BindValue::Text(format!("%{}%", search.query)));
    }

    (conditions, params)
}

fn to_bind(value: &Value) -> BindValue {
    match value {
        Value::String(s) => BindValue::Text(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                BindValue::Integer(i)
            } else {
                BindValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::Bool(b) => BindValue::Integer(*b as i64),
        other => BindValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::parser;
    use crate::search::types::RawQuery;
    use serde_json::json;

    fn compile_document(body: serde_json::Value) -> CompiledQuery {
        let raw: RawQuery = serde_json::from_value(body).unwrap();
        compile(&parser::parse(&raw))
    }

    #[test]
    fn test_term_and_range_compile_in_order() {
        let compiled = compile_document(json!({
            "query": {"bool": {"must": [
                {"term": {"severity": "error"}},
                {"range": {"timestamp": {"gte": "2025-01-01T00:00:00Z"}}}
            ]}}
        }));

        assert_eq!(
            compiled.text,
            "SELECT * FROM events WHERE 1=1 AND severity = ? AND timestamp >= ? LIMIT ?"
        );
        assert_eq!(
            compiled.params,
            vec![
                BindValue::Text("error".to_string()),
                BindValue::Text("2025-01-01T00:00:00Z".to_string()),
                BindValue::Integer(100),
            ]
        );
    }

    #[test]
    fn test_range_with_both_bounds_emits_two_conditions() {
        let compiled = compile_document(json!({
            "query": {"range": {"value": {"gte": 10, "lte": 20}}}
        }));

        assert!(compiled.text.contains("value >= ? AND value <= ?"));
        assert_eq!(compiled.params[0], BindValue::Integer(10));
        assert_eq!(compiled.params[1], BindValue::Integer(20));
    }

    #[test]
    fn test_wildcard_pattern_translation() {
        let compiled = compile_document(json!({
            "query": {"wildcard": {"source": "api-*"}}
        }));

        assert!(compiled.text.contains("source LIKE ?"));
        assert_eq!(compiled.params[0], BindValue::Text("api-%".to_string()));

        let compiled = compile_document(json!({
            "query": {"wildcard": {"source": "?db"}}
        }));
        assert_eq!(compiled.params[0], BindValue::Text("_db".to_string()));
    }

    #[test]
    fn test_values_are_never_interpolated() {
        let hostile = "'; DROP TABLE logs; --";
        let compiled = compile_document(json!({
            "query": {"term": {"severity": hostile}}
        }));

        assert!(!compiled.text.contains(hostile));
        assert!(compiled.params.contains(&BindValue::Text(hostile.to_string())));
    }

    #[test]
    fn test_text_search_is_parameterized_like() {
        let compiled = compile_document(json!({
            "query": {"match": {"message": "timeout"}}
        }));

        assert!(compiled.text.contains("message LIKE ?"));
        assert!(compiled
            .params
            .contains(&BindValue::Text("%timeout%".to_string())));
    }

    #[test]
    fn test_fuzzy_compiles_no_text_condition() {
        let compiled = compile_document(json!({
            "query": {"bool": {"must": [
                {"term": {"severity": "error"}},
                {"match": {"message": {"query": "conection", "fuzziness": 2}}}
            ]}}
        }));

        assert_eq!(
            compiled.text,
            "SELECT * FROM events WHERE 1=1 AND severity = ? LIMIT ?"
        );
    }

    #[test]
    fn test_query_string_tokens_split_into_conditions() {
        let compiled = compile_document(json!({
            "query": {"query_string": {"query": "severity:error AND refused", "default_field": "message"}}
        }));

        assert!(compiled.text.contains("severity LIKE ?"));
        assert!(compiled.text.contains("message LIKE ?"));
        assert_eq!(
            compiled.params[0],
            BindValue::Text("%error%".to_string())
        );
        assert_eq!(
            compiled.params[1],
            BindValue::Text("%refused%".to_string())
        );
    }

    #[test]
    fn test_sort_clause_appended() {
        let compiled = compile_document(json!({
            "sort": [{"timestamp": {"order": "asc"}}, "severity"]
        }));

        assert!(compiled
            .text
            .contains(" ORDER BY timestamp ASC, severity DESC LIMIT ?"));
    }

    #[test]
    fn test_limit_covers_size_plus_offset() {
        let compiled = compile_document(json!({"size": 10, "from": 20}));

        assert!(compiled.text.ends_with(" LIMIT ?"));
        assert_eq!(compiled.params.last(), Some(&BindValue::Integer(30)));
    }

    #[test]
    fn test_compact_query_compiles() {
        let compiled = compile(&parser::parse(&RawQuery::Compact(
            "severity:error source:api".to_string(),
        )));

        assert_eq!(
            compiled.text,
            "SELECT * FROM events WHERE 1=1 AND severity = ? AND source = ? ORDER BY timestamp DESC LIMIT ?"
        );
    }
}
