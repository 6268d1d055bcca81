//! Canned queries for common operational questions
//!
//! A static, read-only set of named example queries. Callers can run them
//! as-is or use them as starting points; no parsing or execution logic of
//! its own.

use std::collections::BTreeMap;

use serde_json::json;

use super::types::{RawQuery, SearchRequest};

/// Named example queries
pub fn list_templates() -> BTreeMap<String, RawQuery> {
    let mut templates = BTreeMap::new();

    templates.insert(
        "recent_errors".to_string(),
        RawQuery::Document(SearchRequest {
            query: Some(json!({"term": {"severity": "error"}})),
            sort: Some(json!([{"timestamp": {"order": "desc"}}])),
            size: Some(50),
            ..Default::default()
        }),
    );

    templates.insert(
        "errors_by_source".to_string(),
        RawQuery::Document(SearchRequest {
            query: Some(json!({"term": {"severity": "error"}})),
            aggs: Some(json!({"by_source": {"terms": {"field": "source", "size": 10}}})),
            size: Some(0),
            ..Default::default()
        }),
    );

    templates.insert(
        "security_events".to_string(),
        RawQuery::Document(SearchRequest {
            query: Some(json!({"term": {"category": "security"}})),
            sort: Some(json!([{"timestamp": {"order": "desc"}}])),
            size: Some(100),
            ..Default::default()
        }),
    );

    templates.insert(
        "device_activity".to_string(),
        RawQuery::Document(SearchRequest {
            aggs: Some(json!({"by_device": {"terms": {"field": "device_id", "size": 20}}})),
            size: Some(0),
            ..Default::default()
        }),
    );

    templates.insert(
        "warning_timeline".to_string(),
        RawQuery::Document(SearchRequest {
            query: Some(json!({"term": {"severity": "warning"}})),
            aggs: Some(json!({
                "over_time": {"date_histogram": {"field": "timestamp", "interval": "hour"}}
            })),
            size: Some(0),
            ..Default::default()
        }),
    );

    templates.insert(
        "auth_failures".to_string(),
        RawQuery::Compact("category:auth severity:error".to_string()),
    );

    templates
}
