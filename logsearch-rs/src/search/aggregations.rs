//! Aggregation evaluator
//!
//! Runs one grouped or scalar query per requested aggregation, reusing the
//! compiled filter conditions. The text search and fuzzy ranking never
//! narrow aggregations: they describe the structurally filtered population,
//! not the ranked hits.

use std::collections::BTreeMap;

use futures::future::join_all;
use serde_json::Value;

use super::compiler;
use super::types::{AggKind, AggResult, AggSpec, Bucket, NormalizedQuery};
use crate::error::Result;
use crate::storage::{BindValue, EventRow, EventStore};

/// Default bucket count for terms aggregations
pub const DEFAULT_TERMS_SIZE: usize = 10;

const HOUR_FORMAT: &str = "%Y-%m-%dT%H:00:00Z";

/// Evaluate every requested aggregation concurrently. A failure in one
/// aggregation is logged and replaced with an empty result for that key
/// only; it never aborts the others or the enclosing search.
pub async fn evaluate(
    store: &dyn EventStore,
    query: &NormalizedQuery,
) -> BTreeMap<String, AggResult> {
    if query.aggregations.is_empty() {
        return BTreeMap::new();
    }

    let (from_clause, params) = filtered_from(query);

    let tasks = query.aggregations.iter().map(|(name, spec)| {
        let from_clause = from_clause.clone();
        let params = params.clone();
        async move {
            let result = match evaluate_one(store, spec, &from_clause, params).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!("aggregation '{}' failed: {}", name, e);
                    empty_result(spec.kind)
                }
            };
            (name.clone(), result)
        }
    });

    join_all(tasks).await.into_iter().collect()
}

fn filtered_from(query: &NormalizedQuery) -> (String, Vec<BindValue>) {
    let (conditions, params) = compiler::filter_conditions(&query.filters);
    let mut clause = String::from("FROM events WHERE 1=1");
    for condition in &conditions {
        clause.push_str(" AND ");
        clause.push_str(condition);
    }
    (clause, params)
}

async fn evaluate_one(
    store: &dyn EventStore,
    spec: &AggSpec,
    from_clause: &str,
    mut params: Vec<BindValue>,
) -> Result<AggResult> {
    let field = &spec.field;
    match spec.kind {
        AggKind::Terms => {
            let size = spec.size.unwrap_or(DEFAULT_TERMS_SIZE);
            let text = format!(
                "SELECT {field} AS key, COUNT(*) AS doc_count {from_clause} \
                 GROUP BY {field} ORDER BY doc_count DESC LIMIT ?"
            );
            params.push(BindValue::Integer(size as i64));
            let rows = store.query(&text, &params).await?;
            Ok(AggResult::Buckets {
                buckets: rows.iter().map(bucket_from_row).collect(),
            })
        }
        AggKind::DateHistogram => {
            let fmt = interval_format(spec.interval.as_deref());
            let text = format!(
                "SELECT strftime('{fmt}', {field}) AS key, COUNT(*) AS doc_count \
                 {from_clause} GROUP BY key ORDER BY key"
            );
            let rows = store.query(&text, &params).await?;
            Ok(AggResult::Buckets {
                buckets: rows.iter().map(bucket_from_row).collect(),
            })
        }
        AggKind::Avg => {
            scalar(store, format!("SELECT AVG({field}) AS value {from_clause}"), &params).await
        }
        AggKind::Sum => {
            scalar(store, format!("SELECT SUM({field}) AS value {from_clause}"), &params).await
        }
        AggKind::Count => {
            scalar(store, format!("SELECT COUNT(*) AS value {from_clause}"), &params).await
        }
    }
}

async fn scalar(store: &dyn EventStore, text: String, params: &[BindValue]) -> Result<AggResult> {
    let row = store.get(&text, params).await?;
    // AVG and SUM over zero rows come back NULL, reported as zero
    let value = row
        .as_ref()
        .and_then(|r| r.get("value"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    Ok(AggResult::Value { value })
}

/// Truncation format for date histogram buckets. Unsupported intervals fall
/// back to hour granularity.
fn interval_format(interval: Option<&str>) -> &'static str {
    match interval {
        Some("minute") => "%Y-%m-%dT%H:%M:00Z",
        Some("hour") | None => HOUR_FORMAT,
        Some("day") => "%Y-%m-%dT00:00:00Z",
        Some(other) => {
            tracing::debug!("unsupported date_histogram interval '{}', using hour", other);
            HOUR_FORMAT
        }
    }
}

fn bucket_from_row(row: &EventRow) -> Bucket {
    Bucket {
        key: row.get("key").cloned().unwrap_or(Value::Null),
        doc_count: row.get("doc_count").and_then(Value::as_i64).unwrap_or(0),
    }
}

fn empty_result(kind: AggKind) -> AggResult {
    match kind {
        AggKind::Terms | AggKind::DateHistogram => AggResult::Buckets {
            buckets: Vec::new(),
        },
        AggKind::Avg | AggKind::Sum | AggKind::Count => AggResult::Value { value: 0.0 },
    }
}
