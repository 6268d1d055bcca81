//! Search types and data structures

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::{BindValue, EventRow};

/// Default page size when the request does not specify one
pub const DEFAULT_SIZE: usize = 100;

/// Canonical free-text column of the event schema
pub const DEFAULT_TEXT_FIELD: &str = "message";

/// Raw caller input: either a compact `field:value` string or a structured
/// clause document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawQuery {
    Compact(String),
    Document(SearchRequest),
}

/// Structured search request.
///
/// `query`, `aggs` and `sort` are kept as raw JSON so that malformed or
/// unrecognized content degrades at parse time instead of failing
/// deserialization of the whole request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
    #[serde(default, alias = "aggregations", skip_serializing_if = "Option::is_none")]
    pub aggs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<u64>,
}

/// Per-call search options
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Bypass the result cache for both lookup and storage
    pub skip_cache: bool,
}

/// Normalized intermediate representation consumed by the compiler,
/// aggregation evaluator and fuzzy post-filter
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuery {
    pub filters: Vec<Filter>,
    pub text_search: Option<TextSearch>,
    pub fuzzy: bool,
    pub aggregations: BTreeMap<String, AggSpec>,
    pub sort: Vec<SortSpec>,
    pub size: usize,
    pub from: usize,
}

impl Default for NormalizedQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            text_search: None,
            fuzzy: false,
            aggregations: BTreeMap::new(),
            sort: Vec::new(),
            size: DEFAULT_SIZE,
            from: 0,
        }
    }
}

/// One backend-agnostic predicate derived from the clause tree
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub kind: FilterKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind {
    /// Exact equality against a scalar
    Term(Value),
    /// Bounded comparison; at least one bound is always set
    Range(RangeBounds),
    /// Glob pattern with `*` and `?`
    Wildcard(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBounds {
    pub gte: Option<Value>,
    pub gt: Option<Value>,
    pub lte: Option<Value>,
    pub lt: Option<Value>,
}

impl RangeBounds {
    pub fn is_empty(&self) -> bool {
        self.gte.is_none() && self.gt.is_none() && self.lte.is_none() && self.lt.is_none()
    }
}

/// Free-text search spec
#[derive(Debug, Clone, PartialEq)]
pub struct TextSearch {
    pub field: String,
    pub query: String,
    pub fuzziness: u32,
    /// The query carries `field:value` mini-syntax to be split at compile time
    pub is_query_string: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One requested aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct AggSpec {
    pub kind: AggKind,
    pub field: String,
    pub size: Option<usize>,
    pub interval: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggKind {
    Terms,
    DateHistogram,
    Avg,
    Sum,
    Count,
}

/// Backend-ready query: SQL text plus ordered bind parameters.
///
/// Built fresh per search call and never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub text: String,
    pub params: Vec<BindValue>,
}

/// Full search response
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchResponse {
    pub hits: Hits,
    pub aggregations: BTreeMap<String, AggResult>,
    pub took_ms: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Hits {
    /// Count of the full ranked result set, before pagination
    pub total: usize,
    pub hits: Vec<HitDoc>,
}

/// One result document wrapping a store row
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HitDoc {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source")]
    pub source: EventRow,
    /// Populated only when fuzzy post-filtering ran
    #[serde(rename = "_score", skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Populated only when fuzzy post-filtering ran
    #[serde(rename = "_matches", skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<FieldMatch>>,
}

impl HitDoc {
    pub fn from_row(row: EventRow) -> Self {
        let id = match row.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        Self {
            id,
            source: row,
            score: None,
            matches: None,
        }
    }
}

/// Where a fuzzy match landed
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldMatch {
    pub field: String,
    pub score: f64,
}

/// Result of one aggregation
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum AggResult {
    Buckets { buckets: Vec<Bucket> },
    Value { value: f64 },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Bucket {
    pub key: Value,
    pub doc_count: i64,
}
