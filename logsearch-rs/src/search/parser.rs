//! Clause parser
//!
//! Turns a raw query into a [`NormalizedQuery`]. Parsing is deliberately
//! lenient and never fails: unrecognized clause or aggregation kinds are
//! skipped so that a partially-malformed request still returns a best-effort
//! result instead of failing the whole search.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use super::types::{
    AggKind, AggSpec, Filter, FilterKind, NormalizedQuery, RangeBounds, RawQuery, SearchRequest,
    SortDirection, SortSpec, TextSearch, DEFAULT_TEXT_FIELD,
};

/// Field names treated as dates by the compact-string form
const DATE_FIELDS: [&str; 4] = ["timestamp", "time", "date", "@timestamp"];

/// Parse a raw query into its normalized form
pub fn parse(raw: &RawQuery) -> NormalizedQuery {
    match raw {
        RawQuery::Compact(input) => parse_compact(input),
        RawQuery::Document(request) => parse_document(request),
    }
}

fn parse_document(request: &SearchRequest) -> NormalizedQuery {
    let mut query = NormalizedQuery::default();

    if let Some(clause) = &request.query {
        collect_clause(clause, &mut query);
    }
    if let Some(aggs) = &request.aggs {
        query.aggregations = parse_aggregations(aggs);
    }
    if let Some(sort) = &request.sort {
        query.sort = parse_sort(sort);
    }
    if let Some(size) = request.size {
        query.size = size as usize;
    }
    if let Some(from) = request.from {
        query.from = from as usize;
    }

    query
}

/// Recurse over one clause node, accumulating filters and text search.
///
/// `bool` sub-clauses (`must`, `should`, `must_not`, `filter`) are all
/// flattened into the same conjunctive list; true boolean semantics are a
/// known limitation.
fn collect_clause(clause: &Value, out: &mut NormalizedQuery) {
    let Some(obj) = clause.as_object() else {
        return;
    };

    for (kind, body) in obj {
        match kind.as_str() {
            "bool" => {
                for section in ["must", "should", "must_not", "filter"] {
                    match body.get(section) {
                        Some(Value::Array(clauses)) => {
                            for sub in clauses {
                                collect_clause(sub, out);
                            }
                        }
                        Some(single @ Value::Object(_)) => collect_clause(single, out),
                        _ => {}
                    }
                }
            }
            "match" => collect_match(body, out),
            "term" => collect_term(body, out),
            "range" => collect_range(body, out),
            "wildcard" => collect_wildcard(body, out),
            "fuzzy" => collect_fuzzy(body, out),
            "query_string" => collect_query_string(body, out),
            // unrecognized clause kinds contribute nothing
            _ => {}
        }
    }
}

fn collect_match(body: &Value, out: &mut NormalizedQuery) {
    let Some(obj) = body.as_object() else {
        return;
    };

    for (field, value) in obj {
        match value {
            Value::Object(params) => {
                let text = params.get("query").map(value_to_string).unwrap_or_default();
                let fuzziness =
                    params.get("fuzziness").and_then(Value::as_u64).unwrap_or(0) as u32;
                if fuzziness > 0 {
                    out.fuzzy = true;
                }
                out.text_search = Some(TextSearch {
                    field: field.clone(),
                    query: text,
                    fuzziness,
                    is_query_string: false,
                });
            }
            scalar => {
                out.text_search = Some(TextSearch {
                    field: field.clone(),
                    query: value_to_string(scalar),
                    fuzziness: 0,
                    is_query_string: false,
                });
            }
        }
    }
}

fn collect_term(body: &Value, out: &mut NormalizedQuery) {
    let Some(obj) = body.as_object() else {
        return;
    };

    for (field, value) in obj {
        // accept both {"term": {"field": v}} and {"term": {"field": {"value": v}}}
        let value = value.get("value").unwrap_or(value);
        out.filters.push(Filter {
            field: field.clone(),
            kind: FilterKind::Term(value.clone()),
        });
    }
}

fn collect_range(body: &Value, out: &mut NormalizedQuery) {
    let Some(obj) = body.as_object() else {
        return;
    };

    for (field, spec) in obj {
        let Some(spec) = spec.as_object() else {
            continue;
        };
        let bounds = RangeBounds {
            gte: spec.get("gte").cloned(),
            gt: spec.get("gt").cloned(),
            lte: spec.get("lte").cloned(),
            lt: spec.get("lt").cloned(),
        };
        // a range with no bounds set produces no filter
        if !bounds.is_empty() {
            out.filters.push(Filter {
                field: field.clone(),
                kind: FilterKind::Range(bounds),
            });
        }
    }
}

fn collect_wildcard(body: &Value, out: &mut NormalizedQuery) {
    let Some(obj) = body.as_object() else {
        return;
    };

    for (field, value) in obj {
        let pattern = match value {
            Value::Object(params) => params.get("value").map(value_to_string),
            scalar => Some(value_to_string(scalar)),
        };
        if let Some(pattern) = pattern {
            out.filters.push(Filter {
                field: field.clone(),
                kind: FilterKind::Wildcard(pattern),
            });
        }
    }
}

fn collect_fuzzy(body: &Value, out: &mut NormalizedQuery) {
    let Some(obj) = body.as_object() else {
        return;
    };

    for (field, value) in obj {
        let (text, fuzziness) = match value {
            Value::Object(params) => (
                params.get("value").map(value_to_string).unwrap_or_default(),
                params.get("fuzziness").and_then(Value::as_u64).unwrap_or(1) as u32,
            ),
            scalar => (value_to_string(scalar), 1),
        };
        out.fuzzy = true;
        out.text_search = Some(TextSearch {
            field: field.clone(),
            query: text,
            fuzziness,
            is_query_string: false,
        });
    }
}

fn collect_query_string(body: &Value, out: &mut NormalizedQuery) {
    let Some(params) = body.as_object() else {
        return;
    };
    let Some(text) = params.get("query").map(value_to_string) else {
        return;
    };

    let field = params
        .get("default_field")
        .and_then(Value::as_str)
        .or_else(|| {
            params
                .get("fields")
                .and_then(Value::as_array)
                .and_then(|fields| fields.first())
                .and_then(Value::as_str)
        })
        .unwrap_or(DEFAULT_TEXT_FIELD)
        .to_string();

    out.text_search = Some(TextSearch {
        field,
        query: text,
        fuzziness: 0,
        is_query_string: true,
    });
}

fn parse_aggregations(aggs: &Value) -> BTreeMap<String, AggSpec> {
    let mut out = BTreeMap::new();
    let Some(obj) = aggs.as_object() else {
        return out;
    };

    for (name, body) in obj {
        if let Some(spec) = parse_agg_spec(body) {
            out.insert(name.clone(), spec);
        }
    }
    out
}

fn parse_agg_spec(body: &Value) -> Option<AggSpec> {
    let obj = body.as_object()?;

    for (kind_name, params) in obj {
        let kind = match kind_name.as_str() {
            "terms" => AggKind::Terms,
            "date_histogram" => AggKind::DateHistogram,
            "avg" => AggKind::Avg,
            "sum" => AggKind::Sum,
            "count" | "value_count" => AggKind::Count,
            // unrecognized aggregation kinds are skipped
            _ => continue,
        };

        let params = params.as_object();
        let field = params
            .and_then(|p| p.get("field"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let size = params
            .and_then(|p| p.get("size"))
            .and_then(Value::as_u64)
            .map(|s| s as usize);
        let interval = params
            .and_then(|p| {
                p.get("interval")
                    .or_else(|| p.get("calendar_interval"))
                    .or_else(|| p.get("fixed_interval"))
            })
            .and_then(Value::as_str)
            .map(str::to_string);

        return Some(AggSpec {
            kind,
            field,
            size,
            interval,
        });
    }
    None
}

fn parse_sort(sort: &Value) -> Vec<SortSpec> {
    let mut out = Vec::new();
    let entries: Vec<&Value> = match sort {
        Value::Array(list) => list.iter().collect(),
        single => vec![single],
    };

    for entry in entries {
        match entry {
            // bare field names default to descending
            Value::String(field) => out.push(SortSpec {
                field: field.clone(),
                direction: SortDirection::Desc,
            }),
            Value::Object(obj) => {
                for (field, dir) in obj {
                    let direction = match dir {
                        Value::String(s) => parse_direction(s),
                        Value::Object(params) => params
                            .get("order")
                            .and_then(Value::as_str)
                            .map(parse_direction)
                            .unwrap_or(SortDirection::Desc),
                        _ => SortDirection::Desc,
                    };
                    out.push(SortSpec {
                        field: field.clone(),
                        direction,
                    });
                }
            }
            _ => {}
        }
    }
    out
}

fn parse_direction(raw: &str) -> SortDirection {
    if raw.eq_ignore_ascii_case("asc") {
        SortDirection::Asc
    } else {
        SortDirection::Desc
    }
}

/// Parse the compact `field:value` string form.
///
/// `AND`, `OR` and `NOT` are recognized as tokens but not evaluated as
/// operators; every clause combines conjunctively.
fn parse_compact(input: &str) -> NormalizedQuery {
    let mut query = NormalizedQuery {
        sort: vec![SortSpec {
            field: "timestamp".to_string(),
            direction: SortDirection::Desc,
        }],
        ..Default::default()
    };

    for token in tokenize(input) {
        if matches!(token.as_str(), "AND" | "OR" | "NOT") {
            continue;
        }

        if let Some((field, value)) = token.split_once(':') {
            let value = strip_quotes(value);
            if DATE_FIELDS.contains(&field) {
                query.filters.push(Filter {
                    field: field.to_string(),
                    kind: FilterKind::Range(RangeBounds {
                        gte: Some(Value::String(parse_date_value(value))),
                        ..Default::default()
                    }),
                });
            } else {
                query.filters.push(Filter {
                    field: field.to_string(),
                    kind: FilterKind::Term(Value::String(value.to_string())),
                });
            }
        } else {
            // bare tokens become the free-text term, last one wins
            let term = strip_quotes(&token);
            if !term.is_empty() {
                query.text_search = Some(TextSearch {
                    field: DEFAULT_TEXT_FIELD.to_string(),
                    query: term.to_string(),
                    fuzziness: 0,
                    is_query_string: false,
                });
            }
        }
    }

    query
}

/// Split on whitespace while keeping single- or double-quoted spans together.
/// Quote characters are preserved in the token and stripped at use sites.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in input.chars() {
        match quote {
            Some(q) if c == q => {
                current.push(c);
                quote = None;
            }
            Some(_) => current.push(c),
            None => match c {
                '\'' | '"' => {
                    current.push(c);
                    quote = Some(c);
                }
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                _ => current.push(c),
            },
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn strip_quotes(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.len() >= 2 {
        let bytes = trimmed.as_bytes();
        let quoted = (bytes[0] == b'"' && bytes[trimmed.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[trimmed.len() - 1] == b'\'');
        if quoted {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    trimmed
}

/// Normalize a date-like compact value to RFC 3339 UTC. Unparseable input
/// passes through unchanged and is left to the store to compare.
fn parse_date_value(value: &str) -> String {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return ts
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(at_midnight) = date.and_hms_opt(0, 0, 0) {
            return at_midnight
                .and_utc()
                .to_rfc3339_opts(SecondsFormat::Secs, true);
        }
    }
    value.to_string()
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
