//! Integration tests for the search engine over an in-memory SQLite store

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use logsearch_rs::error::{Result, SearchError};
use logsearch_rs::search::{
    AggResult, FuzzyMatcher, RawQuery, SearchConfig, SearchManager, SearchOptions,
};
use logsearch_rs::storage::{BindValue, EventRow, EventStore, NewEvent, SqliteEventStore};
use serde_json::json;
use sqlx::SqlitePool;

/// Helper to create an in-memory store for testing
async fn setup_store() -> SqliteEventStore {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let store = SqliteEventStore::new(pool);
    store.init_db().await.unwrap();
    store
}

#[allow(clippy::too_many_arguments)]
async fn insert_event(
    store: &SqliteEventStore,
    id: &str,
    timestamp: &str,
    severity: &str,
    source: &str,
    device_id: &str,
    category: &str,
    message: &str,
    value: Option<f64>,
) {
    store
        .insert_event(&NewEvent {
            id: Some(id.to_string()),
            timestamp: Some(
                DateTime::parse_from_rfc3339(timestamp)
                    .unwrap()
                    .with_timezone(&Utc),
            ),
            severity: severity.to_string(),
            source: source.to_string(),
            device_id: Some(device_id.to_string()),
            category: Some(category.to_string()),
            message: message.to_string(),
            value,
        })
        .await
        .unwrap();
}

/// 3 error rows (sources api, api, db) and 2 info rows
async fn seed_events(store: &SqliteEventStore) {
    insert_event(store, "e1", "2025-06-01T10:00:00Z", "error", "api", "sensor-1", "app", "connection refused", Some(10.0)).await;
    insert_event(store, "e2", "2025-06-01T11:00:00Z", "error", "api", "sensor-1", "app", "upstream timeout", Some(20.0)).await;
    insert_event(store, "e3", "2025-06-01T12:00:00Z", "error", "db", "sensor-2", "system", "disk full", Some(30.0)).await;
    insert_event(store, "i1", "2025-06-01T09:00:00Z", "info", "api", "sensor-1", "app", "service started", None).await;
    insert_event(store, "i2", "2025-06-01T08:00:00Z", "info", "web", "sensor-3", "system", "healthcheck ok", None).await;
}

fn raw(body: serde_json::Value) -> RawQuery {
    serde_json::from_value(body).unwrap()
}

/// Store wrapper counting primary query calls
struct CountingStore {
    inner: SqliteEventStore,
    queries: AtomicUsize,
}

#[async_trait::async_trait]
impl EventStore for CountingStore {
    async fn query(&self, text: &str, params: &[BindValue]) -> Result<Vec<EventRow>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query(text, params).await
    }

    async fn get(&self, text: &str, params: &[BindValue]) -> Result<Option<EventRow>> {
        self.inner.get(text, params).await
    }
}

struct FailingMatcher;

impl FuzzyMatcher for FailingMatcher {
    fn similarity(&self, _query: &str, _candidate: &str) -> Result<f64> {
        Err(SearchError::Fuzzy("matcher unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_bool_query_with_terms_aggregation() {
    let store = setup_store().await;
    seed_events(&store).await;
    let manager = SearchManager::new(Arc::new(store));

    let request = raw(json!({
        "query": {"bool": {"must": [
            {"term": {"severity": "error"}},
            {"range": {"timestamp": {"gte": "2025-01-01T00:00:00Z"}}}
        ]}},
        "aggs": {"by_source": {"terms": {"field": "source", "size": 5}}}
    }));

    let response = manager.search(&request).await.unwrap();

    assert_eq!(response.hits.total, 3);
    match &response.aggregations["by_source"] {
        AggResult::Buckets { buckets } => {
            assert_eq!(buckets.len(), 2);
            assert_eq!(buckets[0].key, json!("api"));
            assert_eq!(buckets[0].doc_count, 2);
            assert_eq!(buckets[1].key, json!("db"));
            assert_eq!(buckets[1].doc_count, 1);
        }
        other => panic!("expected buckets, got {:?}", other),
    }
}

#[tokio::test]
async fn test_compact_string_search() {
    let store = setup_store().await;
    seed_events(&store).await;
    let manager = SearchManager::new(Arc::new(store));

    let response = manager
        .search(&RawQuery::Compact("severity:error AND source:api".to_string()))
        .await
        .unwrap();

    assert_eq!(response.hits.total, 2);
    // compact queries sort by timestamp descending
    assert_eq!(response.hits.hits[0].id, "e2");
    assert_eq!(response.hits.hits[1].id, "e1");
}

#[tokio::test]
async fn test_pagination_returns_contiguous_slice() {
    let store = setup_store().await;
    seed_events(&store).await;
    let manager = SearchManager::new(Arc::new(store));

    let request = raw(json!({
        "sort": [{"timestamp": {"order": "desc"}}],
        "size": 2,
        "from": 1
    }));

    let response = manager.search(&request).await.unwrap();

    // the store fetches size+from rows; total counts that materialized set
    assert_eq!(response.hits.total, 3);
    assert_eq!(response.hits.hits.len(), 2);
    assert_eq!(response.hits.hits[0].id, "e2");
    assert_eq!(response.hits.hits[1].id, "e1");
}

#[tokio::test]
async fn test_wildcard_search() {
    let store = setup_store().await;
    seed_events(&store).await;
    let manager = SearchManager::new(Arc::new(store));

    let response = manager
        .search(&raw(json!({"query": {"wildcard": {"source": "a*"}}})))
        .await
        .unwrap();

    assert_eq!(response.hits.total, 3);
    assert!(response
        .hits
        .hits
        .iter()
        .all(|hit| hit.source["source"] == json!("api")));
}

#[tokio::test]
async fn test_query_string_search() {
    let store = setup_store().await;
    seed_events(&store).await;
    let manager = SearchManager::new(Arc::new(store));

    let response = manager
        .search(&raw(json!({
            "query": {"query_string": {"query": "severity:error refused", "default_field": "message"}}
        })))
        .await
        .unwrap();

    assert_eq!(response.hits.total, 1);
    assert_eq!(response.hits.hits[0].id, "e1");
}

#[tokio::test]
async fn test_scalar_aggregations() {
    let store = setup_store().await;
    seed_events(&store).await;
    let manager = SearchManager::new(Arc::new(store));

    let response = manager
        .search(&raw(json!({
            "query": {"term": {"severity": "error"}},
            "size": 0,
            "aggs": {
                "avg_value": {"avg": {"field": "value"}},
                "sum_value": {"sum": {"field": "value"}},
                "events": {"count": {"field": "id"}}
            }
        })))
        .await
        .unwrap();

    assert_eq!(response.aggregations["avg_value"], AggResult::Value { value: 20.0 });
    assert_eq!(response.aggregations["sum_value"], AggResult::Value { value: 60.0 });
    assert_eq!(response.aggregations["events"], AggResult::Value { value: 3.0 });
}

#[tokio::test]
async fn test_date_histogram_buckets_by_hour() {
    let store = setup_store().await;
    seed_events(&store).await;
    let manager = SearchManager::new(Arc::new(store));

    let response = manager
        .search(&raw(json!({
            "query": {"term": {"severity": "error"}},
            "size": 0,
            "aggs": {"over_time": {"date_histogram": {"field": "timestamp", "interval": "hour"}}}
        })))
        .await
        .unwrap();

    match &response.aggregations["over_time"] {
        AggResult::Buckets { buckets } => {
            assert_eq!(buckets.len(), 3);
            assert_eq!(buckets[0].key, json!("2025-06-01T10:00:00Z"));
            assert!(buckets.iter().all(|b| b.doc_count == 1));
        }
        other => panic!("expected buckets, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failing_aggregation_is_isolated() {
    let store = setup_store().await;
    seed_events(&store).await;
    let manager = SearchManager::new(Arc::new(store));

    let response = manager
        .search(&raw(json!({
            "query": {"term": {"severity": "error"}},
            "aggs": {
                "bad": {"terms": {"field": "no_such_column"}},
                "by_source": {"terms": {"field": "source"}}
            }
        })))
        .await
        .unwrap();

    // the failing aggregation reports empty, the valid one still works
    assert_eq!(
        response.aggregations["bad"],
        AggResult::Buckets { buckets: vec![] }
    );
    match &response.aggregations["by_source"] {
        AggResult::Buckets { buckets } => assert_eq!(buckets.len(), 2),
        other => panic!("expected buckets, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fuzzy_ranking_filters_and_scores() {
    let store = setup_store().await;
    seed_events(&store).await;
    let manager = SearchManager::new(Arc::new(store));

    let response = manager
        .search(&raw(json!({
            "query": {"match": {"message": {"query": "conection", "fuzziness": 1}}}
        })))
        .await
        .unwrap();

    assert_eq!(response.hits.total, 1);
    let hit = &response.hits.hits[0];
    assert_eq!(hit.id, "e1");
    assert!(hit.score.unwrap() > 0.9);
    let matches = hit.matches.as_ref().unwrap();
    assert!(matches.iter().any(|m| m.field == "message"));
}

#[tokio::test]
async fn test_fuzzy_failure_degrades_to_exact_results() {
    let store = setup_store().await;
    seed_events(&store).await;
    let mut manager = SearchManager::new(Arc::new(store));
    manager.set_matcher(Arc::new(FailingMatcher));

    let response = manager
        .search(&raw(json!({
            "query": {"match": {"message": {"query": "conection", "fuzziness": 2}}}
        })))
        .await
        .unwrap();

    // fuzzy fetches the full filtered set; the failed ranking returns it unranked
    assert_eq!(response.hits.total, 5);
    assert!(response.hits.hits.iter().all(|hit| hit.score.is_none()));
}

#[tokio::test]
async fn test_cache_avoids_second_store_query() {
    let store = setup_store().await;
    seed_events(&store).await;
    let counting = Arc::new(CountingStore {
        inner: store,
        queries: AtomicUsize::new(0),
    });
    let manager = SearchManager::new(counting.clone());
    let request = RawQuery::Compact("severity:error".to_string());

    let first = manager.search(&request).await.unwrap();
    let second = manager.search(&request).await.unwrap();

    assert_eq!(first.hits.total, second.hits.total);
    assert_eq!(counting.queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cache_expires_after_ttl() {
    let store = setup_store().await;
    seed_events(&store).await;
    let counting = Arc::new(CountingStore {
        inner: store,
        queries: AtomicUsize::new(0),
    });
    let manager = SearchManager::with_config(
        counting.clone(),
        SearchConfig {
            cache_ttl: Duration::from_millis(20),
        },
    );
    let request = RawQuery::Compact("severity:error".to_string());

    manager.search(&request).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    manager.search(&request).await.unwrap();

    assert_eq!(counting.queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_skip_cache_option() {
    let store = setup_store().await;
    seed_events(&store).await;
    let counting = Arc::new(CountingStore {
        inner: store,
        queries: AtomicUsize::new(0),
    });
    let manager = SearchManager::new(counting.clone());
    let request = RawQuery::Compact("severity:error".to_string());
    let options = SearchOptions { skip_cache: true };

    manager.search_with_options(&request, &options).await.unwrap();
    manager.search_with_options(&request, &options).await.unwrap();

    assert_eq!(counting.queries.load(Ordering::SeqCst), 2);
    assert_eq!(manager.cached_responses().await, 0);
}

#[tokio::test]
async fn test_primary_query_failure_propagates() {
    // no init_db, so the events table is missing
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let manager = SearchManager::new(Arc::new(SqliteEventStore::new(pool)));

    let result = manager
        .search(&RawQuery::Compact("severity:error".to_string()))
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_all_templates_execute() {
    let store = setup_store().await;
    seed_events(&store).await;
    let manager = SearchManager::new(Arc::new(store));

    for (name, request) in manager.list_templates() {
        let result = manager.search(&request).await;
        assert!(result.is_ok(), "template {} failed: {:?}", name, result.err());
    }
}

#[tokio::test]
async fn test_clear_cache() {
    let store = setup_store().await;
    seed_events(&store).await;
    let manager = SearchManager::new(Arc::new(store));
    let request = RawQuery::Compact("severity:error".to_string());

    manager.search(&request).await.unwrap();
    assert_eq!(manager.cached_responses().await, 1);

    manager.clear_cache().await;
    assert_eq!(manager.cached_responses().await, 0);
}
