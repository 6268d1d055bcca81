//! logsearch-rs: query-DSL search engine for event logs
//!
//! Evaluates Elasticsearch-style search requests against a SQLite event
//! store. Requests are either nested clause documents (`bool`, `match`,
//! `term`, `range`, `wildcard`, `fuzzy`, `query_string`) or compact
//! `field:value` strings.
//!
//! # Features
//!
//! - Lenient parsing: unrecognized clause kinds are skipped, not fatal
//! - Parameterized SQL compilation; values are always bound, never spliced
//!   into query text
//! - `terms`, `date_histogram`, `avg`, `sum` and `count` aggregations over
//!   the filtered set
//! - Optional fuzzy re-ranking of exact matches, degrading to exact results
//!   on failure
//! - TTL-bounded response cache keyed by the serialized request
//!
//! # Known limitations
//!
//! - `bool` sub-clauses (`must`, `should`, `must_not`, `filter`) are all
//!   flattened into one conjunctive filter list; there are no true
//!   `should`/`must_not` semantics.
//! - `AND`/`OR`/`NOT` in compact strings and `query_string` syntax are
//!   recognized as tokens but not evaluated as operators.
//!
//! # Example
//!
//! ```no_run
//! use logsearch_rs::search::types::RawQuery;
//! use logsearch_rs::search::SearchManager;
//! use logsearch_rs::storage::SqliteEventStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteEventStore::connect("sqlite://events.db").await?;
//!     store.init_db().await?;
//!
//!     let manager = SearchManager::new(Arc::new(store));
//!     let response = manager
//!         .search(&RawQuery::Compact("severity:error source:api".to_string()))
//!         .await?;
//!     println!("{} hits in {}ms", response.hits.total, response.took_ms);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`search`]: Parser, compiler, aggregations, fuzzy ranking, cache
//! - [`storage`]: Event store trait and SQLite implementation

pub mod config;
pub mod error;
pub mod search;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SearchError};
pub use search::{SearchManager, SearchOptions};
pub use storage::{EventStore, SqliteEventStore};
