//! Event storage module
//!
//! The search engine consumes storage through the narrow [`EventStore`]
//! trait; [`sqlite`] provides the SQLite-backed implementation.

pub mod sqlite;

pub use sqlite::{NewEvent, SqliteEventStore};

use async_trait::async_trait;

use crate::error::Result;

/// One stored event row, column name to value
pub type EventRow = serde_json::Map<String, serde_json::Value>;

/// Positional query parameter
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

/// Read interface the search engine depends on.
///
/// Both operations take positional parameters. Caller-controlled values are
/// always bound through `params`, never spliced into the query text.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Execute a parameterized read query, returning all matching rows
    async fn query(&self, text: &str, params: &[BindValue]) -> Result<Vec<EventRow>>;

    /// Execute a parameterized read query, returning at most one row
    async fn get(&self, text: &str, params: &[BindValue]) -> Result<Option<EventRow>>;
}
