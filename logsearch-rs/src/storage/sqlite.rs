//! SQLite-backed event store

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use uuid::Uuid;

use super::{BindValue, EventRow, EventStore};
use crate::error::Result;

/// New event to insert. `id` defaults to a random UUID and `timestamp`
/// to the current time when unset.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewEvent {
    pub id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub severity: String,
    pub source: String,
    pub device_id: Option<String>,
    pub category: Option<String>,
    pub message: String,
    pub value: Option<f64>,
}

/// Event store backed by a SQLite database
pub struct SqliteEventStore {
    db: SqlitePool,
}

impl SqliteEventStore {
    /// Create a store over an existing pool
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Connect to the given database URL
    pub async fn connect(url: &str) -> Result<Self> {
        let db = SqlitePool::connect(url).await?;
        Ok(Self { db })
    }

    /// Initialize the events table and its indexes
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                severity TEXT NOT NULL DEFAULT 'info',
                source TEXT NOT NULL DEFAULT '',
                device_id TEXT,
                category TEXT,
                message TEXT NOT NULL DEFAULT '',
                value REAL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)")
            .execute(&self.db)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_severity ON events(severity)")
            .execute(&self.db)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_source ON events(source)")
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Insert a single event, returning its id
    pub async fn insert_event(&self, event: &NewEvent) -> Result<String> {
        let id = event
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let timestamp = event
            .timestamp
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        sqlx::query(
            r#"
            INSERT INTO events (id, timestamp, severity, source, device_id, category, message, value)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&timestamp)
        .bind(&event.severity)
        .bind(&event.source)
        .bind(&event.device_id)
        .bind(&event.category)
        .bind(&event.message)
        .bind(event.value)
        .execute(&self.db)
        .await?;

        Ok(id)
    }
}

fn bind_params<'q>(
    text: &'q str,
    params: &'q [BindValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    let mut query = sqlx::query(text);
    for param in params {
        query = match param {
            BindValue::Text(v) => query.bind(v),
            BindValue::Integer(v) => query.bind(v),
            BindValue::Real(v) => query.bind(v),
        };
    }
    query
}

/// Decode a row into column-name/value pairs using the runtime SQLite type
fn row_to_json(row: &SqliteRow) -> EventRow {
    let mut out = EventRow::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let value = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => Value::Null,
            Ok(raw) => match raw.type_info().name() {
                "INTEGER" => row.try_get::<i64, _>(idx).map(Value::from).unwrap_or(Value::Null),
                "REAL" => row.try_get::<f64, _>(idx).map(Value::from).unwrap_or(Value::Null),
                _ => row.try_get::<String, _>(idx).map(Value::from).unwrap_or(Value::Null),
            },
            Err(_) => Value::Null,
        };
        out.insert(column.name().to_string(), value);
    }
    out
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn query(&self, text: &str, params: &[BindValue]) -> Result<Vec<EventRow>> {
        let rows = bind_params(text, params).fetch_all(&self.db).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn get(&self, text: &str, params: &[BindValue]) -> Result<Option<EventRow>> {
        let row = bind_params(text, params).fetch_optional(&self.db).await?;
        Ok(row.as_ref().map(row_to_json))
    }
}
