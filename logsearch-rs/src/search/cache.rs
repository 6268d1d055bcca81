//! Search result cache
//!
//! Memoizes full responses keyed by the serialized raw request. Eviction is
//! lazy: expired entries are dropped by a sweep after every store, not by a
//! background timer, so growth between sweeps is bounded by call frequency.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::types::{RawQuery, SearchResponse};
use crate::error::Result;

/// Default cached response lifetime
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

struct CacheEntry {
    response: SearchResponse,
    stored_at: Instant,
}

/// TTL-bounded response cache. Racing writers on the same key are
/// last-writer-wins; each insert is atomic.
pub struct ResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Canonical cache key for a raw query. serde_json serializes object
    /// keys in sorted order, so two semantically identical requests produce
    /// the same key regardless of caller-side field ordering.
    pub fn key(raw: &RawQuery) -> Result<String> {
        Ok(serde_json::to_string(raw)?)
    }

    /// Look up a non-expired response
    pub async fn get(&self, key: &str) -> Option<SearchResponse> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.response.clone())
    }

    /// Store a response, then sweep expired entries
    pub async fn put(&self, key: String, response: SearchResponse) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                response,
                stored_at: Instant::now(),
            },
        );
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.stored_at.elapsed() <= ttl);
    }

    /// Drop expired entries
    pub async fn sweep(&self) {
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.stored_at.elapsed() <= ttl);
    }

    /// Drop all entries
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
