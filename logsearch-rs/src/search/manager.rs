//! Search manager
//!
//! High-level entry point tying the pipeline together: parse, cache lookup,
//! compile, execute, fuzzy rank, aggregate, cache store.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::aggregations;
use super::cache::{ResultCache, DEFAULT_CACHE_TTL};
use super::compiler;
use super::fuzzy::{self, FuzzyMatcher, JaroWinklerMatcher};
use super::parser;
use super::templates;
use super::types::{HitDoc, Hits, RawQuery, SearchOptions, SearchResponse};
use crate::config::Config;
use crate::error::Result;
use crate::storage::EventStore;

/// Search manager configuration
pub struct SearchConfig {
    /// Cached response lifetime
    pub cache_ttl: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl From<&Config> for SearchConfig {
    fn from(config: &Config) -> Self {
        Self {
            cache_ttl: Duration::from_secs(config.search.cache_ttl_secs),
        }
    }
}

/// Query-DSL search over an event store.
///
/// The manager owns its result cache and template library; the store and
/// the fuzzy matcher are shared collaborators. Note that `bool` sub-clauses
/// are flattened conjunctively by the parser (a known limitation, see
/// [`parser`]).
pub struct SearchManager {
    store: Arc<dyn EventStore>,
    matcher: Arc<dyn FuzzyMatcher>,
    cache: ResultCache,
}

impl SearchManager {
    /// Create a manager with default configuration
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self::with_config(store, SearchConfig::default())
    }

    /// Create a manager with custom configuration
    pub fn with_config(store: Arc<dyn EventStore>, config: SearchConfig) -> Self {
        Self {
            store,
            matcher: Arc::new(JaroWinklerMatcher),
            cache: ResultCache::new(config.cache_ttl),
        }
    }

    /// Replace the similarity function used for fuzzy ranking
    pub fn set_matcher(&mut self, matcher: Arc<dyn FuzzyMatcher>) {
        self.matcher = matcher;
    }

    /// Run a search with default options
    pub async fn search(&self, raw: &RawQuery) -> Result<SearchResponse> {
        self.search_with_options(raw, &SearchOptions::default()).await
    }

    /// Run a search.
    ///
    /// A store failure on the primary hit query fails the whole call.
    /// Aggregation and fuzzy-ranking failures degrade instead: failed
    /// aggregations report empty results and a failed ranking falls back to
    /// the exact-match rows.
    pub async fn search_with_options(
        &self,
        raw: &RawQuery,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let started = Instant::now();
        let key = ResultCache::key(raw)?;

        if !options.skip_cache {
            if let Some(mut cached) = self.cache.get(&key).await {
                tracing::debug!("search cache hit");
                cached.took_ms = started.elapsed().as_millis() as u64;
                return Ok(cached);
            }
        }

        let query = parser::parse(raw);
        let compiled = compiler::compile(&query);
        tracing::debug!(
            "executing search: {} ({} params)",
            compiled.text,
            compiled.params.len()
        );

        let rows = self.store.query(&compiled.text, &compiled.params).await?;

        // fuzzy ranking only applies to a non-empty exact-match set; on
        // failure it degrades to the unranked rows rather than failing
        let ranked: Vec<HitDoc> = if query.fuzzy && !rows.is_empty() {
            match &query.text_search {
                Some(search) => match fuzzy::rank(self.matcher.as_ref(), &rows, search) {
                    Ok(hits) => hits,
                    Err(e) => {
                        tracing::warn!("fuzzy ranking failed, returning exact matches: {}", e);
                        rows.into_iter().map(HitDoc::from_row).collect()
                    }
                },
                None => rows.into_iter().map(HitDoc::from_row).collect(),
            }
        } else {
            rows.into_iter().map(HitDoc::from_row).collect()
        };

        let total = ranked.len();
        let page: Vec<HitDoc> = ranked
            .into_iter()
            .skip(query.from)
            .take(query.size)
            .collect();

        let aggregations = aggregations::evaluate(self.store.as_ref(), &query).await;

        let response = SearchResponse {
            hits: Hits { total, hits: page },
            aggregations,
            took_ms: started.elapsed().as_millis() as u64,
        };

        if !options.skip_cache {
            self.cache.put(key, response.clone()).await;
        }

        Ok(response)
    }

    /// Named example queries
    pub fn list_templates(&self) -> BTreeMap<String, RawQuery> {
        templates::list_templates()
    }

    /// Drop all cached responses
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Drop expired cached responses
    pub async fn sweep_cache(&self) {
        self.cache.sweep().await;
    }

    /// Number of cached responses, expired entries included
    pub async fn cached_responses(&self) -> usize {
        self.cache.len().await
    }
}
