//! Query-DSL search engine
//!
//! Parses Elasticsearch-style requests, compiles them to parameterized SQL,
//! and evaluates them against the event store with optional fuzzy ranking,
//! aggregations and response caching.

pub mod aggregations;
pub mod cache;
pub mod compiler;
pub mod fuzzy;
pub mod manager;
pub mod parser;
pub mod templates;
pub mod types;

pub use cache::ResultCache;
pub use fuzzy::{FuzzyMatcher, JaroWinklerMatcher};
pub use manager::{SearchConfig, SearchManager};
pub use types::*;
