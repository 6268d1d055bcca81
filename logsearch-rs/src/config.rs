use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub search: SearchSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchSettings {
    /// Cached response lifetime in seconds
    pub cache_ttl_secs: u64,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::SearchError::Config(e.to_string()))?;

        toml::from_str(&content)
            .map_err(|e| crate::error::SearchError::Config(e.to_string()))
    }

    pub fn default() -> Self {
        Self {
            storage: StorageConfig {
                database_url: "sqlite://events.db".to_string(),
            },
            search: SearchSettings {
                cache_ttl_secs: 300,
            },
        }
    }
}
