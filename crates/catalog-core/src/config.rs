//! Centralized configuration for the catalog cache.
//!
//! Fixed tuning constants live on unit structs; everything an operator may
//! want to change lives on [`CatalogCacheConfig`], which loads from JSON.

use crate::error::{CatalogError, Result};
use crate::matcher::MatchConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sync and search tuning.
pub struct SyncConfig;

impl SyncConfig {
    /// Records requested per export page.
    pub const PAGE_SIZE: u32 = 10_000;
    /// Results returned by `search` when no limit is given.
    pub const DEFAULT_SEARCH_LIMIT: usize = 20;
    /// Age after which a synced cache is considered due for refresh.
    pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
    /// Delta entries written per store call; cancellation is checked between chunks.
    pub const DELTA_WRITE_CHUNK: usize = 1_000;
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const USER_AGENT: &'static str = concat!("catalog-cache/", env!("CARGO_PKG_VERSION"));
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:3000/api/";
}

/// Local storage configuration.
pub struct StorageConfig;

impl StorageConfig {
    /// Rough per-record footprint used when the backend cannot report its size.
    pub const ESTIMATED_RECORD_BYTES: u64 = 300;
    pub const CACHE_DIR_NAME: &'static str = "catalog-cache";
    pub const DB_FILENAME: &'static str = "catalog.sqlite";
}

/// Remote endpoint paths, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CatalogEndpoints {
    pub version: String,
    pub export: String,
    pub updates: String,
}

impl Default for CatalogEndpoints {
    fn default() -> Self {
        Self {
            version: "catalog/version".to_string(),
            export: "catalog/export".to_string(),
            updates: "catalog/updates".to_string(),
        }
    }
}

/// Operator-facing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CatalogCacheConfig {
    /// Base URL of the catalog API.
    pub base_url: String,
    /// Endpoint paths under `base_url`.
    pub endpoints: CatalogEndpoints,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Records requested per export page.
    pub page_size: u32,
    /// SQLite database location (`None` = platform cache dir).
    pub db_path: Option<PathBuf>,
    /// Search ranking settings.
    pub matching: MatchConfig,
}

impl Default for CatalogCacheConfig {
    fn default() -> Self {
        Self {
            base_url: NetworkConfig::DEFAULT_BASE_URL.to_string(),
            endpoints: CatalogEndpoints::default(),
            request_timeout_secs: NetworkConfig::REQUEST_TIMEOUT.as_secs(),
            page_size: SyncConfig::PAGE_SIZE,
            db_path: None,
            matching: MatchConfig::default(),
        }
    }
}

impl CatalogCacheConfig {
    /// Load and validate a configuration file.
    ///
    /// Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| CatalogError::io_with_path(e, path))?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| CatalogError::Config {
            message: format!("Invalid config file {}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(CatalogError::Config {
                message: "page_size must be greater than zero".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(CatalogError::Config {
                message: "request_timeout_secs must be greater than zero".to_string(),
            });
        }
        url::Url::parse(&self.base_url).map_err(|e| CatalogError::Config {
            message: format!("Invalid base_url '{}': {}", self.base_url, e),
        })?;
        self.matching.validate()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
