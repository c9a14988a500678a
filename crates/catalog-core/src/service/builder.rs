//! Builder for configuring a [`CatalogCache`].

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{CatalogCacheConfig, SyncConfig};
use crate::error::{CatalogError, Result};
use crate::matcher::{MatchConfig, Matcher, Ranker};
use crate::remote::{HttpCatalogClient, RemoteCatalogClient};
use crate::service::CatalogCache;
use crate::store::{MemoryRecordStore, MemorySyncMetadata, RecordStore, SqliteCatalogStore, SyncMetadata};
use crate::sync::SyncCoordinator;

/// Builder for configuring a [`CatalogCache`].
///
/// A cache needs a record store, a metadata store and a remote client. Stores
/// come from [`sqlite`](Self::sqlite), [`in_memory`](Self::in_memory), or
/// explicit trait objects; explicit ones take precedence.
///
/// # Example
///
/// ```rust,ignore
/// use catalog_cache::{CatalogCache, CatalogCacheConfig};
///
/// let config = CatalogCacheConfig::load("catalog.json")?;
/// let cache = CatalogCache::builder()
///     .sqlite("/var/cache/catalog.sqlite")
///     .http_remote(config)
///     .build()?;
/// ```
#[derive(Default)]
pub struct CatalogCacheBuilder {
    store: Option<Arc<dyn RecordStore>>,
    metadata: Option<Arc<dyn SyncMetadata>>,
    sqlite_path: Option<PathBuf>,
    remote: Option<Arc<dyn RemoteCatalogClient>>,
    http_config: Option<CatalogCacheConfig>,
    matcher: Option<Arc<dyn Matcher>>,
    match_config: MatchConfig,
    page_size: Option<u32>,
}

impl CatalogCacheBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply every setting from an operator config: HTTP remote, page size,
    /// matching and, when set, the SQLite path.
    pub fn from_config(config: CatalogCacheConfig) -> Self {
        let mut builder = Self::new()
            .page_size(config.page_size)
            .match_config(config.matching.clone());
        if let Some(path) = &config.db_path {
            builder = builder.sqlite(path.clone());
        }
        builder.http_remote(config)
    }

    pub fn record_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn sync_metadata(mut self, metadata: Arc<dyn SyncMetadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Persist records and sync state in one SQLite file, opened on `build`.
    pub fn sqlite(mut self, path: impl Into<PathBuf>) -> Self {
        self.sqlite_path = Some(path.into());
        self
    }

    /// Keep everything in process memory.
    pub fn in_memory(self) -> Self {
        self.record_store(Arc::new(MemoryRecordStore::new()))
            .sync_metadata(Arc::new(MemorySyncMetadata::new()))
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteCatalogClient>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Talk to the catalog API over HTTP using `config`'s base URL, endpoints and timeout.
    pub fn http_remote(mut self, config: CatalogCacheConfig) -> Self {
        self.http_config = Some(config);
        self
    }

    /// Replace the default fuzzy matcher. Field weights still come from the match config.
    pub fn matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn match_config(mut self, config: MatchConfig) -> Self {
        self.match_config = config;
        self
    }

    /// Records per export page.
    ///
    /// Default: `SyncConfig::PAGE_SIZE`
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Build the cache, opening storage and creating the HTTP client as needed.
    pub fn build(self) -> Result<CatalogCache> {
        self.match_config.validate()?;

        let page_size = self.page_size.unwrap_or(SyncConfig::PAGE_SIZE);
        if page_size == 0 {
            return Err(CatalogError::Config {
                message: "page_size must be greater than zero".to_string(),
            });
        }

        let sqlite = match &self.sqlite_path {
            Some(path) => Some(Arc::new(SqliteCatalogStore::open(path)?)),
            None => None,
        };

        let store: Arc<dyn RecordStore> = match (self.store, &sqlite) {
            (Some(store), _) => store,
            (None, Some(db)) => db.clone(),
            (None, None) => {
                return Err(CatalogError::Config {
                    message: "No record store configured".to_string(),
                })
            }
        };
        let metadata: Arc<dyn SyncMetadata> = match (self.metadata, &sqlite) {
            (Some(metadata), _) => metadata,
            (None, Some(db)) => db.clone(),
            (None, None) => {
                return Err(CatalogError::Config {
                    message: "No sync metadata store configured".to_string(),
                })
            }
        };

        let remote: Arc<dyn RemoteCatalogClient> = match (self.remote, &self.http_config) {
            (Some(remote), _) => remote,
            (None, Some(config)) => {
                config.validate()?;
                Arc::new(HttpCatalogClient::from_config(config)?)
            }
            (None, None) => {
                return Err(CatalogError::Config {
                    message: "No remote catalog client configured".to_string(),
                })
            }
        };

        let ranker = match self.matcher {
            Some(matcher) => Ranker::new(matcher, self.match_config.weights.clone()),
            None => Ranker::from_config(&self.match_config),
        };

        let coordinator =
            SyncCoordinator::new(store.clone(), metadata.clone(), remote).with_page_size(page_size);

        Ok(CatalogCache::from_parts(store, metadata, coordinator, ranker))
    }
}
