//! Catalog Cache - client-resident mirror of a remote catalog.
//!
//! The mirror is kept fresh with a version-stamped protocol: a paginated full
//! export when nothing is cached, incremental deltas afterwards. Searches run
//! locally against the mirror with a weighted, typo-tolerant ranker.
//!
//! The local version marker only advances after a whole batch is applied, and
//! every write is idempotent, so any failed or cancelled sync can simply be
//! retried.
//!
//! # Example
//!
//! ```rust,ignore
//! use catalog_cache::{CatalogCache, CatalogCacheConfig, SearchOptions};
//!
//! #[tokio::main]
//! async fn main() -> catalog_cache::Result<()> {
//!     let cache = CatalogCache::builder()
//!         .sqlite("/var/cache/catalog.sqlite")
//!         .http_remote(CatalogCacheConfig::default())
//!         .build()?;
//!
//!     let outcome = cache.sync_with_server().await?;
//!     println!("{} sync, {} records", outcome.kind, outcome.synced_count);
//!
//!     for record in cache.search("paracetmol", SearchOptions::with_limit(5))? {
//!         println!("{} {}", record.id, record.primary_name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod matcher;
pub mod models;
pub mod remote;
pub mod store;
pub mod sync;

mod service;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use config::{CatalogCacheConfig, CatalogEndpoints, NetworkConfig, StorageConfig, SyncConfig};
pub use error::{CatalogError, ErrorCategory, Result};
pub use matcher::{FieldWeights, FuzzyMatcher, MatchConfig, Matcher, Ranker, ScoredRecord, WeightedField};
pub use models::{CatalogRecord, DeltaRecord, RecordId, SyncState, VersionToken};
pub use remote::{HttpCatalogClient, RemoteCatalogClient};
pub use service::{
    CacheInfo, CacheSize, CatalogCache, CatalogCacheBuilder, ProgressCallback, SearchOptions,
    SyncOptions,
};
pub use store::{MemoryRecordStore, MemorySyncMetadata, RecordStore, SqliteCatalogStore, SyncMetadata};
pub use sync::{FullLoadResult, IncrementalResult, SyncCoordinator, SyncKind, SyncOutcome, UpdateCheck};
