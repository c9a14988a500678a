//! `CatalogCache`: the application-facing facade.
//!
//! One explicit instance per process (or per test) owns the stores, the sync
//! coordinator and the ranker. There is no global; callers share it with
//! `Arc<CatalogCache>`.

mod builder;

pub use builder::CatalogCacheBuilder;

use crate::cancel::CancellationToken;
use crate::config::{StorageConfig, SyncConfig};
use crate::error::{CatalogError, Result};
use crate::matcher::{Ranker, ScoredRecord};
use crate::models::{CatalogRecord, RecordId, VersionToken};
use crate::store::{RecordStore, SyncMetadata};
use crate::sync::{SyncCoordinator, SyncOutcome, UpdateCheck};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Shared progress callback, called with `(loaded, total)`.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Per-call sync options.
#[derive(Clone, Default)]
pub struct SyncOptions {
    pub on_progress: Option<ProgressCallback>,
    /// Caller-owned abort signal. Without one, the cycle is only cancelled by
    /// [`CatalogCache::shutdown`].
    pub cancel: Option<CancellationToken>,
}

impl SyncOptions {
    pub fn with_progress(mut self, f: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: SyncConfig::DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl SearchOptions {
    pub fn with_limit(limit: usize) -> Self {
        Self { limit }
    }
}

/// Cache status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub count: u64,
    pub version: Option<VersionToken>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub has_cache: bool,
    pub is_syncing: bool,
}

/// Storage footprint estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSize {
    pub count: u64,
    pub estimated_bytes: u64,
    /// Megabytes, one decimal.
    pub estimated_mb: f64,
}

/// Local catalog mirror with sync and search.
pub struct CatalogCache {
    store: Arc<dyn RecordStore>,
    metadata: Arc<dyn SyncMetadata>,
    coordinator: SyncCoordinator,
    ranker: Ranker,
    shutdown: CancellationToken,
}

impl CatalogCache {
    pub fn builder() -> CatalogCacheBuilder {
        CatalogCacheBuilder::new()
    }

    pub(crate) fn from_parts(
        store: Arc<dyn RecordStore>,
        metadata: Arc<dyn SyncMetadata>,
        coordinator: SyncCoordinator,
        ranker: Ranker,
    ) -> Self {
        Self {
            store,
            metadata,
            coordinator,
            ranker,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn get_cache_info(&self) -> Result<CacheInfo> {
        let count = self.store.count()?;
        let state = self.metadata.get_state()?;
        let (version, last_sync_at) = match state {
            Some(s) => (Some(s.version), Some(s.last_sync_at)),
            None => (None, None),
        };

        Ok(CacheInfo {
            count,
            version,
            last_sync_at,
            has_cache: count > 0,
            is_syncing: self.coordinator.is_syncing(),
        })
    }

    /// Compare local and remote versions without syncing.
    pub async fn check_for_updates(&self) -> Result<UpdateCheck> {
        self.ensure_running()?;
        self.coordinator.check_for_updates().await
    }

    /// Bring the mirror up to date with the remote catalog.
    pub async fn sync_with_server(&self) -> Result<SyncOutcome> {
        self.sync_with_options(SyncOptions::default()).await
    }

    /// [`sync_with_server`](Self::sync_with_server) with progress reporting
    /// and a caller abort signal.
    pub async fn sync_with_options(&self, options: SyncOptions) -> Result<SyncOutcome> {
        self.ensure_running()?;

        let cancel = options
            .cancel
            .unwrap_or_else(|| self.shutdown.child_token());
        let on_progress = options.on_progress.as_deref();

        match self.coordinator.sync_with_server(on_progress, &cancel).await {
            Err(CatalogError::Cancelled) if self.shutdown.is_cancelled() => Err(CatalogError::ShutDown),
            other => other,
        }
    }

    /// Top `limit` records for `query`, best first.
    pub fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<CatalogRecord>> {
        Ok(self
            .search_scored(query, options)?
            .into_iter()
            .map(|hit| hit.record)
            .collect())
    }

    /// Like [`search`](Self::search) but keeps each hit's distance.
    pub fn search_scored(&self, query: &str, options: SearchOptions) -> Result<Vec<ScoredRecord>> {
        if query.trim().is_empty() || options.limit == 0 {
            return Ok(Vec::new());
        }

        let snapshot = self.store.scan_all()?;
        let scanned = snapshot.len();
        let hits = self.ranker.rank(query, snapshot, options.limit);
        debug!("Search '{}' scanned {} records, {} hits", query, scanned, hits.len());
        Ok(hits)
    }

    /// Delete every record and the version marker.
    pub async fn clear_cache(&self) -> Result<()> {
        self.coordinator.reset().await
    }

    pub fn get_cache_size(&self) -> Result<CacheSize> {
        let count = self.store.count()?;
        let estimated_bytes = match self.store.storage_bytes()? {
            Some(bytes) => bytes,
            None => count.saturating_mul(StorageConfig::ESTIMATED_RECORD_BYTES),
        };
        let estimated_mb = (estimated_bytes as f64 / (1024.0 * 1024.0) * 10.0).round() / 10.0;

        Ok(CacheSize {
            count,
            estimated_bytes,
            estimated_mb,
        })
    }

    pub fn get(&self, id: &RecordId) -> Result<Option<CatalogRecord>> {
        self.store.get(id)
    }

    /// Found records in request order; unknown ids are skipped.
    pub fn get_many(&self, ids: &[RecordId]) -> Result<Vec<CatalogRecord>> {
        self.store.get_many(ids)
    }

    /// True when never synced or the last sync is older than `max_age`.
    pub fn needs_refresh(&self, max_age: Duration) -> Result<bool> {
        let Some(last_sync_at) = self.metadata.get_last_sync_at()? else {
            return Ok(true);
        };
        // negative age (clock moved back) counts as fresh
        Ok((Utc::now() - last_sync_at)
            .to_std()
            .is_ok_and(|age| age > max_age))
    }

    /// Bump a record's local popularity. Returns the new count, or `None` for
    /// an unknown id. The next server upsert of the record overwrites it.
    ///
    /// Only the counter is touched, so this is safe to call while a sync is
    /// writing the same record.
    pub fn record_usage(&self, id: &RecordId) -> Result<Option<u64>> {
        self.store.increment_popularity(id)
    }

    /// Cancel in-flight sync work and wait for it to stop. Later sync calls
    /// fail with [`CatalogError::ShutDown`].
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.coordinator.wait_idle().await;
        info!("Catalog cache shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            Err(CatalogError::ShutDown)
        } else {
            Ok(())
        }
    }
}
