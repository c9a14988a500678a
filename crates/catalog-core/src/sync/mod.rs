//! Sync coordinator: keeps the local mirror converged with the remote catalog.
//!
//! A cycle is one of:
//! - **Full load**: no committed version. Every export page is validated and
//!   written before the next is requested; the remote version is committed
//!   only after the last page landed.
//! - **Incremental**: local version differs from remote. The whole delta
//!   batch is validated before any write, applied, then the batch version is
//!   committed.
//! - **Current**: versions match, nothing to do.
//!
//! The version marker is the commit point. Any failure or cancellation before
//! it leaves the previous marker in place, and every write is idempotent, so
//! the next cycle replays safely.
//!
//! Cycles are serialized by an async mutex. A second caller waits for the
//! in-flight cycle and then sees `Current`, never a double-applied batch.

mod delta;

use crate::cancel::CancellationToken;
use crate::config::SyncConfig;
use crate::error::{CatalogError, Result};
use crate::models::{RecordId, VersionToken};
use crate::remote::protocol::{self, EXPORT_PAYLOAD};
use crate::remote::RemoteCatalogClient;
use crate::store::{RecordStore, SyncMetadata};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Progress callback: `(loaded, total)` after every full-load page.
pub type ProgressFn<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// What a sync cycle has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    Full,
    Incremental,
    Current,
}

impl std::fmt::Display for SyncKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncKind::Full => "full",
            SyncKind::Incremental => "incremental",
            SyncKind::Current => "current",
        };
        f.write_str(s)
    }
}

/// Result of comparing the local version with the remote one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheck {
    pub needs_update: bool,
    pub kind: SyncKind,
    pub local_version: Option<VersionToken>,
    /// Token to request deltas from; set only for [`SyncKind::Incremental`].
    pub since_token: Option<VersionToken>,
    pub remote_version: VersionToken,
    pub remote_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullLoadResult {
    pub loaded: u64,
    pub total: u64,
    /// Local records deleted because no page delivered them.
    pub pruned: u64,
    pub version: VersionToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementalResult {
    /// Entries in the batch, duplicates included.
    pub applied_count: u64,
    pub added_or_updated: u64,
    pub removed: u64,
    pub version: VersionToken,
}

/// Summary of one `sync_with_server` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub kind: SyncKind,
    pub synced_count: u64,
    pub added_or_updated: u64,
    pub removed: u64,
    pub version: VersionToken,
}

impl From<FullLoadResult> for SyncOutcome {
    fn from(r: FullLoadResult) -> Self {
        Self {
            kind: SyncKind::Full,
            synced_count: r.loaded,
            added_or_updated: r.loaded,
            removed: r.pruned,
            version: r.version,
        }
    }
}

impl From<IncrementalResult> for SyncOutcome {
    fn from(r: IncrementalResult) -> Self {
        Self {
            kind: SyncKind::Incremental,
            synced_count: r.applied_count,
            added_or_updated: r.added_or_updated,
            removed: r.removed,
            version: r.version,
        }
    }
}

/// Drives full and incremental sync against a remote catalog.
pub struct SyncCoordinator {
    store: Arc<dyn RecordStore>,
    metadata: Arc<dyn SyncMetadata>,
    remote: Arc<dyn RemoteCatalogClient>,
    page_size: u32,
    sync_lock: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        metadata: Arc<dyn SyncMetadata>,
        remote: Arc<dyn RemoteCatalogClient>,
    ) -> Self {
        Self {
            store,
            metadata,
            remote,
            page_size: SyncConfig::PAGE_SIZE,
            sync_lock: Mutex::new(()),
        }
    }

    /// Records requested per export page (clamped to at least 1).
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Whether a sync cycle or reset is running.
    pub fn is_syncing(&self) -> bool {
        self.sync_lock.try_lock().is_err()
    }

    /// Wait until no cycle is running.
    pub async fn wait_idle(&self) {
        let _guard = self.sync_lock.lock().await;
    }

    /// Compare the committed local version with the remote one.
    pub async fn check_for_updates(&self) -> Result<UpdateCheck> {
        let local_version = self.metadata.get_version()?;
        let remote = protocol::parse_version(&self.remote.fetch_version().await?)?;

        let kind = match &local_version {
            None => SyncKind::Full,
            Some(local) if *local == remote.version => SyncKind::Current,
            Some(_) => SyncKind::Incremental,
        };
        debug!(
            "Update check: local={:?} remote={} kind={}",
            local_version.as_ref().map(|v| v.as_str()),
            remote.version,
            kind
        );

        Ok(UpdateCheck {
            needs_update: kind != SyncKind::Current,
            kind,
            since_token: match kind {
                SyncKind::Incremental => local_version.clone(),
                _ => None,
            },
            local_version,
            remote_version: remote.version,
            remote_count: remote.count,
        })
    }

    /// Check, then run whichever cycle is needed.
    pub async fn sync_with_server(
        &self,
        on_progress: Option<ProgressFn<'_>>,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let _guard = self.sync_lock.lock().await;
        cancel.check()?;

        let check = self.check_for_updates().await?;
        match (check.kind, check.since_token) {
            (SyncKind::Full, _) => {
                info!(
                    "No local catalog version, starting full load of ~{} records",
                    check.remote_count
                );
                Ok(self.run_full_load(on_progress, cancel).await?.into())
            }
            (SyncKind::Incremental, Some(since)) => {
                info!("Catalog changed ({} -> {}), applying updates", since, check.remote_version);
                Ok(self.run_incremental(&since, cancel).await?.into())
            }
            (SyncKind::Incremental, None) => Err(CatalogError::Other(
                "incremental sync selected without a local version".to_string(),
            )),
            (SyncKind::Current, _) => {
                debug!("Catalog already at version {}", check.remote_version);
                Ok(SyncOutcome {
                    kind: SyncKind::Current,
                    synced_count: 0,
                    added_or_updated: 0,
                    removed: 0,
                    version: check.remote_version,
                })
            }
        }
    }

    /// Download the whole catalog regardless of the local version.
    pub async fn full_load(
        &self,
        on_progress: Option<ProgressFn<'_>>,
        cancel: &CancellationToken,
    ) -> Result<FullLoadResult> {
        let _guard = self.sync_lock.lock().await;
        self.run_full_load(on_progress, cancel).await
    }

    /// Apply the remote changes made since `since`.
    pub async fn incremental_sync(
        &self,
        since: &VersionToken,
        cancel: &CancellationToken,
    ) -> Result<IncrementalResult> {
        let _guard = self.sync_lock.lock().await;
        self.run_incremental(since, cancel).await
    }

    /// Wipe records and the version marker.
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.sync_lock.lock().await;
        // Marker first: records without a marker only cause a full reload
        self.metadata.clear()?;
        self.store.clear()?;
        info!("Catalog cache cleared");
        Ok(())
    }

    async fn run_full_load(
        &self,
        on_progress: Option<ProgressFn<'_>>,
        cancel: &CancellationToken,
    ) -> Result<FullLoadResult> {
        let mut seen: HashSet<RecordId> = HashSet::new();
        let mut loaded: u64 = 0;
        let mut reported_total: u64 = 0;
        let mut page_number: u32 = 1;

        loop {
            cancel.check()?;
            let body = self.remote.fetch_page(page_number, self.page_size).await?;
            cancel.check()?;

            let page = protocol::parse_page(&body)?;
            if page.has_more && page.records.is_empty() {
                return Err(CatalogError::invalid_response(
                    EXPORT_PAYLOAD,
                    format!("page {} is empty but hasMore is true", page_number),
                ));
            }

            self.store.upsert_many(&page.records)?;
            loaded += page.records.len() as u64;
            reported_total = page.total;
            seen.extend(page.records.into_iter().map(|r| r.id));

            debug!("Loaded page {} ({}/{} records)", page_number, loaded, reported_total);

            if !page.has_more {
                break;
            }
            if let Some(report) = on_progress {
                report(loaded, reported_total.max(loaded));
            }
            page_number = page_number.checked_add(1).ok_or_else(|| {
                CatalogError::invalid_response(EXPORT_PAYLOAD, "page count overflow")
            })?;
        }

        if reported_total != loaded {
            warn!(
                "Export reported {} records but delivered {}; using delivered count",
                reported_total, loaded
            );
        }
        if let Some(report) = on_progress {
            report(loaded, loaded);
        }

        cancel.check()?;
        let stale: Vec<RecordId> = self
            .store
            .scan_all()?
            .into_iter()
            .map(|r| r.id)
            .filter(|id| !seen.contains(id))
            .collect();
        if !stale.is_empty() {
            warn!("Pruning {} local records absent from the export", stale.len());
            self.store.delete_many(&stale)?;
        }

        cancel.check()?;
        let remote = protocol::parse_version(&self.remote.fetch_version().await?)?;
        cancel.check()?;
        self.metadata.set_version(&remote.version, Utc::now())?;

        info!(
            "Full load complete: {} records across {} pages, version {}",
            loaded, page_number, remote.version
        );

        Ok(FullLoadResult {
            loaded,
            total: loaded,
            pruned: stale.len() as u64,
            version: remote.version,
        })
    }

    async fn run_incremental(
        &self,
        since: &VersionToken,
        cancel: &CancellationToken,
    ) -> Result<IncrementalResult> {
        cancel.check()?;
        let body = self.remote.fetch_updates(since).await?;
        cancel.check()?;
        let batch = protocol::parse_updates(&body)?;

        let applied_count = batch.deltas.len() as u64;
        let removed = batch.deltas.iter().filter(|d| d.is_retire()).count() as u64;
        let added_or_updated = applied_count - removed;

        let writes = delta::coalesce(batch.deltas);
        debug!(
            "Applying {} delta entries as {} writes",
            applied_count,
            writes.len()
        );

        for chunk in writes.retires.chunks(SyncConfig::DELTA_WRITE_CHUNK) {
            cancel.check()?;
            self.store.delete_many(chunk)?;
        }
        for chunk in writes.upserts.chunks(SyncConfig::DELTA_WRITE_CHUNK) {
            cancel.check()?;
            self.store.upsert_many(chunk)?;
        }

        cancel.check()?;
        self.metadata.set_version(&batch.version, Utc::now())?;

        info!(
            "Incremental sync complete: {} updated, {} removed, version {}",
            added_or_updated, removed, batch.version
        );

        Ok(IncrementalResult {
            applied_count,
            added_or_updated,
            removed,
            version: batch.version,
        })
    }
}
