//! In-process storage backends.

use super::traits::{RecordStore, SyncMetadata};
use crate::error::{CatalogError, Result};
use crate::models::{CatalogRecord, RecordId, SyncState, VersionToken};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Ordered in-memory record store.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<RecordId, CatalogRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<RecordId, CatalogRecord>>> {
        self.records
            .lock()
            .map_err(|_| CatalogError::lock_poisoned("memory record store"))
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, id: &RecordId) -> Result<Option<CatalogRecord>> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn upsert_many(&self, records: &[CatalogRecord]) -> Result<()> {
        let mut map = self.lock()?;
        for record in records {
            map.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    fn increment_popularity(&self, id: &RecordId) -> Result<Option<u64>> {
        let mut map = self.lock()?;
        Ok(map.get_mut(id).map(|record| {
            record.popularity_count = record.popularity_count.saturating_add(1);
            record.popularity_count
        }))
    }

    fn delete_many(&self, ids: &[RecordId]) -> Result<()> {
        let mut map = self.lock()?;
        for id in ids {
            map.remove(id);
        }
        Ok(())
    }

    fn count(&self) -> Result<u64> {
        Ok(self.lock()?.len() as u64)
    }

    fn scan_all(&self) -> Result<Vec<CatalogRecord>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}

/// In-memory sync metadata. Both fields live in one slot, swapped as a unit.
#[derive(Debug, Default)]
pub struct MemorySyncMetadata {
    state: Mutex<Option<SyncState>>,
}

impl MemorySyncMetadata {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncMetadata for MemorySyncMetadata {
    fn get_state(&self) -> Result<Option<SyncState>> {
        let state = self
            .state
            .lock()
            .map_err(|_| CatalogError::lock_poisoned("memory sync metadata"))?;
        Ok(state.clone())
    }

    fn set_version(&self, version: &VersionToken, synced_at: DateTime<Utc>) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CatalogError::lock_poisoned("memory sync metadata"))?;
        *state = Some(SyncState {
            version: version.clone(),
            last_sync_at: synced_at,
        });
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CatalogError::lock_poisoned("memory sync metadata"))?;
        *state = None;
        Ok(())
    }
}
