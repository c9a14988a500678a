//! Storage contracts for the local mirror.

use crate::error::Result;
use crate::models::{CatalogRecord, RecordId, SyncState, VersionToken};
use chrono::{DateTime, Utc};

/// Local persistent collection of catalog records keyed by id.
///
/// All operations are synchronous to match embedded engines such as rusqlite.
/// Implementations need not make a single `upsert_many` atomic, but every
/// method must be safe to repeat: the sync engine relies on replaying the same
/// writes after a failure.
pub trait RecordStore: Send + Sync {
    /// Point lookup.
    fn get(&self, id: &RecordId) -> Result<Option<CatalogRecord>>;

    /// Look up several ids, returning the ones found in request order.
    fn get_many(&self, ids: &[RecordId]) -> Result<Vec<CatalogRecord>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.get(id)? {
                found.push(record);
            }
        }
        Ok(found)
    }

    /// Insert or replace every record by id (last write wins).
    fn upsert_many(&self, records: &[CatalogRecord]) -> Result<()>;

    /// Add one to a stored record's `popularity_count` in place, returning
    /// the new count, or `None` if the id is absent. Must not rewrite any
    /// other field, so a concurrent upsert or delete is never undone.
    fn increment_popularity(&self, id: &RecordId) -> Result<Option<u64>>;

    /// Delete by id. Unknown ids are ignored.
    fn delete_many(&self, ids: &[RecordId]) -> Result<()>;

    /// Number of stored records.
    fn count(&self) -> Result<u64>;

    /// Point-in-time copy of every record.
    fn scan_all(&self) -> Result<Vec<CatalogRecord>>;

    /// Remove every record.
    fn clear(&self) -> Result<()>;

    /// Actual storage footprint in bytes, if the backend can tell.
    fn storage_bytes(&self) -> Result<Option<u64>> {
        Ok(None)
    }
}

/// Persistent home of the last committed [`SyncState`].
///
/// The version token and timestamp are always written together; a reader must
/// never observe one without the other.
pub trait SyncMetadata: Send + Sync {
    /// Read version and timestamp together.
    fn get_state(&self) -> Result<Option<SyncState>>;

    /// Atomically replace the committed state.
    fn set_version(&self, version: &VersionToken, synced_at: DateTime<Utc>) -> Result<()>;

    /// Forget the committed state.
    fn clear(&self) -> Result<()>;

    fn get_version(&self) -> Result<Option<VersionToken>> {
        Ok(self.get_state()?.map(|s| s.version))
    }

    fn get_last_sync_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.get_state()?.map(|s| s.last_sync_at))
    }
}
