//! SQLite-backed record store and sync metadata.

use super::traits::{RecordStore, SyncMetadata};
use crate::error::{CatalogError, Result};
use crate::models::{CatalogRecord, RecordId, SyncState, VersionToken};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const RECORD_COLUMNS: &str = "id, primary_name, secondary_name, descriptive_text, grouping_name, \
     pack_info, classification_code, restricted_flag, popularity_count";

/// SQLite storage for the catalog mirror.
///
/// One database holds both the records and the single-row sync state, so a
/// single instance satisfies [`RecordStore`] and [`SyncMetadata`]. Thread-safe
/// via an internal mutex on the connection.
pub struct SqliteCatalogStore {
    /// Database connection (wrapped for thread safety).
    conn: Arc<Mutex<Connection>>,
    /// `None` for in-memory databases.
    db_path: Option<PathBuf>,
}

impl SqliteCatalogStore {
    /// Open (or create) a store at the specified database path.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CatalogError::Io {
                    message: format!("Failed to create catalog directory: {}", e),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(db_path).map_err(|e| CatalogError::Database {
            message: format!("Failed to open catalog database: {}", e),
            source: Some(e),
        })?;

        // WAL keeps searches readable while a sync batch is being written
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| CatalogError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        Self::from_connection(conn, Some(db_path.to_path_buf()))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Database file location, if file-backed.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| CatalogError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS catalog_records (
                id TEXT PRIMARY KEY,
                primary_name TEXT NOT NULL,
                secondary_name TEXT,
                descriptive_text TEXT,
                grouping_name TEXT,
                pack_info TEXT,
                classification_code TEXT,
                restricted_flag INTEGER,
                popularity_count INTEGER NOT NULL DEFAULT 0
            );

            -- Single row: version and timestamp are one write
            CREATE TABLE IF NOT EXISTS sync_state (
                slot INTEGER PRIMARY KEY CHECK (slot = 1),
                version_token TEXT NOT NULL,
                last_sync_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| CatalogError::Database {
            message: format!("Failed to initialize catalog schema: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CatalogRecord> {
        let popularity: i64 = row.get(8)?;
        Ok(CatalogRecord {
            id: RecordId::new(row.get::<_, String>(0)?),
            primary_name: row.get(1)?,
            secondary_name: row.get(2)?,
            descriptive_text: row.get(3)?,
            grouping_name: row.get(4)?,
            pack_info: row.get(5)?,
            classification_code: row.get(6)?,
            restricted_flag: row.get(7)?,
            popularity_count: popularity.max(0) as u64,
        })
    }
}

impl RecordStore for SqliteCatalogStore {
    fn get(&self, id: &RecordId) -> Result<Option<CatalogRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM catalog_records WHERE id = ?1", RECORD_COLUMNS),
                params![id.as_str()],
                Self::row_to_record,
            )
            .optional()
            .map_err(|e| CatalogError::Database {
                message: format!("Failed to query record {}: {}", id, e),
                source: Some(e),
            })?;
        Ok(record)
    }

    fn upsert_many(&self, records: &[CatalogRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT INTO catalog_records
                (id, primary_name, secondary_name, descriptive_text, grouping_name,
                 pack_info, classification_code, restricted_flag, popularity_count)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(id) DO UPDATE SET
                    primary_name = excluded.primary_name,
                    secondary_name = excluded.secondary_name,
                    descriptive_text = excluded.descriptive_text,
                    grouping_name = excluded.grouping_name,
                    pack_info = excluded.pack_info,
                    classification_code = excluded.classification_code,
                    restricted_flag = excluded.restricted_flag,
                    popularity_count = excluded.popularity_count
                "#,
            )?;

            for record in records {
                stmt.execute(params![
                    record.id.as_str(),
                    record.primary_name,
                    record.secondary_name,
                    record.descriptive_text,
                    record.grouping_name,
                    record.pack_info,
                    record.classification_code,
                    record.restricted_flag,
                    i64::try_from(record.popularity_count).unwrap_or(i64::MAX),
                ])
                .map_err(|e| CatalogError::Database {
                    message: format!("Failed to upsert record {}: {}", record.id, e),
                    source: Some(e),
                })?;
            }
        }
        tx.commit()?;

        debug!("Upserted {} catalog records", records.len());
        Ok(())
    }

    fn increment_popularity(&self, id: &RecordId) -> Result<Option<u64>> {
        let conn = self.lock()?;
        let count: Option<i64> = conn
            .query_row(
                "UPDATE catalog_records
                 SET popularity_count = popularity_count + (popularity_count < 9223372036854775807)
                 WHERE id = ?1
                 RETURNING popularity_count",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CatalogError::Database {
                message: format!("Failed to bump popularity of {}: {}", id, e),
                source: Some(e),
            })?;
        Ok(count.map(|c| c.max(0) as u64))
    }

    fn delete_many(&self, ids: &[RecordId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut deleted = 0usize;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM catalog_records WHERE id = ?1")?;
            for id in ids {
                deleted += stmt.execute(params![id.as_str()])?;
            }
        }
        tx.commit()?;

        debug!("Deleted {} of {} requested catalog records", deleted, ids.len());
        Ok(())
    }

    fn count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM catalog_records", [], |row| {
            row.get(0)
        })?;
        Ok(count as u64)
    }

    fn scan_all(&self) -> Result<Vec<CatalogRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM catalog_records ORDER BY id",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| CatalogError::Database {
                message: format!("Failed to scan catalog records: {}", e),
                source: Some(e),
            })?;
        Ok(records)
    }

    fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM catalog_records", [])
            .map_err(|e| CatalogError::Database {
                message: format!("Failed to clear catalog records: {}", e),
                source: Some(e),
            })?;
        debug!("Cleared catalog records");
        Ok(())
    }

    fn storage_bytes(&self) -> Result<Option<u64>> {
        let conn = self.lock()?;
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok(Some((page_count.max(0) * page_size.max(0)) as u64))
    }
}

impl SyncMetadata for SqliteCatalogStore {
    fn get_state(&self) -> Result<Option<SyncState>> {
        let conn = self.lock()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT version_token, last_sync_at FROM sync_state WHERE slot = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((version, synced_at)) = row else {
            return Ok(None);
        };

        let last_sync_at = DateTime::parse_from_rfc3339(&synced_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| CatalogError::Storage {
                message: format!("Corrupt last_sync_at '{}': {}", synced_at, e),
            })?;

        Ok(Some(SyncState {
            version: VersionToken::new(version),
            last_sync_at,
        }))
    }

    fn set_version(&self, version: &VersionToken, synced_at: DateTime<Utc>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO sync_state (slot, version_token, last_sync_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(slot) DO UPDATE SET
                version_token = excluded.version_token,
                last_sync_at = excluded.last_sync_at
            "#,
            params![version.as_str(), synced_at.to_rfc3339()],
        )
        .map_err(|e| CatalogError::Database {
            message: format!("Failed to record sync version: {}", e),
            source: Some(e),
        })?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM sync_state", [])?;
        Ok(())
    }
}
