//! Local persistence for the catalog mirror.
//!
//! Two contracts, [`RecordStore`] and [`SyncMetadata`], and two backends:
//! - [`MemoryRecordStore`] / [`MemorySyncMetadata`] for tests and ephemeral use
//! - [`SqliteCatalogStore`], which implements both over one database

mod memory;
mod sqlite;
mod traits;

pub use memory::{MemoryRecordStore, MemorySyncMetadata};
pub use sqlite::SqliteCatalogStore;
pub use traits::{RecordStore, SyncMetadata};
