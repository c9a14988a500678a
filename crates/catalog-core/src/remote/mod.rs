//! Remote catalog API access.
//!
//! The sync engine only talks to a [`RemoteCatalogClient`]. Clients return raw
//! JSON bodies; [`protocol`] validates them before anything is applied, so a
//! fake client in tests can hand back malformed payloads exactly as a broken
//! server would.

mod http;
pub mod protocol;

use crate::error::Result;
use crate::models::VersionToken;
use async_trait::async_trait;
use serde_json::Value;

pub use http::HttpCatalogClient;
pub use protocol::{CatalogPage, DeltaBatch, RemoteVersion};

/// Source of catalog data.
///
/// Implementations perform transport only: no retries, no caching, no shape
/// checks beyond "the body is JSON".
#[async_trait]
pub trait RemoteCatalogClient: Send + Sync {
    /// `GET version` body.
    async fn fetch_version(&self) -> Result<Value>;

    /// `GET export?page=&limit=` body. Pages are 1-based.
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<Value>;

    /// `GET updates?since=` body.
    async fn fetch_updates(&self, since: &VersionToken) -> Result<Value>;
}
