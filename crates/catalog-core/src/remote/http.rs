//! reqwest-based catalog client.

use super::RemoteCatalogClient;
use crate::config::{CatalogCacheConfig, CatalogEndpoints, NetworkConfig};
use crate::error::{CatalogError, Result};
use crate::models::VersionToken;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// HTTP client for the catalog API.
pub struct HttpCatalogClient {
    client: Client,
    base_url: Url,
    endpoints: CatalogEndpoints,
    timeout: Duration,
}

impl HttpCatalogClient {
    /// Create a client for `base_url` with default endpoints and timeout.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::from_config(&CatalogCacheConfig {
            base_url: base_url.to_string(),
            ..CatalogCacheConfig::default()
        })
    }

    /// Create a client from operator configuration.
    pub fn from_config(config: &CatalogCacheConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| CatalogError::Config {
            message: format!("Invalid base_url '{}': {}", config.base_url, e),
        })?;
        // Url::join replaces the last segment unless the path ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let timeout = config.request_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| CatalogError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            base_url,
            endpoints: config.endpoints.clone(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint_url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| CatalogError::Config {
                message: format!("Invalid endpoint path '{}': {}", path, e),
            })
    }

    async fn get_json(&self, url: Url) -> Result<Value> {
        debug!("GET {}", url);

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                CatalogError::Timeout(self.timeout)
            } else {
                CatalogError::Network {
                    message: format!("GET {} failed: {}", url, e),
                    cause: std::error::Error::source(&e).map(|s| s.to_string()),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                CatalogError::Timeout(self.timeout)
            } else if e.is_decode() {
                CatalogError::invalid_response(url.path(), format!("body is not JSON: {}", e))
            } else {
                CatalogError::from(e)
            }
        })
    }
}

#[async_trait]
impl RemoteCatalogClient for HttpCatalogClient {
    async fn fetch_version(&self) -> Result<Value> {
        let url = self.endpoint_url(&self.endpoints.version)?;
        self.get_json(url).await
    }

    async fn fetch_page(&self, page: u32, limit: u32) -> Result<Value> {
        let mut url = self.endpoint_url(&self.endpoints.export)?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("limit", &limit.to_string());
        self.get_json(url).await
    }

    async fn fetch_updates(&self, since: &VersionToken) -> Result<Value> {
        let mut url = self.endpoint_url(&self.endpoints.updates)?;
        url.query_pairs_mut().append_pair("since", since.as_str());
        self.get_json(url).await
    }
}
