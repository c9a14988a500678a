//! Error types for the catalog cache.
//!
//! Errors fall into a small taxonomy (see [`ErrorCategory`]) that tells the
//! caller what to do next: network failures are worth retrying, invalid
//! responses and storage failures are fatal for the current call. None of them
//! ever leave a partially committed version marker behind.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for catalog cache operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    // Remote payload errors. `endpoint` is the request path when the body is
    // not JSON, otherwise the payload kind that failed validation.
    #[error("Invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    // Storage errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Lifecycle
    #[error("Sync cancelled")]
    Cancelled,

    #[error("Catalog cache has been shut down")]
    ShutDown,

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for catalog cache operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Coarse classification of a [`CatalogError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transport, timeout or HTTP status failures.
    Network,
    /// The remote answered with a payload of the wrong shape.
    InvalidResponse,
    /// Local persistence failed.
    Storage,
    /// The operation was aborted or the service is shut down.
    Cancelled,
    /// Configuration and everything else.
    Other,
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        CatalogError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CatalogError::Timeout(std::time::Duration::from_secs(0))
        } else {
            CatalogError::Network {
                message: err.to_string(),
                cause: std::error::Error::source(&err).map(|s| s.to_string()),
            }
        }
    }
}

impl CatalogError {
    /// Shorthand for an [`CatalogError::InvalidResponse`].
    pub fn invalid_response(endpoint: &str, message: impl Into<String>) -> Self {
        CatalogError::InvalidResponse {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        CatalogError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Error raised when a store mutex was poisoned by a panicking writer.
    pub(crate) fn lock_poisoned(what: &str) -> Self {
        CatalogError::Storage {
            message: format!("Failed to lock {}", what),
        }
    }

    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CatalogError::Network { .. }
            | CatalogError::Timeout(_)
            | CatalogError::HttpStatus { .. } => ErrorCategory::Network,

            CatalogError::InvalidResponse { .. } => ErrorCategory::InvalidResponse,

            CatalogError::Database { .. }
            | CatalogError::Storage { .. }
            | CatalogError::Io { .. }
            | CatalogError::Json { .. } => ErrorCategory::Storage,

            CatalogError::Cancelled | CatalogError::ShutDown => ErrorCategory::Cancelled,

            CatalogError::Config { .. } | CatalogError::Other(_) => ErrorCategory::Other,
        }
    }

    /// Check if the caller may retry the failed operation as-is.
    ///
    /// The engine never retries internally; this only informs caller policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Network { .. } | CatalogError::Timeout(_) => true,
            CatalogError::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Check if an HTTP status code indicates a transient server-side condition.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}
