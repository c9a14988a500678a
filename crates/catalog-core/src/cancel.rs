//! Cooperative abort signal for sync cycles.
//!
//! A [`CancellationToken`] is checked by the sync coordinator before every page
//! fetch, after every response, and between delta write chunks. Cancelling
//! never writes a version marker, so an aborted cycle leaves the local mirror
//! partially refreshed but not marked current.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::CatalogError;

/// A cancellation token for cooperative cancellation of sync work.
///
/// Clones share state: cancelling any clone cancels all of them. Tokens
/// created with [`child_token`](Self::child_token) observe their parent's
/// cancellation, but cancelling a child leaves the parent untouched.
///
/// # Example
///
/// ```
/// use catalog_cache::CancellationToken;
///
/// let service = CancellationToken::new();
/// let sync = service.child_token();
///
/// sync.cancel();
/// assert!(sync.is_cancelled());
/// assert!(!service.is_cancelled());
///
/// let next = service.child_token();
/// service.cancel();
/// assert!(next.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    parent: Option<Arc<CancellationToken>>,
}

impl CancellationToken {
    /// Create a new, uncancelled root token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested on this token or any ancestor.
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }

    /// Create a child token scoped to this one.
    pub fn child_token(&self) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Return [`CatalogError::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> Result<(), CatalogError> {
        if self.is_cancelled() {
            Err(CatalogError::Cancelled)
        } else {
            Ok(())
        }
    }
}
