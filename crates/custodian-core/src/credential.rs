//! Shared credential slot.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Holds the current CSRF token.
///
/// Cloning a `CredentialCache` yields another handle to the same slot, so the
/// stages that need the token receive it explicitly at construction time.
/// Every `get`/`set` is atomic on its own; callers that must avoid duplicate
/// refreshes serialize through a `SerializedStage` instead of locking here.
///
/// There is no expiry: a stale token is only detected when the server
/// answers 401.
///
/// # Example
///
/// ```
/// use custodian_core::CredentialCache;
///
/// let cache = CredentialCache::new();
/// assert!(cache.get().is_none());
///
/// let handle = cache.clone();
/// handle.set("t1");
/// assert_eq!(cache.get().as_deref(), Some("t1"));
/// ```
#[derive(Clone, Default)]
pub struct CredentialCache {
    slot: Arc<RwLock<Option<String>>>,
}

impl CredentialCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache pre-populated with a token.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Some(token.into()))),
        }
    }

    /// Returns the current token, if any.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.slot.read().clone()
    }

    /// Replaces the current token.
    pub fn set(&self, token: impl Into<String>) {
        *self.slot.write() = Some(token.into());
    }

    /// Removes the current token.
    pub fn clear(&self) {
        *self.slot.write() = None;
    }

    /// Returns true if no token is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot.read().is_none()
    }
}

impl fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never print the token itself
        f.debug_struct("CredentialCache")
            .field("present", &!self.is_empty())
            .finish()
    }
}
