//! Bearer token session
//!
//! A session caches the token issued by the auth endpoint and tracks its
//! expiry (refreshed ahead of time by a safety margin) and the number of
//! refreshes performed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::constants::{TOKEN_LIFETIME_SECS, TOKEN_REFRESH_MARGIN_SECS};

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    /// Instant after which the token must be refreshed
    refresh_at: Instant,
}

/// Token session
///
/// Thread-safe and can be cloned cheaply (Arc internally). Reads never
/// block each other; the refresh itself is serialized by the gateway.
#[derive(Debug, Clone)]
pub struct TokenSession {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    token: parking_lot::RwLock<Option<CachedToken>>,
    refreshes: AtomicU64,
    margin: Duration,
}

impl TokenSession {
    /// Create an unauthenticated session with the default refresh margin
    pub fn new() -> Self {
        Self::with_margin(Duration::from_secs(TOKEN_REFRESH_MARGIN_SECS))
    }

    pub fn with_margin(margin: Duration) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                token: parking_lot::RwLock::new(None),
                refreshes: AtomicU64::new(0),
                margin,
            }),
        }
    }

    /// Token still usable, if any
    pub fn valid_token(&self) -> Option<String> {
        let token = self.inner.token.read();
        token
            .as_ref()
            .filter(|t| Instant::now() < t.refresh_at)
            .map(|t| t.access_token.clone())
    }

    /// Store a freshly issued token
    ///
    /// `expires_in` falls back to the backend's usual lifetime when the
    /// auth response omits it.
    pub fn store(&self, access_token: impl Into<String>, expires_in: Option<Duration>) {
        let lifetime = expires_in.unwrap_or(Duration::from_secs(TOKEN_LIFETIME_SECS));
        let refresh_at = Instant::now() + lifetime.saturating_sub(self.inner.margin);

        *self.inner.token.write() = Some(CachedToken {
            access_token: access_token.into(),
            refresh_at,
        });
        self.inner.refreshes.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop the cached token only if it is still `rejected`
    ///
    /// Workers that saw the same 401 must not discard a token another
    /// worker already refreshed.
    pub fn invalidate_token(&self, rejected: &str) {
        let mut token = self.inner.token.write();
        if token.as_ref().is_some_and(|t| t.access_token == rejected) {
            *token = None;
        }
    }

    /// Number of tokens stored so far
    pub fn refresh_count(&self) -> u64 {
        self.inner.refreshes.load(Ordering::Acquire)
    }
}

impl Default for TokenSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_new() {
        let session = TokenSession::new();
        assert_eq!(session.valid_token(), None);
        assert_eq!(session.refresh_count(), 0);
    }

    #[test]
    fn test_store_and_read() {
        let session = TokenSession::new();
        session.store("abc", None);

        assert_eq!(session.valid_token().as_deref(), Some("abc"));
        assert_eq!(session.refresh_count(), 1);
    }

    #[test]
    fn test_token_within_margin_is_stale() {
        let session = TokenSession::with_margin(Duration::from_secs(30));
        session.store("short-lived", Some(Duration::from_secs(20)));

        assert_eq!(session.valid_token(), None);
    }

    #[test]
    fn test_invalidate_token_ignores_newer_token() {
        let session = TokenSession::new();
        session.store("new", None);

        session.invalidate_token("old");
        assert_eq!(session.valid_token().as_deref(), Some("new"));

        session.invalidate_token("new");
        assert_eq!(session.valid_token(), None);
    }

    #[test]
    fn test_session_clone_shares_state() {
        let session1 = TokenSession::new();
        let session2 = session1.clone();

        session1.store("shared", None);
        assert_eq!(session2.valid_token().as_deref(), Some("shared"));

        session2.invalidate_token("shared");
        assert_eq!(session1.valid_token(), None);
    }
}
