//! In-memory OAuth session state machine
//!
//! Owns the current token set and decides when to refresh. States are
//! Unauthenticated (no tokens), Authenticated (tokens present, possibly
//! stale) and Refreshing -- the last is represented by the session lock
//! being held across the exchange, so concurrent callers queue on the lock
//! and pick up the refreshed set instead of issuing duplicate exchanges.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::auth::tokens::{TokenSet, TokenStore};
use crate::error::{Error, Result};

/// Result of a refresh-token exchange: access token, expires-in seconds,
/// and (if the server rotated it) a new refresh token.
pub type Exchanged = (String, Option<u64>, Option<String>);

/// Collaborator performing the actual refresh-token grant.
pub trait TokenExchanger: Send + Sync {
    fn exchange<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, Result<Exchanged>>;
}

/// Observable authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

struct Inner {
    tokens: Option<TokenSet>,
    store: Box<dyn TokenStore + Send>,
}

impl Inner {
    fn persist(&mut self) {
        if let Err(e) = self.store.flush() {
            tracing::warn!("Failed to persist token state: {e:#}");
        }
    }

    fn clear(&mut self) {
        self.tokens = None;
        self.store.clear_tokens();
        self.persist();
    }

    fn install(&mut self, access_token: String, expires_in: Option<u64>, refresh: Option<String>) {
        self.store.set_access_token(access_token.clone(), expires_in);
        if let Some(ref rt) = refresh {
            self.store.set_refresh_token(rt.clone());
        }
        self.tokens = Some(TokenSet::new(access_token, expires_in, refresh));
        self.persist();
    }
}

/// Token lifecycle manager.
pub struct AuthSession {
    inner: Mutex<Inner>,
    exchanger: Arc<dyn TokenExchanger>,
}

impl AuthSession {
    /// Build a session from a token store, loading any persisted tokens.
    pub fn new(store: Box<dyn TokenStore + Send>, exchanger: Arc<dyn TokenExchanger>) -> Self {
        let tokens = store
            .get_access_token()
            .map(|access| TokenSet {
                access,
                refresh_token: store.get_refresh_token(),
            });
        Self {
            inner: Mutex::new(Inner { tokens, store }),
            exchanger,
        }
    }

    /// A fresh bearer token, refreshing transparently when stale.
    ///
    /// Errors: `NotAuthenticated` when no tokens are held at all,
    /// `AuthExpired` when a refresh was needed and failed (the session is
    /// cleared; interactive login is required).
    pub async fn bearer_token(&self) -> Result<String> {
        let mut inner = self.inner.lock().await;

        let Some(tokens) = inner.tokens.as_ref() else {
            return Err(Error::NotAuthenticated);
        };
        if tokens.is_fresh() {
            return Ok(tokens.access.token.clone());
        }

        let Some(refresh_token) = tokens.refresh_token.clone() else {
            tracing::warn!("Access token stale and no refresh token held");
            inner.clear();
            return Err(Error::AuthExpired);
        };

        tracing::info!("Access token stale, refreshing...");
        match self.exchanger.exchange(&refresh_token).await {
            Ok((access, expires_in, new_refresh)) => {
                // Servers may not rotate the refresh token; keep the old one.
                let refresh = new_refresh.or(Some(refresh_token));
                inner.install(access.clone(), expires_in, refresh);
                tracing::info!("Token refresh complete");
                Ok(access)
            }
            Err(e) => {
                tracing::warn!("Token refresh failed: {e}");
                inner.clear();
                Err(Error::AuthExpired)
            }
        }
    }

    /// Install a token set obtained from the interactive login flow.
    pub async fn install(
        &self,
        access_token: String,
        expires_in: Option<u64>,
        refresh_token: Option<String>,
    ) {
        let mut inner = self.inner.lock().await;
        inner.install(access_token, expires_in, refresh_token);
    }

    /// Clear all tokens unconditionally.
    pub async fn sign_out(&self) {
        let mut inner = self.inner.lock().await;
        inner.clear();
    }

    pub async fn state(&self) -> AuthState {
        let inner = self.inner.lock().await;
        if inner.tokens.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens::StoredToken;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MemStore {
        access: Option<StoredToken>,
        refresh: Option<String>,
    }

    impl TokenStore for MemStore {
        fn get_access_token(&self) -> Option<StoredToken> {
            self.access.clone()
        }
        fn set_access_token(&mut self, token: String, expires_in: Option<u64>) {
            self.access = Some(StoredToken::new(token, expires_in));
        }
        fn get_refresh_token(&self) -> Option<String> {
            self.refresh.clone()
        }
        fn set_refresh_token(&mut self, token: String) {
            self.refresh = Some(token);
        }
        fn clear_tokens(&mut self) {
            self.access = None;
            self.refresh = None;
        }
        fn flush(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct CountingExchanger {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingExchanger {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    impl TokenExchanger for CountingExchanger {
        fn exchange<'a>(&'a self, _refresh_token: &'a str) -> BoxFuture<'a, Result<Exchanged>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                // Widen the refresh window so concurrent callers overlap.
                for _ in 0..16 {
                    tokio::task::yield_now().await;
                }
                if self.fail {
                    Err(Error::InvalidResponse("refresh rejected".into()))
                } else {
                    Ok(("fresh-token".to_string(), Some(3600), Some("rt2".to_string())))
                }
            })
        }
    }

    fn stale_store() -> Box<MemStore> {
        Box::new(MemStore {
            // Expires "now": inside the staleness buffer.
            access: Some(StoredToken::new("stale".into(), Some(0))),
            refresh: Some("rt1".into()),
        })
    }

    #[tokio::test]
    async fn test_fresh_token_skips_exchange() {
        let store = Box::new(MemStore {
            access: Some(StoredToken::new("good".into(), Some(3600))),
            refresh: Some("rt1".into()),
        });
        let exchanger = CountingExchanger::new(false);
        let session = AuthSession::new(store, exchanger.clone());

        assert_eq!(session.bearer_token().await.unwrap(), "good");
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_checks_trigger_one_refresh() {
        let exchanger = CountingExchanger::new(false);
        let session = Arc::new(AuthSession::new(stale_store(), exchanger.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let s = session.clone();
                async move { s.bearer_token().await }
            })
            .collect();
        let results = futures::future::join_all(tasks).await;

        for r in results {
            assert_eq!(r.unwrap(), "fresh-token");
        }
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_session() {
        let exchanger = CountingExchanger::new(true);
        let session = AuthSession::new(stale_store(), exchanger.clone());

        assert!(matches!(
            session.bearer_token().await,
            Err(Error::AuthExpired)
        ));
        // No stale token is retained; the next call sees no session at all.
        assert!(matches!(
            session.bearer_token().await,
            Err(Error::NotAuthenticated)
        ));
        assert_eq!(session.state().await, AuthState::Unauthenticated);
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_without_refresh_token_expires() {
        let store = Box::new(MemStore {
            access: Some(StoredToken::new("stale".into(), Some(0))),
            refresh: None,
        });
        let session = AuthSession::new(store, CountingExchanger::new(false));
        assert!(matches!(
            session.bearer_token().await,
            Err(Error::AuthExpired)
        ));
    }

    #[tokio::test]
    async fn test_no_tokens_is_not_authenticated() {
        let session = AuthSession::new(Box::<MemStore>::default(), CountingExchanger::new(false));
        assert!(matches!(
            session.bearer_token().await,
            Err(Error::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_sign_out_clears_unconditionally() {
        let session = AuthSession::new(stale_store(), CountingExchanger::new(false));
        session.sign_out().await;
        assert_eq!(session.state().await, AuthState::Unauthenticated);
        assert!(matches!(
            session.bearer_token().await,
            Err(Error::NotAuthenticated)
        ));
    }
}
