//! Lazy-memoized credential store.
//!
//! Holds the current access and session tokens behind a single async lock.
//! Acquisition is idempotent: once a token is cached it is returned as-is,
//! and because the lock is held across the exchange, concurrent callers
//! collapse onto one in-flight exchange per token kind.
//!
//! Exchange failures are not surfaced to callers: they are logged and the
//! acquisition resolves to `None`, so a caller sees an absent credential and
//! the next cycle retries. See [`CredentialProvider`] for the seam consumers
//! depend on.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::auth::exchange::TokenExchanger;
use crate::model::{AccessToken, SessionToken};

/// Acquisition and invalidation of the two vendor credentials.
///
/// The resource client holds this capability instead of inheriting the
/// credential machinery, so tests can substitute a mock provider.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// The cached access token, acquiring one if absent.
    ///
    /// Returns `None` when no token is cached and the exchange failed; the
    /// failure itself is logged, not propagated.
    async fn access_token(&self) -> Option<AccessToken>;

    /// The cached session token, acquiring one (and an access token first,
    /// if needed) when absent.
    ///
    /// A session token is never derived without a successfully obtained
    /// access token.
    async fn session_token(&self) -> Option<SessionToken>;

    /// Clear both cached tokens, forcing fresh exchanges on the next
    /// acquisition. Idempotent.
    async fn reset(&self);
}

#[derive(Default)]
struct TokenCache {
    access: Option<AccessToken>,
    session: Option<SessionToken>,
}

/// Default [`CredentialProvider`] backed by a [`TokenExchanger`].
pub struct CredentialStore {
    exchanger: TokenExchanger,
    tokens: Mutex<TokenCache>,
}

impl CredentialStore {
    /// Create a store with empty caches.
    pub fn new(exchanger: TokenExchanger) -> Self {
        Self {
            exchanger,
            tokens: Mutex::new(TokenCache::default()),
        }
    }

    /// Acquire the access token while already holding the cache lock.
    async fn access_token_locked(&self, cache: &mut TokenCache) -> Option<AccessToken> {
        if let Some(token) = &cache.access {
            debug!("using cached access token");
            return Some(token.clone());
        }

        match self.exchanger.exchange_refresh_token().await {
            Ok(token) => {
                cache.access = Some(token.clone());
                Some(token)
            }
            Err(err) => {
                warn!(error = %err, "access token exchange failed");
                None
            }
        }
    }
}

#[async_trait]
impl CredentialProvider for CredentialStore {
    async fn access_token(&self) -> Option<AccessToken> {
        let mut cache = self.tokens.lock().await;
        self.access_token_locked(&mut cache).await
    }

    async fn session_token(&self) -> Option<SessionToken> {
        let mut cache = self.tokens.lock().await;
        if let Some(token) = &cache.session {
            debug!("using cached session token");
            return Some(token.clone());
        }

        let access = self.access_token_locked(&mut cache).await?;

        match self.exchanger.exchange_session_token(&access).await {
            Ok(token) => {
                cache.session = Some(token.clone());
                Some(token)
            }
            Err(err) => {
                warn!(error = %err, "session token exchange failed");
                None
            }
        }
    }

    async fn reset(&self) {
        let mut cache = self.tokens.lock().await;
        cache.access = None;
        cache.session = None;
        debug!("credential caches cleared");
    }
}
