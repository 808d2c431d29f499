//! Credential lifecycle management.
//!
//! [`TokenLifecycleManager`] owns the decision of when to refresh and
//! hands callers a credential that is guaranteed valid for at least the
//! refresh margin. Refreshes are serialized per account key: two
//! concurrent callers finding the same stale credential must not both
//! send the same refresh token to the provider, because the second use of
//! an already-rotated token is rejected and can wrongly invalidate a good
//! session.

use chrono::Duration;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::TokenError;
use crate::model::{AccountKey, Credential};
use crate::oauth::OAuthClient;
use crate::store::CredentialStore;

/// Default refresh margin in seconds.
///
/// A credential expiring within this window is proactively treated as
/// stale so it never expires between validation and use.
const DEFAULT_REFRESH_MARGIN_SECS: i64 = 60;

/// Serializes refresh attempts and hands out valid credentials.
///
/// # Type Parameters
///
/// * `S` - The credential store implementation to use
pub struct TokenLifecycleManager<S: CredentialStore> {
    store: Arc<S>,
    oauth: OAuthClient,
    refresh_margin: Duration,
    refresh_locks: Mutex<HashMap<AccountKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: CredentialStore> TokenLifecycleManager<S> {
    /// Create a manager with the default 60-second refresh margin.
    pub fn new(store: Arc<S>, oauth: OAuthClient) -> Self {
        Self::with_refresh_margin(store, oauth, DEFAULT_REFRESH_MARGIN_SECS)
    }

    /// Create a manager with a custom refresh margin.
    pub fn with_refresh_margin(store: Arc<S>, oauth: OAuthClient, margin_secs: i64) -> Self {
        Self {
            store,
            oauth,
            refresh_margin: Duration::seconds(margin_secs),
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The credential store this manager writes through.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get a credential valid for at least the refresh margin, refreshing
    /// it first if necessary.
    ///
    /// Outcomes:
    /// - `Ok(credential)` - valid as stored, or freshly refreshed and
    ///   persisted
    /// - `Err(TokenError::NotConnected)` - no credential stored, or the
    ///   refresh token was rejected and the credential has been deleted
    /// - `Err(TokenError::Auth)` - transient refresh failure; storage was
    ///   left untouched so a later call can retry
    pub async fn valid_credential(&self, account: &AccountKey) -> Result<Credential, TokenError> {
        let credential = self.load(account).await?;
        if !credential.expires_within(self.refresh_margin) {
            tracing::debug!(account = %account, "using stored access token");
            return Ok(credential);
        }

        let lock = self.refresh_lock(account);
        let _guard = lock.lock().await;

        // Another caller may have refreshed (or disconnected) the account
        // while we waited for the lock; re-check before refreshing.
        let credential = self.load(account).await?;
        if !credential.expires_within(self.refresh_margin) {
            tracing::debug!(account = %account, "credential refreshed by concurrent caller");
            return Ok(credential);
        }

        tracing::info!(account = %account, "access token stale, refreshing");
        match self.oauth.refresh(credential.refresh_token.expose()).await {
            Ok(grant) => {
                let refreshed = credential.refreshed(grant);
                self.store.put(refreshed.clone()).await?;
                tracing::info!(account = %account, "access token refreshed");
                Ok(refreshed)
            }
            Err(err) if err.is_terminal() => {
                // The stored refresh token is dead. Keeping the record
                // around would make every sync re-send a rejected token,
                // so the account reverts to not-connected.
                tracing::warn!(account = %account, error = %err, "refresh token rejected, disconnecting account");
                self.store.delete(account).await?;
                Err(TokenError::NotConnected {
                    account: account.to_string(),
                })
            }
            Err(err) => {
                tracing::error!(account = %account, error = %err, "token refresh failed");
                Err(TokenError::Auth(err))
            }
        }
    }

    async fn load(&self, account: &AccountKey) -> Result<Credential, TokenError> {
        self.store
            .get(account)
            .await?
            .ok_or_else(|| TokenError::NotConnected {
                account: account.to_string(),
            })
    }

    fn refresh_lock(&self, account: &AccountKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.refresh_locks.lock();
        locks
            .entry(account.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

impl<S: CredentialStore> std::fmt::Debug for TokenLifecycleManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenLifecycleManager")
            .field("refresh_margin", &self.refresh_margin)
            .finish()
    }
}
