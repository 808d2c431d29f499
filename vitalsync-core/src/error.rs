//! Error taxonomy for vitalsync.
//!
//! Each concern carries its own error enum:
//! - [`AuthError`] - authorization-server exchanges, split terminal/transient
//! - [`TokenError`] - credential lookup and refresh outcomes
//! - [`StoreError`] - credential persistence
//! - [`FetchError`] - data-API reads
//! - [`ArtifactError`] - artifact persistence
//!
//! [`VitalsyncError`] wraps them all for callers that want one type.

use thiserror::Error;

/// Error from an authorization-code or refresh-token exchange.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The authorization server rejected the grant itself (revoked or
    /// invalid code/refresh token). Terminal: the stored credential must
    /// not be reused.
    #[error("authorization rejected: {message}")]
    Rejected { message: String },

    /// The authorization server answered with a non-grant error (5xx,
    /// temporarily unavailable). Transient: eligible for a later retry.
    #[error("authorization server error: {message}")]
    Server { message: String },

    /// Network failure before a response was received. Transient.
    #[error("network error during token exchange: {message}")]
    Network { message: String },

    /// The server's response could not be interpreted as a token grant.
    #[error("malformed token response: {message}")]
    Protocol { message: String },

    /// The OAuth endpoints or redirect URI are misconfigured.
    #[error("invalid OAuth configuration: {message}")]
    Config { message: String },
}

impl AuthError {
    /// Whether this failure invalidates the stored credential.
    ///
    /// Terminal errors force re-authorization; everything else leaves the
    /// stored credential untouched so a later call can retry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthError::Rejected { .. })
    }
}

/// Error obtaining a valid credential for an account.
#[derive(Debug, Error)]
pub enum TokenError {
    /// No credential is stored for the account. The user must re-authorize.
    #[error("account {account} is not connected")]
    NotConnected { account: String },

    /// A transient auth failure; the stored credential was left in place.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Credential storage failed.
    #[error("credential store error: {0}")]
    Store(#[from] StoreError),
}

/// Error from credential storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error reading or writing the store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal lock poisoning error.
    #[error("internal lock error: {message}")]
    Lock { message: String },
}

/// Error fetching one metric for one date from the data API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The credential was rejected (401). The caller should re-validate
    /// the credential and may retry once.
    #[error("credential rejected by the data API")]
    Unauthorized,

    /// The provider throttled the request (429).
    #[error("rate limited by the data API{}", retry_after_hint(.retry_after))]
    RateLimited {
        /// Seconds to wait before retrying, if the provider said.
        retry_after: Option<u64>,
    },

    /// Network failure, timeout, or server error (5xx). Retried a bounded
    /// number of times before surfacing.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Any other provider rejection (4xx other than 401/404/429).
    #[error("data API rejected the request ({status}): {message}")]
    Provider { status: u16, message: String },
}

impl FetchError {
    /// Whether the fetcher's bounded retry loop should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transport { .. })
    }
}

fn retry_after_hint(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

/// Error persisting a fetched payload.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// I/O error writing the artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level error type encompassing all vitalsync errors.
#[derive(Debug, Error)]
pub enum VitalsyncError {
    /// Error from an OAuth exchange.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Error obtaining a valid credential.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Error from credential storage.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error from a metric fetch.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Error from artifact storage.
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}
