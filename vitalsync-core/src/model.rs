//! Domain model types for vitalsync.
//!
//! This module defines the core types used throughout vitalsync:
//! - [`AccountKey`] - Identifier for a linked account (e.g., "default")
//! - [`Secret`] - Wrapper for token material that prevents accidental logging
//! - [`Credential`] - The OAuth access/refresh token pair and its metadata
//! - [`TokenGrant`] - The result of a code exchange or refresh exchange
//! - [`MetricKind`] - One configured type of health data to pull

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AuthError;

/// Identifier for a linked account.
///
/// Single-tenant deployments use the `"default"` key, but the whole core is
/// keyed so multi-account deployments share the same contract.
///
/// # Examples
///
/// ```
/// use vitalsync_core::AccountKey;
///
/// let account = AccountKey::new("default");
/// assert_eq!(account.as_str(), "default");
/// assert_eq!(AccountKey::default(), account);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountKey(String);

impl AccountKey {
    /// Create a new account key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the account key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AccountKey {
    /// The single-tenant account key.
    fn default() -> Self {
        Self::new("default")
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccountKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value.
#[derive(Clone, Serialize, Deserialize)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Whether the secret holds an empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// One authorized linkage to the external account.
///
/// Credentials are created by the authorization-code exchange and mutated
/// only by the token lifecycle manager's refresh path. At most one
/// credential per account key is ever stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// The account this credential belongs to.
    pub account: AccountKey,

    /// Provider-assigned user identifier.
    pub user_id: String,

    /// Current access token.
    pub access_token: Secret,

    /// Long-lived refresh token.
    pub refresh_token: Secret,

    /// When the access token expires.
    pub expires_at: DateTime<Utc>,

    /// OAuth scopes granted to this credential.
    pub scopes: Vec<String>,

    /// Token type (usually "Bearer").
    pub token_type: String,

    /// When the account was first linked.
    pub created_at: DateTime<Utc>,

    /// When the credential was last written. Monotonically non-decreasing.
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    /// Check if the access token has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Check if the access token expires within the given margin.
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.expires_at < Utc::now() + margin
    }

    /// Build the successor credential from a refresh grant.
    ///
    /// Carries over the account key, creation timestamp, and any fields the
    /// provider did not re-issue (refresh token, scopes, user id).
    pub fn refreshed(&self, grant: TokenGrant) -> Credential {
        Credential {
            account: self.account.clone(),
            user_id: grant.user_id.unwrap_or_else(|| self.user_id.clone()),
            access_token: grant.access_token,
            refresh_token: grant
                .refresh_token
                .unwrap_or_else(|| self.refresh_token.clone()),
            expires_at: grant.expires_at,
            scopes: if grant.scopes.is_empty() {
                self.scopes.clone()
            } else {
                grant.scopes
            },
            token_type: self.token_type.clone(),
            created_at: self.created_at,
            updated_at: Utc::now(),
        }
    }
}

/// The token material returned by a successful authorization-code or
/// refresh-token exchange. Not yet bound to an account key.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// The newly issued access token.
    pub access_token: Secret,

    /// Rotated refresh token, if the provider issued one.
    pub refresh_token: Option<Secret>,

    /// When the access token expires.
    pub expires_at: DateTime<Utc>,

    /// Scopes attached to the grant.
    pub scopes: Vec<String>,

    /// Provider-assigned user identifier, if included in the response.
    pub user_id: Option<String>,
}

impl TokenGrant {
    /// Bind an initial grant to an account key, producing a persistable
    /// credential.
    ///
    /// Fails if the provider did not issue a refresh token: a credential
    /// without one can never be refreshed and must not be stored.
    pub fn into_credential(self, account: AccountKey) -> Result<Credential, AuthError> {
        let refresh_token = self.refresh_token.ok_or_else(|| AuthError::Protocol {
            message: "token response did not include a refresh token".to_string(),
        })?;

        if self.access_token.is_empty() || refresh_token.is_empty() {
            return Err(AuthError::Protocol {
                message: "token response contained an empty token".to_string(),
            });
        }

        let now = Utc::now();
        Ok(Credential {
            account,
            user_id: self.user_id.unwrap_or_else(|| "unknown".to_string()),
            access_token: self.access_token,
            refresh_token,
            expires_at: self.expires_at,
            scopes: self.scopes,
            token_type: "Bearer".to_string(),
            created_at: now,
            updated_at: now,
        })
    }
}

/// One configured type of external time-series/aggregate data to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    /// Daily step count summary.
    Steps,

    /// Intraday heart rate time series at 1-minute resolution.
    HeartRateIntraday,
}

impl MetricKind {
    /// All metric kinds synced by default, in fetch order.
    pub fn default_set() -> Vec<MetricKind> {
        vec![MetricKind::Steps, MetricKind::HeartRateIntraday]
    }

    /// Stable string form, used in artifact names and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Steps => "steps",
            Self::HeartRateIntraday => "heartrate-intraday",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "steps" => Ok(Self::Steps),
            "heartrate-intraday" => Ok(Self::HeartRateIntraday),
            other => Err(UnknownMetric {
                name: other.to_string(),
            }),
        }
    }
}

/// Error parsing a metric kind name.
#[derive(Debug, thiserror::Error)]
#[error("unknown metric kind: {name}")]
pub struct UnknownMetric {
    pub name: String,
}
