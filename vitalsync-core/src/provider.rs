//! OAuth provider configuration.
//!
//! The core never reads environment or files; the collaborator that
//! constructs it supplies a [`ProviderConfig`] with the authorization
//! endpoints, client identity, and scope set.

use serde::{Deserialize, Serialize};

/// Configuration for the external authorization server and data API.
///
/// # Example
///
/// ```
/// use vitalsync_core::provider::ProviderConfig;
///
/// let provider = ProviderConfig::fitbit()
///     .with_client_id("my-client-id")
///     .with_client_secret("my-client-secret")
///     .with_redirect_uri("http://localhost:5000/callback");
/// assert!(provider.token_url.contains("fitbit"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// OAuth authorization endpoint URL.
    pub auth_url: String,

    /// OAuth token endpoint URL.
    pub token_url: String,

    /// Base URL of the data API.
    pub api_base_url: String,

    /// OAuth client identifier.
    pub client_id: String,

    /// OAuth client secret, if the client is confidential.
    pub client_secret: Option<String>,

    /// Redirect URI registered with the provider.
    pub redirect_uri: String,

    /// Scopes requested during authorization.
    pub scopes: Vec<String>,
}

impl ProviderConfig {
    /// Fitbit's endpoints and the default scope set the sync needs.
    pub fn fitbit() -> Self {
        Self {
            auth_url: "https://www.fitbit.com/oauth2/authorize".to_string(),
            token_url: "https://api.fitbit.com/oauth2/token".to_string(),
            api_base_url: "https://api.fitbit.com".to_string(),
            client_id: String::new(),
            client_secret: None,
            redirect_uri: "http://localhost:5000/callback".to_string(),
            scopes: vec![
                "activity".to_string(),
                "heartrate".to_string(),
                "profile".to_string(),
            ],
        }
    }

    /// Set the client identifier.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Set the client secret.
    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Set the redirect URI.
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    /// Set the requested scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Override the data API base URL (for testing with a mock server).
    pub fn with_api_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_base_url = base_url.into();
        self
    }

    /// Override the token endpoint URL (for testing with a mock server).
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }
}
