//! OAuth 2.0 exchanges against the authorization server.
//!
//! [`OAuthClient`] wraps the `oauth2` crate with the provider
//! configuration and performs the two grants the system needs: the
//! authorization-code exchange (initial connect) and the refresh-token
//! exchange. It is stateless besides in-flight HTTP calls and never
//! touches storage.
//!
//! Fitbit includes the provider-assigned user id as an extra field of the
//! token response; [`UserTokenFields`] captures it so the credential can
//! record which external account was linked.

use chrono::Utc;
use oauth2::basic::{
    BasicErrorResponse, BasicErrorResponseType, BasicRevocationErrorResponse,
    BasicTokenIntrospectionResponse, BasicTokenType,
};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken, ExtraTokenFields,
    RedirectUrl, RefreshToken, RequestTokenError, Scope, StandardRevocableToken,
    StandardTokenResponse, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::model::{Secret, TokenGrant};
use crate::provider::ProviderConfig;

/// Extra token-response fields the provider sends alongside the standard
/// OAuth fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTokenFields {
    /// Provider-assigned user identifier.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl ExtraTokenFields for UserTokenFields {}

type ProviderTokenResponse = StandardTokenResponse<UserTokenFields, BasicTokenType>;

type ProviderClient = Client<
    BasicErrorResponse,
    ProviderTokenResponse,
    BasicTokenType,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// Client for the authorization server's code and refresh grants.
pub struct OAuthClient {
    config: ProviderConfig,
    client: ProviderClient,
}

impl OAuthClient {
    /// Build a client from the provider configuration.
    ///
    /// Fails if any configured endpoint or the redirect URI is not a
    /// valid URL.
    pub fn new(config: ProviderConfig) -> Result<Self, AuthError> {
        let auth_url = AuthUrl::new(config.auth_url.clone()).map_err(|e| AuthError::Config {
            message: format!("invalid auth URL: {}", e),
        })?;
        let token_url = TokenUrl::new(config.token_url.clone()).map_err(|e| AuthError::Config {
            message: format!("invalid token URL: {}", e),
        })?;
        let redirect_url =
            RedirectUrl::new(config.redirect_uri.clone()).map_err(|e| AuthError::Config {
                message: format!("invalid redirect URL: {}", e),
            })?;

        let client = ProviderClient::new(
            ClientId::new(config.client_id.clone()),
            config.client_secret.clone().map(ClientSecret::new),
            auth_url,
            Some(token_url),
        )
        .set_redirect_uri(redirect_url);

        Ok(Self { config, client })
    }

    /// Build the authorization URL for the user to visit.
    ///
    /// Returns the URL and the CSRF state token; the state must be
    /// verified when the redirect comes back.
    pub fn authorization_url(&self) -> (String, String) {
        let (url, state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.config.scopes.iter().cloned().map(Scope::new))
            .url();
        (url.to_string(), state.secret().clone())
    }

    /// Exchange an authorization code for a token grant.
    ///
    /// Not retried on failure: authorization codes are single-use.
    pub async fn exchange_code(&self, code: impl Into<String>) -> Result<TokenGrant, AuthError> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.into()))
            .request_async(async_http_client)
            .await
            .map_err(classify_request_error)?;

        tracing::debug!("authorization code exchange succeeded");
        Ok(grant_from_response(response))
    }

    /// Exchange a refresh token for a new token grant.
    ///
    /// A [`AuthError::Rejected`] result means the refresh token was
    /// revoked or already rotated away; the caller must discard the
    /// stored credential. Other errors are transient.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(classify_request_error)?;

        tracing::debug!("refresh token exchange succeeded");
        Ok(grant_from_response(response))
    }
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("token_url", &self.config.token_url)
            .field("client_id", &self.config.client_id)
            .finish()
    }
}

fn grant_from_response(response: ProviderTokenResponse) -> TokenGrant {
    // The provider always sends expires_in; fall back to a conservative
    // hour if it ever does not, so the expiry invariant holds.
    let expires_at = match response
        .expires_in()
        .and_then(|d| chrono::Duration::from_std(d).ok())
    {
        Some(ttl) => Utc::now() + ttl,
        None => Utc::now() + chrono::Duration::hours(1),
    };

    let scopes = response
        .scopes()
        .map(|s| s.iter().map(|scope| scope.to_string()).collect())
        .unwrap_or_default();

    TokenGrant {
        access_token: Secret::new(response.access_token().secret().clone()),
        refresh_token: response
            .refresh_token()
            .map(|t| Secret::new(t.secret().clone())),
        expires_at,
        scopes,
        user_id: response.extra_fields().user_id.clone(),
    }
}

fn classify_request_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> AuthError
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => {
            let message = response.to_string();
            match response.error() {
                // The grant itself is dead; re-authorization is required.
                BasicErrorResponseType::InvalidGrant => AuthError::Rejected { message },
                _ => AuthError::Server { message },
            }
        }
        RequestTokenError::Request(e) => AuthError::Network {
            message: e.to_string(),
        },
        RequestTokenError::Parse(e, _) => AuthError::Protocol {
            message: e.to_string(),
        },
        RequestTokenError::Other(message) => AuthError::Server { message },
    }
}
