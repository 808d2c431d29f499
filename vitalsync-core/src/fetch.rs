//! Metric fetching from the external data API.
//!
//! [`MetricSource`] is the uniform "fetch metric for date" contract;
//! [`MetricFetcher`] is the HTTP implementation against the provider's
//! read endpoints. Payloads are opaque JSON documents, validated only for
//! well-formedness.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use crate::error::FetchError;
use crate::model::{Credential, MetricKind};

/// Default request timeout per external call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounded retry budget for transport/server errors.
const MAX_ATTEMPTS: u32 = 3;

/// First backoff delay; doubles per attempt.
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Uniform contract for fetching one metric for one date.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Fetch the payload for a metric on a date with the given credential.
    ///
    /// A date with no recorded data is an empty-but-successful result,
    /// not an error.
    async fn fetch(
        &self,
        metric: MetricKind,
        date: NaiveDate,
        credential: &Credential,
    ) -> Result<Value, FetchError>;
}

/// HTTP client for the provider's time-series endpoints.
pub struct MetricFetcher {
    http: reqwest::Client,
    base_url: String,
}

impl MetricFetcher {
    /// Create a fetcher against the given API base URL (no trailing
    /// slash), e.g. `https://api.fitbit.com` or a mock server URI.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized, the same failure
    /// mode as `reqwest::Client::new()`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("vitalsync/0.1")
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Resource path for a metric on a date, relative to the API base.
    fn resource_path(metric: MetricKind, date: NaiveDate) -> String {
        match metric {
            MetricKind::Steps => {
                format!("/1/user/-/activities/steps/date/{date}/1d.json")
            }
            MetricKind::HeartRateIntraday => {
                format!("/1/user/-/activities/heart/date/{date}/1d/1min.json")
            }
        }
    }

    async fn request(&self, url: &str, credential: &Credential) -> Result<Value, FetchError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(credential.access_token.expose())
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        match status {
            s if s.is_success() => {
                response
                    .json::<Value>()
                    .await
                    .map_err(|e| FetchError::Transport {
                        message: format!("malformed response body: {}", e),
                    })
            }
            StatusCode::UNAUTHORIZED => Err(FetchError::Unauthorized),
            // No data recorded for this date; an empty document is a
            // valid, persistable result.
            StatusCode::NOT_FOUND => Ok(Value::Object(serde_json::Map::new())),
            StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited {
                retry_after: response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok()),
            }),
            s if s.is_server_error() => Err(FetchError::Transport {
                message: format!("server error: {}", s),
            }),
            s => {
                let message = response.text().await.unwrap_or_default();
                Err(FetchError::Provider {
                    status: s.as_u16(),
                    message,
                })
            }
        }
    }
}

impl std::fmt::Debug for MetricFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricFetcher")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl MetricSource for MetricFetcher {
    async fn fetch(
        &self,
        metric: MetricKind,
        date: NaiveDate,
        credential: &Credential,
    ) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.base_url, Self::resource_path(metric, date));
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 1;

        loop {
            match self.request(&url, credential).await {
                Ok(payload) => {
                    tracing::debug!(metric = %metric, %date, "fetched metric");
                    return Ok(payload);
                }
                Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                    tracing::debug!(
                        metric = %metric,
                        %date,
                        attempt,
                        error = %err,
                        "transport error, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(metric = %metric, %date, error = %err, "metric fetch failed");
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_paths() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        assert_eq!(
            MetricFetcher::resource_path(MetricKind::Steps, date),
            "/1/user/-/activities/steps/date/2024-03-14/1d.json"
        );
        assert_eq!(
            MetricFetcher::resource_path(MetricKind::HeartRateIntraday, date),
            "/1/user/-/activities/heart/date/2024-03-14/1d/1min.json"
        );
    }
}
