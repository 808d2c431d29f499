//! The sync orchestrator and its report types.
//!
//! A sync invocation validates the credential once, then fetches each
//! configured metric in order and persists every successful payload. A
//! failure on one metric never aborts the others; the outcome of every
//! metric is aggregated into a [`SyncReport`], which is always returned,
//! never thrown.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::artifact::ArtifactStore;
use crate::error::{FetchError, TokenError};
use crate::fetch::MetricSource;
use crate::model::{AccountKey, Credential, MetricKind};
use crate::store::CredentialStore;
use crate::token_manager::TokenLifecycleManager;

/// Overall outcome of a sync invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Every configured metric succeeded.
    Complete,

    /// At least one metric failed after fetches were attempted.
    Partial,

    /// No credential is stored; no fetches were attempted.
    NotConnected,

    /// A credential-level failure short-circuited the sync before any
    /// metric could succeed.
    Failed,
}

/// Outcome of one metric for one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricOutcome {
    /// The metric this outcome describes.
    pub metric: MetricKind,

    /// Whether the fetch-and-persist succeeded.
    pub status: OutcomeStatus,
}

/// Per-metric success or failure detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The payload was fetched and durably written.
    Succeeded {
        /// Where the artifact landed.
        artifact: PathBuf,
    },

    /// The metric failed; no artifact was written for it this run.
    Failed {
        /// Human-readable failure reason.
        reason: String,
    },
}

impl MetricOutcome {
    fn succeeded(metric: MetricKind, artifact: PathBuf) -> Self {
        Self {
            metric,
            status: OutcomeStatus::Succeeded { artifact },
        }
    }

    fn failed(metric: MetricKind, reason: String) -> Self {
        Self {
            metric,
            status: OutcomeStatus::Failed { reason },
        }
    }

    /// Whether this metric succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded { .. })
    }
}

/// Structured per-metric outcome summary of a sync invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// The account that was synced.
    pub account: AccountKey,

    /// The date window that was pulled.
    pub date: NaiveDate,

    /// Overall status of the run.
    pub status: SyncStatus,

    /// Credential-level failure reason, when `status` is `NotConnected`
    /// or `Failed`.
    pub error: Option<String>,

    /// One outcome per configured metric, in fetch order. Empty when the
    /// sync short-circuited before fetching.
    pub outcomes: Vec<MetricOutcome>,
}

impl SyncReport {
    fn not_connected(account: AccountKey, date: NaiveDate) -> Self {
        Self {
            account,
            date,
            status: SyncStatus::NotConnected,
            error: Some("no account connected; authorize first".to_string()),
            outcomes: Vec::new(),
        }
    }

    fn failed(account: AccountKey, date: NaiveDate, reason: String) -> Self {
        Self {
            account,
            date,
            status: SyncStatus::Failed,
            error: Some(reason),
            outcomes: Vec::new(),
        }
    }

    fn from_outcomes(account: AccountKey, date: NaiveDate, outcomes: Vec<MetricOutcome>) -> Self {
        let status = if outcomes.iter().all(MetricOutcome::is_success) {
            SyncStatus::Complete
        } else {
            SyncStatus::Partial
        };
        Self {
            account,
            date,
            status,
            error: None,
            outcomes,
        }
    }

    /// Whether every configured metric succeeded.
    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Complete
    }

    /// The metrics that failed this run.
    pub fn failed_metrics(&self) -> impl Iterator<Item = &MetricOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Default target date: yesterday by the local calendar, because the
/// provider's intraday data for "today" is typically incomplete.
pub fn default_target_date() -> NaiveDate {
    Local::now().date_naive() - chrono::Duration::days(1)
}

/// Drives repeated external-API calls for one sync invocation.
///
/// # Type Parameters
///
/// * `S` - Credential store backing the token lifecycle manager
/// * `F` - Metric source (HTTP fetcher, or a stub in tests)
/// * `A` - Artifact store for successful payloads
pub struct SyncOrchestrator<S: CredentialStore, F: MetricSource, A: ArtifactStore> {
    tokens: Arc<TokenLifecycleManager<S>>,
    source: F,
    artifacts: A,
    metrics: Vec<MetricKind>,
}

impl<S: CredentialStore, F: MetricSource, A: ArtifactStore> SyncOrchestrator<S, F, A> {
    /// Create an orchestrator over the given collaborators and the fixed,
    /// ordered metric list to sync.
    pub fn new(
        tokens: Arc<TokenLifecycleManager<S>>,
        source: F,
        artifacts: A,
        metrics: Vec<MetricKind>,
    ) -> Self {
        Self {
            tokens,
            source,
            artifacts,
            metrics,
        }
    }

    /// The metric source this orchestrator fetches through.
    pub fn source(&self) -> &F {
        &self.source
    }

    /// Run one sync for an account.
    ///
    /// `target_date` defaults to yesterday. Always returns a report;
    /// partial success is a valid terminal state, not an error.
    pub async fn run_sync(
        &self,
        account: &AccountKey,
        target_date: Option<NaiveDate>,
    ) -> SyncReport {
        let date = target_date.unwrap_or_else(default_target_date);
        tracing::info!(account = %account, %date, "starting sync");

        let mut credential = match self.tokens.valid_credential(account).await {
            Ok(credential) => credential,
            Err(TokenError::NotConnected { .. }) => {
                tracing::warn!(account = %account, "sync skipped: not connected");
                return SyncReport::not_connected(account.clone(), date);
            }
            Err(err) => {
                tracing::error!(account = %account, error = %err, "sync aborted");
                return SyncReport::failed(account.clone(), date, err.to_string());
            }
        };

        let mut outcomes = Vec::with_capacity(self.metrics.len());
        for metric in &self.metrics {
            let outcome = self
                .sync_metric(account, *metric, date, &mut credential)
                .await;
            if let OutcomeStatus::Failed { reason } = &outcome.status {
                tracing::warn!(account = %account, metric = %metric, reason, "metric failed");
            }
            outcomes.push(outcome);
        }

        let report = SyncReport::from_outcomes(account.clone(), date, outcomes);
        tracing::info!(account = %account, %date, status = ?report.status, "sync finished");
        report
    }

    async fn sync_metric(
        &self,
        account: &AccountKey,
        metric: MetricKind,
        date: NaiveDate,
        credential: &mut Credential,
    ) -> MetricOutcome {
        let payload = match self.source.fetch(metric, date, credential).await {
            Ok(payload) => payload,
            Err(FetchError::Unauthorized) => {
                // The credential may have expired between validation and
                // use. Re-validate once and retry this metric only; a
                // second rejection is a real failure.
                tracing::info!(account = %account, metric = %metric, "credential rejected mid-sync, revalidating");
                match self.tokens.valid_credential(account).await {
                    Ok(fresh) => {
                        *credential = fresh;
                        match self.source.fetch(metric, date, credential).await {
                            Ok(payload) => payload,
                            Err(err) => return MetricOutcome::failed(metric, err.to_string()),
                        }
                    }
                    Err(err) => return MetricOutcome::failed(metric, err.to_string()),
                }
            }
            Err(err) => return MetricOutcome::failed(metric, err.to_string()),
        };

        match self.artifacts.save(account, metric, date, &payload).await {
            Ok(path) => MetricOutcome::succeeded(metric, path),
            Err(err) => {
                MetricOutcome::failed(metric, format!("artifact write failed: {}", err))
            }
        }
    }
}
