//! Integration tests for the sync orchestrator.
//!
//! A stub metric source stands in for the data API so individual metrics
//! can be forced to succeed or fail; the end-to-end scenario at the
//! bottom drives the real HTTP fetcher and the real token refresh against
//! a mock server.

use chrono::{Duration, NaiveDate, Utc};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use vitalsync_core::{
    AccountKey, ArtifactStore, Credential, CredentialStore, FetchError, FileArtifactStore,
    MemoryCredentialStore, MetricFetcher, MetricKind, MetricSource, OAuthClient, ProviderConfig,
    Secret, SyncOrchestrator, SyncStatus, TokenLifecycleManager,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// Metric source with scripted per-metric responses and a call counter.
struct StubSource {
    calls: AtomicUsize,
    responses: Mutex<HashMap<MetricKind, VecDeque<Result<Value, FetchError>>>>,
}

impl StubSource {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            responses: Mutex::new(HashMap::new()),
        }
    }

    fn script(self, metric: MetricKind, response: Result<Value, FetchError>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(metric)
            .or_default()
            .push_back(response);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricSource for StubSource {
    async fn fetch(
        &self,
        metric: MetricKind,
        _date: NaiveDate,
        _credential: &Credential,
    ) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .get_mut(&metric)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| {
                Err(FetchError::Transport {
                    message: "no scripted response".to_string(),
                })
            })
    }
}

fn valid_credential() -> Credential {
    let now = Utc::now();
    Credential {
        account: AccountKey::default(),
        user_id: "ABC123".to_string(),
        access_token: Secret::new("valid-access-token"),
        refresh_token: Secret::new("valid-refresh-token"),
        expires_at: now + Duration::hours(1),
        scopes: vec!["activity".to_string(), "heartrate".to_string()],
        token_type: "Bearer".to_string(),
        created_at: now,
        updated_at: now,
    }
}

fn target_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
}

/// Manager whose token endpoint is never reachable; tests that use it
/// must only exercise non-refresh paths.
fn offline_manager() -> Arc<TokenLifecycleManager<MemoryCredentialStore>> {
    let oauth = OAuthClient::new(
        ProviderConfig::fitbit()
            .with_client_id("test-client-id")
            .with_token_url("http://127.0.0.1:1/oauth2/token"),
    )
    .unwrap();
    Arc::new(TokenLifecycleManager::new(
        Arc::new(MemoryCredentialStore::new()),
        oauth,
    ))
}

#[tokio::test]
async fn test_partial_failure_isolates_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = FileArtifactStore::new(dir.path());
    let account = AccountKey::default();

    // A prior heart-rate artifact from an earlier run must survive the
    // failed re-sync untouched.
    let prior = artifacts
        .save(
            &account,
            MetricKind::HeartRateIntraday,
            target_date(),
            &json!({"from": "previous-run"}),
        )
        .await
        .unwrap();

    let manager = offline_manager();
    manager.store().put(valid_credential()).await.unwrap();

    let source = StubSource::new()
        .script(MetricKind::Steps, Ok(json!({"steps": 9000})))
        .script(
            MetricKind::HeartRateIntraday,
            Err(FetchError::RateLimited {
                retry_after: Some(60),
            }),
        );

    let orchestrator = SyncOrchestrator::new(
        manager,
        source,
        artifacts.clone(),
        MetricKind::default_set(),
    );
    let report = orchestrator.run_sync(&account, Some(target_date())).await;

    assert_eq!(report.status, SyncStatus::Partial);
    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcomes[0].is_success());
    assert!(!report.outcomes[1].is_success());
    assert_eq!(report.failed_metrics().count(), 1);

    // The successful artifact is present.
    assert!(
        artifacts
            .exists(&account, MetricKind::Steps, target_date())
            .await
            .unwrap()
    );

    // The failed metric's prior artifact was not overwritten.
    let untouched: Value = serde_json::from_slice(&std::fs::read(&prior).unwrap()).unwrap();
    assert_eq!(untouched, json!({"from": "previous-run"}));
}

#[tokio::test]
async fn test_resync_overwrites_not_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = FileArtifactStore::new(dir.path());
    let account = AccountKey::default();

    let manager = offline_manager();
    manager.store().put(valid_credential()).await.unwrap();

    let source = StubSource::new()
        .script(MetricKind::Steps, Ok(json!({"run": 1})))
        .script(MetricKind::HeartRateIntraday, Ok(json!({"run": 1})))
        .script(MetricKind::Steps, Ok(json!({"run": 2})))
        .script(MetricKind::HeartRateIntraday, Ok(json!({"run": 2})));

    let orchestrator = SyncOrchestrator::new(
        manager,
        source,
        artifacts.clone(),
        MetricKind::default_set(),
    );

    let first = orchestrator.run_sync(&account, Some(target_date())).await;
    assert_eq!(first.status, SyncStatus::Complete);
    let second = orchestrator.run_sync(&account, Some(target_date())).await;
    assert_eq!(second.status, SyncStatus::Complete);

    // Exactly one artifact per metric/date, holding the second run.
    let entries: Vec<_> = std::fs::read_dir(dir.path().join("default"))
        .unwrap()
        .collect();
    assert_eq!(entries.len(), 2);

    let steps_path = artifacts.artifact_path(&account, MetricKind::Steps, target_date());
    let written: Value = serde_json::from_slice(&std::fs::read(steps_path).unwrap()).unwrap();
    assert_eq!(written, json!({"run": 2}));
}

#[tokio::test]
async fn test_not_connected_performs_zero_fetches() {
    let dir = tempfile::tempdir().unwrap();
    let manager = offline_manager(); // empty store
    let source = StubSource::new();

    let orchestrator = SyncOrchestrator::new(
        manager,
        source,
        FileArtifactStore::new(dir.path()),
        MetricKind::default_set(),
    );
    let report = orchestrator
        .run_sync(&AccountKey::default(), Some(target_date()))
        .await;

    assert_eq!(report.status, SyncStatus::NotConnected);
    assert!(report.outcomes.is_empty());
    assert!(report.error.is_some());
    assert_eq!(orchestrator.source().calls(), 0);
}

#[tokio::test]
async fn test_unauthorized_retries_exactly_once_then_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let account = AccountKey::default();

    let manager = offline_manager();
    manager.store().put(valid_credential()).await.unwrap();

    let source = StubSource::new()
        .script(MetricKind::Steps, Err(FetchError::Unauthorized))
        .script(MetricKind::Steps, Ok(json!({"steps": 42})));

    let orchestrator = SyncOrchestrator::new(
        manager,
        source,
        FileArtifactStore::new(dir.path()),
        vec![MetricKind::Steps],
    );
    let report = orchestrator.run_sync(&account, Some(target_date())).await;

    assert_eq!(report.status, SyncStatus::Complete);
    assert_eq!(orchestrator.source().calls(), 2);
}

#[tokio::test]
async fn test_unauthorized_twice_marks_metric_failed() {
    let dir = tempfile::tempdir().unwrap();
    let account = AccountKey::default();

    let manager = offline_manager();
    manager.store().put(valid_credential()).await.unwrap();

    let source = StubSource::new()
        .script(MetricKind::Steps, Err(FetchError::Unauthorized))
        .script(MetricKind::Steps, Err(FetchError::Unauthorized))
        .script(MetricKind::HeartRateIntraday, Ok(json!({"bpm": []})));

    let orchestrator = SyncOrchestrator::new(
        manager,
        source,
        FileArtifactStore::new(dir.path()),
        MetricKind::default_set(),
    );
    let report = orchestrator.run_sync(&account, Some(target_date())).await;

    // One 401 retry only; the heart-rate metric still synced.
    assert_eq!(report.status, SyncStatus::Partial);
    assert!(!report.outcomes[0].is_success());
    assert!(report.outcomes[1].is_success());
    assert_eq!(orchestrator.source().calls(), 3);
}

#[tokio::test]
async fn test_transient_token_failure_short_circuits() {
    let dir = tempfile::tempdir().unwrap();
    let account = AccountKey::default();

    // Expired credential + unreachable token endpoint: refresh fails with
    // a network error before any metric can be fetched.
    let manager = offline_manager();
    let mut expired = valid_credential();
    expired.expires_at = Utc::now() - Duration::minutes(5);
    manager.store().put(expired).await.unwrap();

    let source = StubSource::new();
    let orchestrator = SyncOrchestrator::new(
        manager,
        source,
        FileArtifactStore::new(dir.path()),
        MetricKind::default_set(),
    );
    let report = orchestrator.run_sync(&account, Some(target_date())).await;

    assert_eq!(report.status, SyncStatus::Failed);
    assert!(report.outcomes.is_empty());
    assert_eq!(orchestrator.source().calls(), 0);
}

/// End-to-end: expired credential, one refresh, two fetches, two stored
/// artifacts.
#[tokio::test]
async fn test_expired_credential_full_sync_round_trip() {
    let mock_server = MockServer::start().await;
    let date = target_date();

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "refreshed-access-token",
            "token_type": "Bearer",
            "expires_in": 28800,
            "refresh_token": "rotated-refresh-token",
            "user_id": "ABC123"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!(
            "/1/user/-/activities/steps/date/{date}/1d.json"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "activities-steps": [{"dateTime": date.to_string(), "value": "10456"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!(
            "/1/user/-/activities/heart/date/{date}/1d/1min.json"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "activities-heart-intraday": {"dataset": [{"time": "00:00:00", "value": 61}]}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let oauth = OAuthClient::new(
        ProviderConfig::fitbit()
            .with_client_id("test-client-id")
            .with_client_secret("test-client-secret")
            .with_token_url(format!("{}/oauth2/token", mock_server.uri())),
    )
    .unwrap();
    let manager = Arc::new(TokenLifecycleManager::new(
        Arc::new(MemoryCredentialStore::new()),
        oauth,
    ));

    let mut expired = valid_credential();
    expired.expires_at = Utc::now() - Duration::seconds(5);
    manager.store().put(expired).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let artifacts = FileArtifactStore::new(dir.path());
    let orchestrator = SyncOrchestrator::new(
        manager.clone(),
        MetricFetcher::new(mock_server.uri()),
        artifacts.clone(),
        MetricKind::default_set(),
    );

    let account = AccountKey::default();
    let report = orchestrator.run_sync(&account, Some(date)).await;

    assert_eq!(report.status, SyncStatus::Complete);
    assert_eq!(report.outcomes.len(), 2);
    assert!(
        artifacts
            .exists(&account, MetricKind::Steps, date)
            .await
            .unwrap()
    );
    assert!(
        artifacts
            .exists(&account, MetricKind::HeartRateIntraday, date)
            .await
            .unwrap()
    );

    // The refreshed credential was persisted for the next run.
    let stored = manager.store().get(&account).await.unwrap().unwrap();
    assert_eq!(stored.access_token.expose(), "refreshed-access-token");
}
