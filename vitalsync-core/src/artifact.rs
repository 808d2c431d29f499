//! Durable storage of fetched payloads.
//!
//! One artifact per (account, metric, date), laid out as
//! `<root>/<account>/<date>_<metric>.json` so listing an account's
//! directory reconstructs its sync history without a separate index.
//! Re-syncing a date overwrites the prior artifact; every write goes
//! through a sibling temp file and a rename so a crash mid-write never
//! leaves a corrupt artifact visible.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::ArtifactError;
use crate::model::{AccountKey, MetricKind};

/// Durable persistence of raw fetched payloads.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist a payload, overwriting any prior artifact for the same
    /// (account, metric, date). Returns the path written.
    async fn save(
        &self,
        account: &AccountKey,
        metric: MetricKind,
        date: NaiveDate,
        payload: &Value,
    ) -> Result<PathBuf, ArtifactError>;

    /// Whether an artifact already exists for (account, metric, date).
    ///
    /// Supports skip-if-already-synced policies by a caller.
    async fn exists(
        &self,
        account: &AccountKey,
        metric: MetricKind,
        date: NaiveDate,
    ) -> Result<bool, ArtifactError>;
}

/// Filesystem-backed artifact store.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    /// Create a store rooted at the given data directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the artifact for (account, metric, date).
    pub fn artifact_path(
        &self,
        account: &AccountKey,
        metric: MetricKind,
        date: NaiveDate,
    ) -> PathBuf {
        self.root
            .join(account.as_str())
            .join(format!("{}_{}.json", date, metric.as_str()))
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn save(
        &self,
        account: &AccountKey,
        metric: MetricKind,
        date: NaiveDate,
        payload: &Value,
    ) -> Result<PathBuf, ArtifactError> {
        let path = self.artifact_path(account, metric, date);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_vec_pretty(payload)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(artifact = %path.display(), "artifact written");
        Ok(path)
    }

    async fn exists(
        &self,
        account: &AccountKey,
        metric: MetricKind,
        date: NaiveDate,
    ) -> Result<bool, ArtifactError> {
        Ok(exists(&self.artifact_path(account, metric, date)).await)
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}
