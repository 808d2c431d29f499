//! # Vitalsync Core
//!
//! Core library for vitalsync: connects one external account to a
//! fitness-data API via OAuth 2.0, keeps the credential valid under
//! concurrent access, and pulls a fixed set of time-series health metrics
//! into durable per-date artifacts.
//!
//! This crate provides:
//! - Domain types for accounts, credentials, and metric kinds
//! - Traits for credential storage, metric fetching, and artifact storage
//! - The token lifecycle manager (serialized per-account refresh)
//! - The sync orchestrator (per-metric failure isolation, idempotent output)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vitalsync_core::{
//!     AccountKey, FileArtifactStore, FileCredentialStore, MetricFetcher,
//!     MetricKind, OAuthClient, ProviderConfig, SyncOrchestrator,
//!     TokenLifecycleManager,
//! };
//!
//! async fn sync() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = ProviderConfig::fitbit()
//!         .with_client_id("client-id")
//!         .with_client_secret("client-secret");
//!     let store = Arc::new(FileCredentialStore::load("credentials.json".into())?);
//!     let tokens = Arc::new(TokenLifecycleManager::new(
//!         store,
//!         OAuthClient::new(provider.clone())?,
//!     ));
//!     let orchestrator = SyncOrchestrator::new(
//!         tokens,
//!         MetricFetcher::new(provider.api_base_url),
//!         FileArtifactStore::new("data"),
//!         MetricKind::default_set(),
//!     );
//!     let report = orchestrator.run_sync(&AccountKey::default(), None).await;
//!     println!("{:?}", report.status);
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod error;
pub mod fetch;
pub mod model;
pub mod oauth;
pub mod provider;
pub mod store;
pub mod sync;
pub mod token_manager;

// Re-export commonly used types at crate root
pub use model::{AccountKey, Credential, MetricKind, Secret, TokenGrant};

pub use error::{
    ArtifactError, AuthError, FetchError, StoreError, TokenError, VitalsyncError,
};

pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};

pub use provider::ProviderConfig;

pub use oauth::OAuthClient;

pub use token_manager::TokenLifecycleManager;

pub use fetch::{MetricFetcher, MetricSource};

pub use artifact::{ArtifactStore, FileArtifactStore};

pub use sync::{MetricOutcome, OutcomeStatus, SyncOrchestrator, SyncReport, SyncStatus};
