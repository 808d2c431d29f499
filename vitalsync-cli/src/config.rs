//! CLI configuration handling.
//!
//! The core never reads environment or files; everything it needs is
//! loaded here from a TOML file under the platform config directory and
//! handed over at construction time.

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use vitalsync_core::{MetricKind, ProviderConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// OAuth client ID from the provider's developer portal.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: String,

    /// Redirect URI registered with the provider.
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Scopes requested during authorization.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Metrics pulled by each sync, in order.
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,

    /// Directory artifacts are written under. Defaults to the platform
    /// data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Path of the credential store file. Defaults to
    /// `credentials.json` next to the data directory.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,

    /// Logging level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Override for the data API base URL (testing only).
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Override for the token endpoint URL (testing only).
    #[serde(default)]
    pub token_url: Option<String>,
}

fn default_redirect_uri() -> String {
    "http://localhost:5000/callback".to_string()
}

fn default_scopes() -> Vec<String> {
    vec![
        "activity".to_string(),
        "heartrate".to_string(),
        "profile".to_string(),
    ]
}

fn default_metrics() -> Vec<String> {
    MetricKind::default_set()
        .into_iter()
        .map(|m| m.as_str().to_string())
        .collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Build the provider configuration handed to the core.
    pub fn provider(&self) -> ProviderConfig {
        let mut provider = ProviderConfig::fitbit()
            .with_client_id(self.client_id.clone())
            .with_client_secret(self.client_secret.clone())
            .with_redirect_uri(self.redirect_uri.clone())
            .with_scopes(self.scopes.clone());
        if let Some(base) = &self.api_base_url {
            provider = provider.with_api_base_url(base.clone());
        }
        if let Some(token_url) = &self.token_url {
            provider = provider.with_token_url(token_url.clone());
        }
        provider
    }

    /// Parse the configured metric names into the core's metric kinds.
    pub fn metric_kinds(&self) -> Result<Vec<MetricKind>> {
        self.metrics
            .iter()
            .map(|name| {
                MetricKind::from_str(name)
                    .with_context(|| format!("unsupported metric in config: {name}"))
            })
            .collect()
    }

    /// Directory artifacts are written under.
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(default_dirs()?.data_dir().join("artifacts")),
        }
    }

    /// Path of the credential store file.
    pub fn resolved_credentials_path(&self) -> Result<PathBuf> {
        match &self.credentials_path {
            Some(path) => Ok(path.clone()),
            None => Ok(default_dirs()?.data_dir().join("credentials.json")),
        }
    }
}

/// Default path of the config file.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(default_dirs()?.config_dir().join("config.toml"))
}

/// Load configuration from the given path, or the default location.
pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    if !config_path.exists() {
        bail!(
            "no configuration found at {}.\n\
             Create it with your provider app credentials:\n\n\
             \tclient_id = \"...\"\n\
             \tclient_secret = \"...\"\n\n\
             You can register an app at https://dev.fitbit.com/apps.",
            config_path.display()
        );
    }

    let contents = std::fs::read_to_string(&config_path)
        .with_context(|| format!("failed to read config from {}", config_path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config from {}", config_path.display()))?;

    if config.client_id.is_empty() || config.client_secret.is_empty() {
        bail!(
            "client_id and client_secret must be set in {}",
            config_path.display()
        );
    }

    Ok(config)
}

fn default_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "vitalsync", "vitalsync")
        .context("platform configuration directory not available")
}
