//! Vitalsync CLI
//!
//! Command-line interface for linking a fitness account and pulling its
//! daily metrics.
//!
//! # Usage
//!
//! ```bash
//! # Link an account (prints the authorization URL, waits for the code)
//! vitalsync authorize
//!
//! # Pull yesterday's metrics
//! vitalsync sync
//!
//! # Pull a specific date as JSON
//! vitalsync sync --date 2024-03-14 --json
//!
//! # Show connection state / unlink
//! vitalsync status
//! vitalsync disconnect
//! ```

mod config;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use vitalsync_core::{
    AccountKey, CredentialStore, FileArtifactStore, FileCredentialStore, MetricFetcher,
    OAuthClient, SyncOrchestrator, SyncReport, SyncStatus, TokenLifecycleManager,
};

use config::{AppConfig, load_config};

#[derive(Parser)]
#[command(name = "vitalsync")]
#[command(about = "Pull daily fitness metrics from a linked account")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Link the account: print the authorization URL and exchange the code
    Authorize,

    /// Pull the configured metrics for one date
    Sync {
        /// Target date (YYYY-MM-DD); defaults to yesterday
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the connection state
    Status,

    /// Unlink the account (deletes the stored credential)
    Disconnect,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.clone())?;
    init_logging(&config, cli.verbose);

    let account = AccountKey::default();
    let exit_code = match cli.command {
        Commands::Authorize => {
            authorize(&config, &account).await?;
            0
        }
        Commands::Sync { date, json } => sync(&config, &account, date, json).await?,
        Commands::Status => {
            status(&config, &account).await?;
            0
        }
        Commands::Disconnect => {
            disconnect(&config, &account).await?;
            0
        }
    };

    std::process::exit(exit_code);
}

fn init_logging(config: &AppConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { &config.log_level };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn credential_store(config: &AppConfig) -> Result<Arc<FileCredentialStore>> {
    let path = config.resolved_credentials_path()?;
    Ok(Arc::new(FileCredentialStore::load(path)?))
}

/// The authorization-callback flow: direct the user to the provider,
/// exchange the code they bring back, and persist the credential.
async fn authorize(config: &AppConfig, account: &AccountKey) -> Result<()> {
    let oauth = OAuthClient::new(config.provider())?;
    let (url, expected_state) = oauth.authorization_url();

    println!("Open this URL in your browser and approve access:\n");
    println!("  {url}\n");
    println!("After approving you will be redirected to {}.", config.redirect_uri);
    print!("Paste the full redirect URL (or just the code): ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let code = extract_code(line.trim(), &expected_state)?;

    let grant = oauth.exchange_code(code).await?;
    let credential = grant.into_credential(account.clone())?;
    let user_id = credential.user_id.clone();

    credential_store(config)?.put(credential).await?;
    println!("Account linked successfully (user id: {user_id}).");
    Ok(())
}

/// Pull the authorization code out of a pasted redirect URL, validating
/// the CSRF state when the full URL was pasted. A bare code is accepted
/// as-is.
fn extract_code(input: &str, expected_state: &str) -> Result<String> {
    if input.is_empty() {
        bail!("no authorization code provided");
    }
    if !input.starts_with("http://") && !input.starts_with("https://") {
        return Ok(input.to_string());
    }

    let url = url::Url::parse(input).context("failed to parse the redirect URL")?;
    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => bail!("the provider returned an error: {value}"),
            _ => {}
        }
    }

    match state.as_deref() {
        Some(state) if state == expected_state => {}
        Some(_) => {
            bail!("OAuth state mismatch; possible stale authorization attempt, try again")
        }
        None => bail!("the redirect URL carried no state parameter; try again"),
    }

    code.context("the redirect URL carried no authorization code")
}

/// The sync-trigger flow. Returns the process exit code: 0 when every
/// metric succeeded, 2 on partial success, 3 when not connected.
async fn sync(
    config: &AppConfig,
    account: &AccountKey,
    date: Option<NaiveDate>,
    json: bool,
) -> Result<i32> {
    let store = credential_store(config)?;
    let provider = config.provider();
    let tokens = Arc::new(TokenLifecycleManager::new(
        store,
        OAuthClient::new(provider.clone())?,
    ));
    let orchestrator = SyncOrchestrator::new(
        tokens,
        MetricFetcher::new(provider.api_base_url),
        FileArtifactStore::new(config.resolved_data_dir()?),
        config.metric_kinds()?,
    );

    let report = orchestrator.run_sync(account, date).await;
    tracing::debug!(status = ?report.status, outcomes = report.outcomes.len(), "sync finished");

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(match report.status {
        SyncStatus::Complete => 0,
        SyncStatus::Failed => 1,
        SyncStatus::Partial => 2,
        SyncStatus::NotConnected => 3,
    })
}

fn print_report(report: &SyncReport) {
    match report.status {
        SyncStatus::Complete => {
            println!("Sync complete for {} ({}).", report.account, report.date)
        }
        SyncStatus::Partial => {
            println!("Sync partially succeeded for {} ({}).", report.account, report.date)
        }
        SyncStatus::NotConnected => {
            println!("No account connected. Run `vitalsync authorize` first.");
            return;
        }
        SyncStatus::Failed => {
            println!(
                "Sync failed: {}",
                report.error.as_deref().unwrap_or("unknown error")
            );
            return;
        }
    }

    for outcome in &report.outcomes {
        match &outcome.status {
            vitalsync_core::OutcomeStatus::Succeeded { artifact } => {
                println!("  {:20} ok      {}", outcome.metric, artifact.display());
            }
            vitalsync_core::OutcomeStatus::Failed { reason } => {
                println!("  {:20} failed  {}", outcome.metric, reason);
            }
        }
    }
}

async fn status(config: &AppConfig, account: &AccountKey) -> Result<()> {
    let store = credential_store(config)?;
    match store.get(account).await? {
        Some(credential) => {
            println!("Account:   {}", credential.account);
            println!("User id:   {}", credential.user_id);
            println!("Scopes:    {}", credential.scopes.join(" "));
            println!("Expires:   {}", credential.expires_at);
            println!("Linked at: {}", credential.created_at);
            if credential.is_expired() {
                println!("The access token is expired; the next sync will refresh it.");
            }
        }
        None => println!("No account connected."),
    }
    Ok(())
}

async fn disconnect(config: &AppConfig, account: &AccountKey) -> Result<()> {
    credential_store(config)?.delete(account).await?;
    println!("Account disconnected.");
    Ok(())
}
