use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gsuite_auth::tools::builtin_tools;
use gsuite_auth::{
    session_from_config, BridgeConfig, Credential, CredentialStatus, CredentialStore,
    FileCredentialStore, SessionProvider,
};

#[derive(Parser, Debug)]
#[command(name = "gsuite-bridge", version, about = "Manage the Google Workspace credential used by gsuite-bridge tools")]
struct Args {
    /// Bridge config file (default: ~/.gsuite-bridge/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Credential record to use instead of the configured one
    #[arg(long, global = true)]
    token: Option<PathBuf>,

    /// Google client secrets file
    #[arg(long, global = true)]
    client_secrets: Option<PathBuf>,

    /// Print the consent URL instead of launching a browser
    #[arg(long, global = true)]
    no_browser: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Obtain a valid credential, running consent if needed
    Login {
        /// Run consent even when a valid credential is stored
        #[arg(long)]
        force: bool,
    },
    /// Show the stored credential's state without contacting Google
    Status,
    /// Refresh the access token now
    Refresh,
    /// Revoke the grant at Google and delete the stored credential
    Revoke,
    /// Delete the stored credential
    Clear,
    /// Print the tool catalogue as JSON
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries JSON results; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let output = match args.command {
        Command::Login { force } => {
            let session = open_session(&config)?;
            let credential = if force {
                session.reauthorize().await?
            } else {
                session.get_valid_credential(session.default_scopes()).await?
            };
            summary(&credential)
        }
        Command::Status => {
            let store = FileCredentialStore::new(config.token_path.clone());
            let stored = store.inspect()?;
            let status = CredentialStatus::classify(
                stored.as_ref(),
                &config.scope_set(),
                config.refresh_margin(),
                chrono::Utc::now(),
            );
            json!({
                "token_path": store.path(),
                "status": status,
            })
        }
        Command::Refresh => {
            let session = open_session(&config)?;
            summary(&session.force_refresh().await?)
        }
        Command::Revoke => {
            let session = open_session(&config)?;
            let existed = session.revoke().await?;
            if !existed {
                warn!("No stored credential to revoke");
            }
            json!({ "revoked": existed })
        }
        Command::Clear => {
            FileCredentialStore::new(config.token_path.clone()).clear()?;
            json!({ "cleared": true })
        }
        Command::Tools => serde_json::to_value(builtin_tools())?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<BridgeConfig> {
    let mut config = BridgeConfig::load(args.config.as_deref()).context("loading bridge config")?;

    if let Some(token) = &args.token {
        config.token_path = token.clone();
    }
    if let Some(secrets) = &args.client_secrets {
        config.client_secrets_path = secrets.clone();
    }
    if args.no_browser {
        config.open_browser = false;
    }

    config.validate().context("validating bridge config")?;
    Ok(config)
}

/// Build the session provider. The first Ctrl-C aborts a pending consent,
/// the second exits.
fn open_session(config: &BridgeConfig) -> anyhow::Result<SessionProvider> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; cancelling consent");
            on_signal.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    session_from_config(config, cancel).with_context(|| {
        format!(
            "setting up OAuth client from {}",
            config.client_secrets_path.display()
        )
    })
}

/// Credential metadata safe to print; never includes tokens.
fn summary(credential: &Credential) -> Value {
    json!({
        "status": "ok",
        "token_type": credential.token_type,
        "expiry": credential.expiry,
        "scopes": credential.scopes,
        "last_refreshed": credential.last_refreshed,
    })
}
