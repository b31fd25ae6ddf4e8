//! # folio
//!
//! Command line front end for the Folio sync engine.
//!
//! ## Command Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Parse args (clap)                                                   │
//! │  2. Load sync.toml + FOLIO_* overrides                                 │
//! │     (`config show` / `config init` stop here)                          │
//! │  3. Open the SQLite store (migrations run on open)                     │
//! │  4. Build the SyncEngine, probe connectivity once                      │
//! │  5. Run the command, print JSON to stdout                              │
//! │                                                                         │
//! │  Logs go to stderr; RUST_LOG overrides the default filter.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod cli;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use folio_core::ExportBundle;
use folio_db::{Database, DbConfig};
use folio_sync::{SyncConfig, SyncEngine};

use crate::cli::{Cli, Command, ConfigAction};

const DEFAULT_LOG_FILTER: &str = "info,folio=debug,sqlx=warn";

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// `folio config show` / `folio config init`: no store, no network.
fn run_config(config: &SyncConfig, path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    let path = path.or_else(SyncConfig::default_config_path);

    match action {
        ConfigAction::Show => {
            if let Some(path) = &path {
                println!("# {}", path.display());
            }
            print!("{}", toml::to_string_pretty(config)?);
        }

        ConfigAction::Init { force } => {
            let path = path
                .ok_or_else(|| anyhow!("No config path given and no config directory available"))?;
            if path.exists() && !force {
                return Err(anyhow!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                ));
            }
            config
                .save(Some(path.clone()))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_json(&serde_json::json!({ "path": path.display().to_string() }))?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open_database(config: &SyncConfig) -> Result<Arc<Database>> {
    let path = config
        .database_path()
        .ok_or_else(|| anyhow!("No database path configured and no data directory available"))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let db = Database::new(DbConfig::new(path.clone()))
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    Ok(Arc::new(db))
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();

    let config = SyncConfig::load(cli.config.clone()).context("Failed to load sync config")?;
    info!(mode = %config.mode(), server = %config.remote.base_url, "Configuration loaded");

    if let Command::Config { action } = cli.command {
        return run_config(&config, cli.config, action);
    }

    let db = open_database(&config).await?;
    let mut engine = SyncEngine::new(config, db.clone()).await?;

    if !matches!(cli.command, Command::Run) {
        let online = engine.check_connectivity().await;
        if !online {
            warn!("Remote server unreachable, running offline");
        }
    }

    match cli.command {
        Command::Status => print_json(&engine.status().await?)?,

        Command::Sync => print_json(&engine.sync_now().await?)?,

        Command::Upload { ids } => {
            let report = if ids.is_empty() {
                engine.upload_pending().await?
            } else {
                engine.upload(&ids).await?
            };
            print_json(&report)?;
        }

        Command::Download => print_json(&engine.download().await?)?,

        Command::Drain => {
            engine.restore_queue().await?;
            print_json(&engine.drain_until_settled().await?)?;
        }

        Command::Failures => print_json(&engine.sync_failures().await?)?,

        Command::Login { email, password } => {
            let credential = engine.login(&email, &password).await?;
            print_json(&serde_json::json!({
                "authenticated": true,
                "user": credential.user,
            }))?;
        }

        Command::Logout => {
            engine.logout().await?;
            print_json(&serde_json::json!({ "authenticated": false }))?;
        }

        Command::Export { output } => {
            let bundle = engine.export_data().await?;
            match output {
                Some(path) => {
                    let body = serde_json::to_vec_pretty(&bundle)?;
                    tokio::fs::write(&path, body)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    print_json(&serde_json::json!({
                        "path": path.display().to_string(),
                        "documents": bundle.local.documents.len(),
                        "server": bundle.server.is_some(),
                    }))?;
                }
                None => print_json(&bundle)?,
            }
        }

        Command::Import { file } => {
            let body = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let bundle: ExportBundle =
                serde_json::from_slice(&body).context("Not a folio backup bundle")?;
            print_json(&engine.import_data(&bundle).await?)?;
        }

        Command::Retry { id } => {
            let queued = engine.retry_failed(id).await?;
            print_json(&serde_json::json!({ "id": id, "queued": queued }))?;
        }

        Command::Config { .. } => unreachable!("handled before the store is opened"),

        Command::Run => {
            engine.start().await?;
            info!("Sync engine running, press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            engine.stop().await;
            print_json(&engine.status().await?)?;
        }
    }

    db.close().await;
    Ok(())
}
