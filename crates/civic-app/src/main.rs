//! Civic assistant binary - composition root.
//!
//! 1. Parse the CLI and load configuration from TOML
//! 2. Open the document store (in-memory or SQLite)
//! 3. Answer one query (`ask`), write a config file (`init`) or start the
//!    axum API (`serve`)

mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter};

use civic_api::{routes, AppState};
use civic_core::config::StorageBackend;
use civic_core::{CivicError, DepartmentContext, PortalConfig};
use civic_intent::IntentRouter;
use civic_storage::{DocumentStore, MemoryStore, SqliteStore};

use cli::{CliArgs, Command};

fn open_store(
    config: &PortalConfig,
    sqlite_override: Option<PathBuf>,
) -> Result<Arc<dyn DocumentStore>, Box<dyn std::error::Error>> {
    let sqlite_path = match (sqlite_override, config.storage.backend) {
        (Some(path), _) => Some(path),
        (None, StorageBackend::Sqlite) => Some(PathBuf::from(&config.storage.sqlite_path)),
        (None, StorageBackend::Memory) => None,
    };
    match sqlite_path {
        Some(path) => {
            let store = SqliteStore::open(&path)?;
            tracing::info!(path = %path.display(), "SQLite document store opened");
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("In-memory document store ready");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Write the default configuration to `path`.
///
/// Returns `false` without touching an existing file unless `force` is set.
fn write_default_config(path: &Path, force: bool) -> Result<bool, CivicError> {
    if path.exists() && !force {
        return Ok(false);
    }
    PortalConfig::default().save(path)?;
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Tracing. The filter is swapped for the config file's level once the
    // config is loaded, unless --log-level or RUST_LOG pinned it.
    let log_override = args.log_override();
    let initial = log_override.as_deref().unwrap_or("info");
    let (filter, filter_handle) = reload::Layer::new(
        EnvFilter::try_new(initial).unwrap_or_else(|_| EnvFilter::new("info")),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting civic assistant v{}", env!("CARGO_PKG_VERSION"));

    let config_file = args.resolve_config_path();

    if let Command::Init { force } = args.command() {
        if write_default_config(&config_file, force)? {
            println!("Wrote default configuration to {}", config_file.display());
        } else {
            println!(
                "{} already exists; pass --force to overwrite",
                config_file.display()
            );
        }
        return Ok(());
    }

    let mut config = PortalConfig::load_or_default(&config_file);
    if log_override.is_none() {
        match EnvFilter::try_new(&config.general.log_level) {
            Ok(level) => {
                if let Err(e) = filter_handle.reload(level) {
                    tracing::warn!(error = %e, "Failed to apply configured log level");
                }
            }
            Err(e) => tracing::warn!(
                level = %config.general.log_level,
                error = %e,
                "Ignoring invalid configured log level"
            ),
        }
    }
    config.server.port = args.resolve_port(config.server.port);
    config.validate()?;

    match args.command() {
        Command::Ask { query, department } => {
            let router = IntentRouter::from_config(&config);
            let context = DepartmentContext::parse_lenient(&department);
            let response = router.route(&query, context);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Serve => {
            let store = open_store(&config, args.sqlite.clone())?;
            let state = AppState::new(config.clone(), store);
            if let Err(e) = routes::start_server(&config, state).await {
                tracing::error!(error = %e, "API server stopped");
                return Err(e.into());
            }
        }
        // Handled before the config was loaded.
        Command::Init { .. } => {}
    }

    Ok(())
}
