//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `ip_service` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - Signal handling and orderly shutdown
//!
//! All core functionality is implemented in the library crate.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use ip_service::config::{
    DEFAULT_DB_DIR, DEFAULT_RATE_LIMIT_BURST, DEFAULT_STORE_PATH, DEFAULT_URL_TEMPLATE,
    MAXMIND_LICENSE_KEY_ENV,
};
use ip_service::initialization::init_logger_with;
use ip_service::status_server::{start_status_server, StatusState};
use ip_service::{Config, FileVersionStore, GeoManager, LogFormat, LogLevel, MaxMindFactory};

/// Command-line options.
///
/// # Examples
///
/// ```bash
/// # License key from the environment (or .env)
/// MAXMIND_LICENSE_KEY=... ip_service --status-port 8080
///
/// # Check every 6 hours, never more than 2 downloads per day
/// ip_service --update-interval-secs 21600 --rate-limit-burst 2
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "ip_service",
    about = "Serves IP geolocation lookups from locally cached MaxMind databases."
)]
struct Opt {
    /// MaxMind license key
    #[arg(long, env = MAXMIND_LICENSE_KEY_ENV, hide_env_values = true)]
    license_key: String,

    /// Directory holding the .mmdb files
    #[arg(long, value_parser, default_value = DEFAULT_DB_DIR)]
    db_dir: PathBuf,

    /// Directory for temporary archives (defaults to --db-dir)
    #[arg(long, value_parser)]
    staging_dir: Option<PathBuf>,

    /// Download URL with {edition} and {license_key} placeholders
    #[arg(long, default_value = DEFAULT_URL_TEMPLATE)]
    url_template: String,

    /// Seconds between remote version checks
    #[arg(long, default_value_t = 3600)]
    update_interval_secs: u64,

    /// Disable periodic version checks (missing files are still downloaded at startup)
    #[arg(long)]
    no_automatic_update: bool,

    /// Downloads allowed per database per 24 hours (0 disables limiting)
    #[arg(long, default_value_t = DEFAULT_RATE_LIMIT_BURST)]
    rate_limit_burst: u32,

    /// JSON file recording remote versions and check times
    #[arg(long, value_parser, default_value = DEFAULT_STORE_PATH)]
    store_path: PathBuf,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,

    /// Port for the HTTP status and lookup server (disabled when unset)
    #[arg(long)]
    status_port: Option<u16>,
}

impl From<Opt> for Config {
    fn from(opt: Opt) -> Self {
        Config {
            license_key: opt.license_key,
            db_dir: opt.db_dir,
            staging_dir: opt.staging_dir,
            url_template: opt.url_template,
            update_interval: Duration::from_secs(opt.update_interval_secs),
            automatic_update: !opt.no_automatic_update,
            rate_limit_burst: opt.rate_limit_burst,
            store_path: opt.store_path,
            log_level: opt.log_level,
            log_format: opt.log_format,
            status_port: opt.status_port,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    // This allows setting MAXMIND_LICENSE_KEY in .env without exporting it manually
    if dotenvy::dotenv().is_err() {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let env_path = exe_dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                }
            }
        }
    }

    let config = Config::from(Opt::parse());

    init_logger_with(config.log_level.clone().into(), config.log_format.clone())
        .context("Failed to initialize logger")?;

    if let Err(e) = run(config).await {
        eprintln!("ip_service error: {:#}", e);
        process::exit(1);
    }
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let store = FileVersionStore::open(&config.store_path)
        .with_context(|| format!("Failed to open version store {}", config.store_path.display()))?;

    let manager = Arc::new(
        GeoManager::new(&config, Arc::new(store), Arc::new(MaxMindFactory))
            .await
            .context("Failed to start GeoIP manager")?,
    );

    let shutdown = CancellationToken::new();
    let server = config.status_port.map(|port| {
        let state = StatusState {
            manager: Arc::clone(&manager),
        };
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = start_status_server(port, state, shutdown).await {
                log::error!("{:#}", e);
            }
        })
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    log::info!("Shutdown signal received");

    shutdown.cancel();
    if let Some(server) = server {
        if let Err(e) = server.await {
            log::warn!("Status server task failed: {}", e);
        }
    }
    manager.close().await.context("Failed to close GeoIP manager")?;

    Ok(())
}
