//! Configuration types.
//!
//! This module defines the library configuration and the logging enums used
//! by the command-line front end.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::config::constants::{
    DEFAULT_DB_DIR, DEFAULT_RATE_LIMIT_BURST, DEFAULT_STORE_PATH, DEFAULT_UPDATE_INTERVAL,
    DEFAULT_URL_TEMPLATE,
};
use crate::geoip::{ResourceDescriptor, ResourceKind};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Library configuration (no CLI dependencies).
///
/// # Examples
///
/// ```no_run
/// use ip_service::Config;
/// use std::path::PathBuf;
///
/// let config = Config {
///     license_key: "my-license-key".to_string(),
///     db_dir: PathBuf::from("/var/lib/ip_service"),
///     ..Default::default()
/// };
/// assert_eq!(config.descriptors().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// MaxMind license key interpolated into download URLs
    pub license_key: String,

    /// Directory the `.mmdb` files are installed into
    pub db_dir: PathBuf,

    /// Directory for temporary archives (defaults to `db_dir`)
    pub staging_dir: Option<PathBuf>,

    /// Remote URL template with `{edition}` and `{license_key}` placeholders
    pub url_template: String,

    /// Interval between remote version checks
    pub update_interval: Duration,

    /// Run periodic version checks at all
    pub automatic_update: bool,

    /// Downloads allowed per database kind per 24h (0 disables the limit)
    pub rate_limit_burst: u32,

    /// Path of the JSON version store
    pub store_path: PathBuf,

    /// Log level
    pub log_level: LogLevel,

    /// Log format
    pub log_format: LogFormat,

    /// HTTP status server port (optional, disabled by default)
    pub status_port: Option<u16>,
}

impl Config {
    /// Directory used for temporary archives.
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| self.db_dir.clone())
    }

    /// Builds the immutable per-kind descriptors for every managed database.
    pub fn descriptors(&self) -> Vec<ResourceDescriptor> {
        ResourceKind::ALL
            .iter()
            .map(|&kind| ResourceDescriptor {
                kind,
                file_path: self.db_dir.join(kind.file_name()),
                url_template: self.url_template.replace("{edition}", kind.edition()),
                refresh_interval: self.update_interval,
                rate_limit_burst: self.rate_limit_burst,
            })
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            license_key: String::new(),
            db_dir: PathBuf::from(DEFAULT_DB_DIR),
            staging_dir: None,
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            update_interval: DEFAULT_UPDATE_INTERVAL,
            automatic_update: true,
            rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
            status_port: None,
        }
    }
}
