//! ip_service library: locally cached GeoIP lookups with background refresh
//!
//! The library owns two MaxMind GeoLite2 databases (City and ASN), answers
//! lookups against them, and keeps them fresh from the MaxMind download
//! service without interrupting concurrent lookups.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ip_service::{Config, FileVersionStore, GeoManager, MaxMindFactory};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     license_key: std::env::var("MAXMIND_LICENSE_KEY")?,
//!     ..Default::default()
//! };
//!
//! let store = Arc::new(FileVersionStore::open(&config.store_path)?);
//! let manager = GeoManager::new(&config, store, Arc::new(MaxMindFactory)).await?;
//!
//! let city = manager.lookup_city("95.142.107.181")?;
//! println!("{:?} ({:?})", city.city, city.country_iso);
//!
//! manager.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. The manager spawns its refresh
//! worker on the runtime it is constructed in.

pub mod config;
mod error_handling;
mod geoip;
pub mod initialization;
pub mod status_server;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel};
pub use error_handling::{
    DownloadError, InitializationError, LookupError, ManagerError, OpenError, StoreError,
};
pub use geoip::{
    ip_to_decimal, AsnRecord, CityRecord, Downloader, FileVersionStore, GeoManager, GeoReader,
    HealthProbe, HealthProbeCache, Installed, IpInformation, MaxMindFactory, MaxMindReader,
    MemoryVersionStore, ReaderFactory, ReaderGuard, RefreshLimiter, ResourceDescriptor,
    ResourceKind, StatusReply, VersionRecord, VersionStore,
};
