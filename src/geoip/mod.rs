//! GeoIP database lifecycle management.
//!
//! Two MaxMind GeoLite2 databases (City and ASN) are kept on disk, opened into
//! memory and refreshed in the background:
//!
//! - [`GeoManager`] is the entry point: lookups, health, manual triggers, close
//! - a single worker sequences check, download and reload stages per kind
//! - [`ReaderGuard`] hot-swaps the active reader without blocking lookups
//! - [`RefreshLimiter`] caps downloads per kind per 24 hours
//! - [`HealthProbeCache`] serves a cached health probe
//! - [`VersionStore`] persists remote version tags and check times

mod download;
mod extract;
mod guard;
mod health;
mod manager;
mod pipeline;
mod rate_limiter;
mod reader;
#[cfg(test)]
mod testing;
mod types;
mod version_store;

// Re-export public API
pub use download::{Downloader, Installed};
pub use guard::ReaderGuard;
pub use health::{HealthProbe, HealthProbeCache, StatusReply};
pub use manager::GeoManager;
pub use rate_limiter::RefreshLimiter;
pub use reader::{GeoReader, MaxMindFactory, MaxMindReader, ReaderFactory};
pub use types::{
    ip_to_decimal, AsnRecord, CityRecord, IpInformation, ResourceDescriptor, ResourceKind,
};
pub use version_store::{FileVersionStore, MemoryVersionStore, VersionRecord, VersionStore};
