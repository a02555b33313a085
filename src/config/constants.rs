//! Configuration constants.
//!
//! This module defines the constants used by the database lifecycle manager,
//! including timeouts, size limits, and the MaxMind endpoint layout.

use std::time::Duration;

/// Environment variable name for the MaxMind license key
pub const MAXMIND_LICENSE_KEY_ENV: &str = "MAXMIND_LICENSE_KEY";

/// Default remote URL template.
///
/// `{edition}` is replaced per database kind when descriptors are built,
/// `{license_key}` is replaced (URL-encoded) right before each request.
pub const DEFAULT_URL_TEMPLATE: &str = "https://download.maxmind.com/app/geoip_download?edition_id={edition}&license_key={license_key}&suffix=tar.gz";

/// Default directory holding the installed `.mmdb` files
pub const DEFAULT_DB_DIR: &str = "db";

/// Default path of the JSON version store
pub const DEFAULT_STORE_PATH: &str = "store/versions.json";

// Network operation timeouts
/// Total transfer time allowed for one archive download (GET)
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
/// Timeout for the lightweight remote version check (HEAD)
pub const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(15);

// Size limits
/// Maximum archive size in bytes (200MB).
/// GeoLite2-City archives are around 35MB compressed.
pub const MAX_ARCHIVE_DOWNLOAD_SIZE: u64 = 200 * 1024 * 1024;
/// Maximum size of the extracted database file in bytes (256MB)
pub const MAX_DATABASE_FILE_SIZE: u64 = 256 * 1024 * 1024;

// Refresh scheduling
/// Default interval between remote version checks (1 hour)
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// Rolling window the refresh budget applies to
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
/// Default number of downloads allowed per kind within `RATE_LIMIT_WINDOW`
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 4;

// Health probing
/// How long a computed health probe is served from cache
pub const HEALTH_PROBE_TTL: Duration = Duration::from_secs(10);
/// Probe name reported in health records
pub const HEALTH_PROBE_NAME: &str = "maxmind";
/// Known-good addresses used for live verification lookups
pub const HEALTH_PROBE_IPS: [&str; 3] = ["95.142.107.181", "110.50.243.6", "69.162.81.155"];

/// Service name used in aggregated status replies
pub const SERVICE_NAME: &str = "ip_service";
