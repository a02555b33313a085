//! GeoIP data structures.
//!
//! This module defines the managed database kinds, their immutable
//! descriptors, and the records returned by lookups.

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One of the managed databases.
///
/// The set is fixed at compile time; kinds are never added or removed at
/// runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// City-level geolocation (GeoLite2-City)
    City,
    /// Autonomous system data (GeoLite2-ASN)
    Asn,
}

impl ResourceKind {
    /// Every managed kind, in startup order.
    pub const ALL: [ResourceKind; 2] = [ResourceKind::City, ResourceKind::Asn];

    /// Short lowercase name used in logs, store keys and health messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::City => "city",
            ResourceKind::Asn => "asn",
        }
    }

    /// MaxMind edition id.
    pub fn edition(&self) -> &'static str {
        match self {
            ResourceKind::City => "GeoLite2-City",
            ResourceKind::Asn => "GeoLite2-ASN",
        }
    }

    /// Basename of the database file, both on disk and inside the archive.
    pub fn file_name(&self) -> String {
        format!("{}.mmdb", self.edition())
    }

    /// Name of the temporary archive used while downloading this kind.
    pub fn archive_name(&self) -> String {
        format!("geoip_database_{}.tar.gz", self.as_str())
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable per-kind configuration, created once at manager construction.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    /// Kind this descriptor belongs to
    pub kind: ResourceKind,
    /// Where the installed database lives
    pub file_path: PathBuf,
    /// Remote URL with a `{license_key}` placeholder
    pub url_template: String,
    /// Minimum time between two remote version checks
    pub refresh_interval: Duration,
    /// Downloads allowed per 24h (0 disables the limit)
    pub rate_limit_burst: u32,
}

impl ResourceDescriptor {
    /// Basename the downloader looks for inside the archive.
    pub fn archive_entry(&self) -> String {
        self.kind.file_name()
    }
}

/// Result of a city lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CityRecord {
    pub city: Option<String>,
    pub country: Option<String>,
    pub country_iso: Option<String>,
    pub continent: Option<String>,
    pub is_eu: bool,
    pub region: Option<String>,
    pub region_code: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
}

/// Result of an ASN lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AsnRecord {
    pub asn: Option<u32>,
    pub organization: Option<String>,
}

/// City and ASN data merged into one reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IpInformation {
    pub ip: String,
    pub ip_decimal: String,
    pub asn: Option<u32>,
    pub asn_organization: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub country_iso: Option<String>,
    pub is_eu: bool,
    pub region: Option<String>,
    pub region_code: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub continent: Option<String>,
}

impl IpInformation {
    /// Combines the two records. ASN data is optional.
    pub fn new(ip: IpAddr, city: CityRecord, asn: Option<AsnRecord>) -> Self {
        let asn = asn.unwrap_or_default();
        Self {
            ip: ip.to_string(),
            ip_decimal: ip_to_decimal(ip),
            asn: asn.asn,
            asn_organization: asn.organization,
            city: city.city,
            country: city.country,
            country_iso: city.country_iso,
            is_eu: city.is_eu,
            region: city.region,
            region_code: city.region_code,
            postal_code: city.postal_code,
            latitude: city.latitude,
            longitude: city.longitude,
            timezone: city.timezone,
            continent: city.continent,
        }
    }
}

/// Decimal representation of an address (`8.8.8.8` -> `134744072`).
pub fn ip_to_decimal(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => u32::from(v4).to_string(),
        IpAddr::V6(v6) => u128::from(v6).to_string(),
    }
}
