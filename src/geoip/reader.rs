//! Database readers.
//!
//! A reader is an immutable, fully loaded database. Readers are produced by a
//! [`ReaderFactory`] and swapped into a [`ReaderGuard`](super::ReaderGuard);
//! they are never mutated after construction.

use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use maxminddb::{geoip2, Reader};

use super::types::{AsnRecord, CityRecord, ResourceKind};
use crate::error_handling::{LookupError, OpenError};

/// Point lookups against one opened database.
pub trait GeoReader: Send + Sync {
    /// City/country/coordinates/timezone for `ip`.
    fn city(&self, ip: IpAddr) -> Result<CityRecord, LookupError>;

    /// Autonomous system for `ip`.
    fn asn(&self, ip: IpAddr) -> Result<AsnRecord, LookupError>;

    /// Build identifier reported by the database itself, if any.
    fn build_version(&self) -> Option<String> {
        None
    }
}

/// Opens a database file as a queryable reader.
///
/// Implementations must report a missing file as [`OpenError::NotFound`] so
/// the caller can tell "never downloaded" apart from "corrupt".
pub trait ReaderFactory: Send + Sync {
    fn open(&self, path: &Path) -> Result<Arc<dyn GeoReader>, OpenError>;
}

/// Production factory backed by MaxMind `.mmdb` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaxMindFactory;

impl ReaderFactory for MaxMindFactory {
    fn open(&self, path: &Path) -> Result<Arc<dyn GeoReader>, OpenError> {
        log::debug!("Opening GeoIP database {}", path.display());

        // Read into memory so a later file replacement cannot affect this reader
        let db_bytes = std::fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => OpenError::NotFound(path.to_path_buf()),
            _ => OpenError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let reader = Reader::from_source(db_bytes).map_err(|e| OpenError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Arc::new(MaxMindReader { reader }))
    }
}

/// An opened MaxMind database.
pub struct MaxMindReader {
    reader: Reader<Vec<u8>>,
}

impl GeoReader for MaxMindReader {
    fn city(&self, ip: IpAddr) -> Result<CityRecord, LookupError> {
        // maxminddb 0.27: lookup() yields a LookupResult, decode() the record
        let city_lookup = self
            .reader
            .lookup(ip)
            .map_err(|e| LookupError::Database(e.to_string()))?;
        if !city_lookup.has_data() {
            return Err(LookupError::NotFound {
                kind: ResourceKind::City,
                ip,
            });
        }
        let city_result: geoip2::City = city_lookup
            .decode()
            .map_err(|e| LookupError::Database(e.to_string()))?
            .ok_or(LookupError::NotFound {
                kind: ResourceKind::City,
                ip,
            })?;

        let subdivision = city_result.subdivisions.first();
        Ok(CityRecord {
            city: city_result.city.names.english.map(|s| s.to_string()),
            country: city_result.country.names.english.map(|s| s.to_string()),
            country_iso: city_result.country.iso_code.map(|s| s.to_string()),
            continent: city_result.continent.names.english.map(|s| s.to_string()),
            is_eu: city_result.country.is_in_european_union.unwrap_or(false),
            region: subdivision.and_then(|s| s.names.english.map(|n| n.to_string())),
            region_code: subdivision.and_then(|s| s.iso_code.map(|c| c.to_string())),
            postal_code: city_result.postal.code.map(|s| s.to_string()),
            latitude: city_result.location.latitude,
            longitude: city_result.location.longitude,
            timezone: city_result.location.time_zone.map(|s| s.to_string()),
        })
    }

    fn asn(&self, ip: IpAddr) -> Result<AsnRecord, LookupError> {
        let asn_lookup = self
            .reader
            .lookup(ip)
            .map_err(|e| LookupError::Database(e.to_string()))?;
        if !asn_lookup.has_data() {
            return Err(LookupError::NotFound {
                kind: ResourceKind::Asn,
                ip,
            });
        }
        let asn_result: geoip2::Asn = asn_lookup
            .decode()
            .map_err(|e| LookupError::Database(e.to_string()))?
            .ok_or(LookupError::NotFound {
                kind: ResourceKind::Asn,
                ip,
            })?;

        Ok(AsnRecord {
            asn: asn_result.autonomous_system_number,
            organization: asn_result
                .autonomous_system_organization
                .map(|s| s.to_string()),
        })
    }

    fn build_version(&self) -> Option<String> {
        Some(format!("build_{}", self.reader.metadata.build_epoch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_file_is_not_found() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("GeoLite2-City.mmdb");

        let err = MaxMindFactory
            .open(&path)
            .err()
            .expect("missing file must fail");
        assert!(err.is_not_found(), "got: {}", err);
    }

    #[test]
    fn test_open_invalid_database_is_corrupt() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("GeoLite2-City.mmdb");
        std::fs::write(&path, b"not a valid mmdb file").expect("Failed to write test data");

        let err = MaxMindFactory
            .open(&path)
            .err()
            .expect("invalid file must fail");
        assert!(
            matches!(err, OpenError::Corrupt { .. }),
            "Expected corrupt error, got: {}",
            err
        );
    }

    #[test]
    fn test_open_directory_is_not_reported_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        let err = MaxMindFactory
            .open(temp_dir.path())
            .err()
            .expect("directory must fail");
        assert!(!err.is_not_found(), "got: {}", err);
    }
}
