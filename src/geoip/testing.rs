//! Test doubles for the reader seam.
//!
//! Database files used in tests are tiny text files:
//! `city:<name>` or `asn:<number>:<organization>`. Anything else is corrupt.

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use super::reader::{GeoReader, ReaderFactory};
use super::types::{AsnRecord, CityRecord, ResourceKind};
use crate::error_handling::{LookupError, OpenError};

pub(crate) struct FakeReader {
    pub city: Option<String>,
    pub asn: Option<(u32, String)>,
    pub fail: bool,
}

impl FakeReader {
    pub fn city(name: &str) -> Arc<dyn GeoReader> {
        Arc::new(FakeReader {
            city: Some(name.to_string()),
            asn: None,
            fail: false,
        })
    }

    pub fn asn(number: u32, org: &str) -> Arc<dyn GeoReader> {
        Arc::new(FakeReader {
            city: None,
            asn: Some((number, org.to_string())),
            fail: false,
        })
    }

    pub fn failing() -> Arc<dyn GeoReader> {
        Arc::new(FakeReader {
            city: None,
            asn: None,
            fail: true,
        })
    }
}

impl GeoReader for FakeReader {
    fn city(&self, ip: IpAddr) -> Result<CityRecord, LookupError> {
        if self.fail {
            return Err(LookupError::Database("decoding failed".to_string()));
        }
        match &self.city {
            Some(name) => Ok(CityRecord {
                city: Some(name.clone()),
                ..Default::default()
            }),
            None => Err(LookupError::NotFound {
                kind: ResourceKind::City,
                ip,
            }),
        }
    }

    fn asn(&self, ip: IpAddr) -> Result<AsnRecord, LookupError> {
        if self.fail {
            return Err(LookupError::Database("decoding failed".to_string()));
        }
        match &self.asn {
            Some((number, org)) => Ok(AsnRecord {
                asn: Some(*number),
                organization: Some(org.clone()),
            }),
            None => Err(LookupError::NotFound {
                kind: ResourceKind::Asn,
                ip,
            }),
        }
    }

    fn build_version(&self) -> Option<String> {
        Some("build_test".to_string())
    }
}

#[derive(Default)]
pub(crate) struct FakeFactory;

impl ReaderFactory for FakeFactory {
    fn open(&self, path: &Path) -> Result<Arc<dyn GeoReader>, OpenError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => OpenError::NotFound(path.to_path_buf()),
            _ => OpenError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        parse_fake_database(content.trim()).ok_or_else(|| OpenError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("unrecognised content {:?}", content),
        })
    }
}

fn parse_fake_database(content: &str) -> Option<Arc<dyn GeoReader>> {
    let mut parts = content.splitn(3, ':');
    match (parts.next()?, parts.next(), parts.next()) {
        ("city", Some(name), None) => Some(FakeReader::city(name)),
        ("asn", Some(number), Some(org)) => Some(FakeReader::asn(number.parse().ok()?, org)),
        _ => None,
    }
}
