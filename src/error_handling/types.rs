//! Error type definitions.

use std::net::IpAddr;
use std::path::PathBuf;

use log::SetLoggerError;
use reqwest::StatusCode;
use thiserror::Error;

use crate::geoip::ResourceKind;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),
}

/// Failure to open a database file as a queryable reader.
///
/// `NotFound` is kept apart from the other variants: a missing file at
/// startup routes to a download, anything else is fatal.
#[derive(Error, Debug)]
pub enum OpenError {
    /// The file does not exist.
    #[error("missing database file: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but is not a valid database.
    #[error("corrupt database file {}: {reason}", path.display())]
    Corrupt {
        /// Path that failed to parse
        path: PathBuf,
        /// Parser error text
        reason: String,
    },

    /// The file exists but could not be read (permissions, I/O).
    #[error("failed to read database file {}: {source}", path.display())]
    Io {
        /// Path that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl OpenError {
    /// Returns `true` when the file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, OpenError::NotFound(_))
    }
}

/// Failure of a point lookup.
#[derive(Error, Debug)]
pub enum LookupError {
    /// The input was not an IP address.
    #[error("invalid IP address: {0}")]
    InvalidIp(String),

    /// No reader has been installed for this kind yet.
    #[error("{0} database is not loaded")]
    NotLoaded(ResourceKind),

    /// The address is not present in the database.
    #[error("no {kind} data for {ip}")]
    NotFound {
        /// Database that was queried
        kind: ResourceKind,
        /// Address that was looked up
        ip: IpAddr,
    },

    /// The reader failed to decode the record.
    #[error("database lookup failed: {0}")]
    Database(String),
}

/// Failure while checking, fetching or installing a remote database.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Connection, timeout or body transfer failure.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered HTTP 429.
    #[error("rate limited by provider (HTTP 429)")]
    ProviderRateLimited,

    /// Any other non-success status.
    #[error("unexpected HTTP status: {0}")]
    Status(StatusCode),

    /// Archive or extracted file exceeded its size limit.
    #[error("{what} too large: {size} bytes (max: {max} bytes)")]
    TooLarge {
        /// Which payload overflowed
        what: &'static str,
        /// Bytes seen so far
        size: u64,
        /// Configured limit
        max: u64,
    },

    /// The archive held no regular file with the expected name.
    #[error("{0} not found in archive")]
    EntryMissing(String),

    /// Reading the archive or writing the database failed.
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reading or writing the version store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// File I/O error.
    #[error("version store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store document could not be (de)serialized.
    #[error("version store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by the lifecycle manager itself.
#[derive(Error, Debug)]
pub enum ManagerError {
    /// A database file exists but could not be opened at startup.
    #[error("initial load of {kind} database failed: {source}")]
    InitialLoad {
        /// Kind that failed to load
        kind: ResourceKind,
        /// Why it failed
        #[source]
        source: OpenError,
    },

    /// A working directory could not be created.
    #[error("failed to prepare {}: {source}", path.display())]
    Io {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be built.
    #[error("HTTP client initialization error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The pipeline worker panicked or was aborted.
    #[error("pipeline worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_not_found_is_distinguishable() {
        let missing = OpenError::NotFound(PathBuf::from("db/GeoLite2-ASN.mmdb"));
        assert!(missing.is_not_found());
        assert!(missing.to_string().contains("GeoLite2-ASN.mmdb"));

        let corrupt = OpenError::Corrupt {
            path: PathBuf::from("db/GeoLite2-ASN.mmdb"),
            reason: "bad metadata".to_string(),
        };
        assert!(!corrupt.is_not_found());
        assert!(corrupt.to_string().contains("bad metadata"));
    }

    #[test]
    fn test_manager_error_names_kind() {
        let err = ManagerError::InitialLoad {
            kind: ResourceKind::City,
            source: OpenError::Corrupt {
                path: PathBuf::from("db/GeoLite2-City.mmdb"),
                reason: "truncated".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("city"), "got: {}", msg);
        assert!(msg.contains("truncated"), "got: {}", msg);
    }

    #[test]
    fn test_download_error_messages() {
        assert!(DownloadError::ProviderRateLimited
            .to_string()
            .contains("429"));
        assert!(DownloadError::Status(StatusCode::NOT_FOUND)
            .to_string()
            .contains("404"));
        let too_large = DownloadError::TooLarge {
            what: "archive",
            size: 11,
            max: 10,
        };
        assert!(too_large.to_string().contains("archive too large"));
    }
}
