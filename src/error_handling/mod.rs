//! Error handling.
//!
//! Error types are grouped by the stage that produces them:
//! - **Open**: a database file could not be turned into a reader
//! - **Lookup**: a query against an active reader failed
//! - **Download**: fetching, validating or extracting a remote archive failed
//! - **Store**: the version store could not be read or written
//! - **Manager**: construction or shutdown of the lifecycle manager failed
//!
//! Only `ManagerError` ever reaches the manager's caller. Everything raised
//! inside the refresh pipeline is logged and retried on the next tick.

mod types;

// Re-export public API
pub use types::{
    DownloadError, InitializationError, LookupError, ManagerError, OpenError, StoreError,
};
