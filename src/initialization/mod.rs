//! Process-level setup shared by the binary and the manager.
//!
//! - Logger (`env_logger` with plain or JSON output)
//! - HTTP client used for version checks and downloads

mod client;
mod logger;

// Re-export public API
pub use client::init_client;
pub use logger::init_logger_with;
