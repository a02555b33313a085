//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (timeouts, limits, default URLs)
//! - The library `Config` and the logging option enums

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{Config, LogFormat, LogLevel};
