//! HTTP client initialization.

use std::time::Duration;

use reqwest::ClientBuilder;

use crate::config::DOWNLOAD_TIMEOUT;

/// Connection establishment budget, well below the per-request timeouts.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the client shared by version checks and downloads.
///
/// The client-wide timeout is the download budget; version checks set their
/// own shorter timeout per request.
///
/// # Errors
///
/// Returns a `reqwest::Error` if client creation fails.
pub fn init_client() -> Result<reqwest::Client, reqwest::Error> {
    ClientBuilder::new()
        .timeout(DOWNLOAD_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}
