//! Remote version checks and archive downloads.

use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use reqwest::header::LAST_MODIFIED;
use reqwest::{Response, StatusCode};
use tokio::io::AsyncWriteExt;
use url::form_urlencoded;

use super::extract::extract_database;
use super::types::ResourceDescriptor;
use crate::config::{
    DOWNLOAD_TIMEOUT, MAX_ARCHIVE_DOWNLOAD_SIZE, MAX_DATABASE_FILE_SIZE, VERSION_CHECK_TIMEOUT,
};
use crate::error_handling::DownloadError;

/// Outcome of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    /// Size of the installed database file
    pub bytes: u64,
    /// Version tag read from the GET response, when present
    pub version: Option<String>,
}

/// Turns a descriptor into an installed local file.
pub struct Downloader {
    client: reqwest::Client,
    license_key: String,
    staging_dir: PathBuf,
}

impl Downloader {
    pub fn new(client: reqwest::Client, license_key: String, staging_dir: PathBuf) -> Self {
        Self {
            client,
            license_key,
            staging_dir,
        }
    }

    /// Interpolates the URL-encoded license key into the descriptor's template.
    pub(crate) fn url_for(&self, descriptor: &ResourceDescriptor) -> String {
        // Special characters in license keys would otherwise break the query string
        let encoded_key =
            form_urlencoded::byte_serialize(self.license_key.as_bytes()).collect::<String>();
        descriptor.url_template.replace("{license_key}", &encoded_key)
    }

    /// Reads the remote `Last-Modified` tag with a HEAD request.
    ///
    /// Returns `Ok(None)` when the header is missing or unparsable, which the
    /// caller must treat as "stale".
    pub async fn remote_version(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<Option<String>, DownloadError> {
        let response = self
            .client
            .head(self.url_for(descriptor))
            .timeout(VERSION_CHECK_TIMEOUT)
            .send()
            .await?;
        let response = check_status(response)?;

        let tag = version_tag(&response);
        if tag.is_none() {
            log::warn!(
                "{} version check: missing or unparsable Last-Modified header",
                descriptor.kind
            );
        }
        Ok(tag)
    }

    /// Downloads, extracts and installs the database for `descriptor`.
    ///
    /// The temporary archive is removed whether or not the install succeeds.
    pub async fn fetch(&self, descriptor: &ResourceDescriptor) -> Result<Installed, DownloadError> {
        let archive_path = self.staging_dir.join(descriptor.kind.archive_name());

        let result = self.fetch_into(descriptor, &archive_path).await;

        log::debug!("Cleaning up {} archive", descriptor.kind);
        if let Err(e) = tokio::fs::remove_file(&archive_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!(
                    "Failed to remove temporary archive {}: {}",
                    archive_path.display(),
                    e
                );
            }
        }

        result
    }

    async fn fetch_into(
        &self,
        descriptor: &ResourceDescriptor,
        archive_path: &Path,
    ) -> Result<Installed, DownloadError> {
        log::info!("Downloading {} database ({})", descriptor.kind, descriptor.kind.edition());

        let response = self
            .client
            .get(self.url_for(descriptor))
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;
        let mut response = check_status(response)?;
        let version = version_tag(&response);

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_ARCHIVE_DOWNLOAD_SIZE {
                return Err(DownloadError::TooLarge {
                    what: "archive",
                    size: content_length,
                    max: MAX_ARCHIVE_DOWNLOAD_SIZE,
                });
            }
        }

        let mut file = tokio::fs::File::create(archive_path).await?;
        let mut total: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            total += chunk.len() as u64;
            // Content-Length may be missing or wrong
            if total > MAX_ARCHIVE_DOWNLOAD_SIZE {
                return Err(DownloadError::TooLarge {
                    what: "archive",
                    size: total,
                    max: MAX_ARCHIVE_DOWNLOAD_SIZE,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);
        log::debug!("Downloaded {} archive ({} bytes)", descriptor.kind, total);

        let archive_path = archive_path.to_path_buf();
        let entry_name = descriptor.archive_entry();
        let dest = descriptor.file_path.clone();
        let bytes = tokio::task::spawn_blocking(move || {
            let archive = std::fs::File::open(&archive_path)?;
            extract_database(
                BufReader::new(archive),
                &entry_name,
                &dest,
                MAX_DATABASE_FILE_SIZE,
            )
        })
        .await
        .map_err(|e| DownloadError::Io(std::io::Error::other(e)))??;

        Ok(Installed { bytes, version })
    }
}

/// Maps non-success statuses, keeping 429 distinguishable.
fn check_status(response: Response) -> Result<Response, DownloadError> {
    match response.status() {
        StatusCode::TOO_MANY_REQUESTS => Err(DownloadError::ProviderRateLimited),
        status if !status.is_success() => Err(DownloadError::Status(status)),
        _ => Ok(response),
    }
}

fn version_tag(response: &Response) -> Option<String> {
    response
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_last_modified)
}

/// Canonical version tag for an RFC 1123 `Last-Modified` value.
pub(crate) fn parse_last_modified(value: &str) -> Option<String> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc).to_rfc3339())
}
