//! Archive extraction utilities.
//!
//! This module extracts a single `.mmdb` file from the tar.gz archives
//! published by MaxMind and installs it atomically.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::error_handling::DownloadError;

/// Extracts the entry whose basename is exactly `entry_name` into `dest`.
///
/// Every other entry is skipped. A directory carrying the expected name is
/// logged and skipped as well. The file is written next to `dest` first and
/// renamed into place, so `dest` is never observed half-written.
///
/// # Arguments
///
/// * `archive` - The tar.gz stream
/// * `entry_name` - Basename to look for (e.g., "GeoLite2-City.mmdb")
/// * `dest` - Final location of the database
/// * `max_size` - Upper bound for the extracted file
///
/// # Returns
///
/// The number of bytes written.
pub(crate) fn extract_database<R: Read>(
    archive: R,
    entry_name: &str,
    dest: &Path,
    max_size: u64,
) -> Result<u64, DownloadError> {
    log::debug!("Extracting {} from tar.gz archive", entry_name);

    let mut tar_archive = Archive::new(GzDecoder::new(archive));

    for entry_result in tar_archive.entries()? {
        let mut entry = entry_result?;
        let path = entry.path()?.into_owned();

        if path.file_name().and_then(|n| n.to_str()) != Some(entry_name) {
            log::trace!("Skipping archive entry {}", path.display());
            continue;
        }

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            log::warn!(
                "Archive entry {} is a directory, expected a file; skipping",
                path.display()
            );
            continue;
        }
        if !entry_type.is_file() {
            log::warn!(
                "Archive entry {} is not a regular file ({:?}); skipping",
                path.display(),
                entry_type
            );
            continue;
        }

        let written = install_entry(&mut entry, dest, max_size)?;
        log::info!(
            "Extracted {} from tar.gz ({} bytes)",
            entry_name,
            written
        );
        return Ok(written);
    }

    Err(DownloadError::EntryMissing(entry_name.to_string()))
}

/// Temporary sibling used while writing `dest`.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    dest.with_file_name(name)
}

fn install_entry<R: Read>(entry: &mut R, dest: &Path, max_size: u64) -> Result<u64, DownloadError> {
    let tmp_path = partial_path(dest);

    let result = write_limited(entry, &tmp_path, max_size)
        .and_then(|written| std::fs::rename(&tmp_path, dest).map(|_| written).map_err(Into::into));

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}

fn write_limited<R: Read>(entry: &mut R, tmp_path: &Path, max_size: u64) -> Result<u64, DownloadError> {
    let mut out = File::create(tmp_path)?;
    let written = io::copy(&mut entry.take(max_size + 1), &mut out)?;
    if written > max_size {
        return Err(DownloadError::TooLarge {
            what: "database file",
            size: written,
            max: max_size,
        });
    }
    out.flush()?;
    out.sync_all()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tar::{Builder, EntryType, Header};
    use tempfile::TempDir;

    const MAX: u64 = 1024 * 1024;

    /// Creates a test tar.gz archive with the specified files.
    fn create_test_tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut tar_builder = Builder::new(Vec::new());
        for (name, content) in files {
            let mut header = Header::new_gnu();
            header.set_path(name).unwrap();
            header.set_entry_type(EntryType::Regular);
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar_builder.append(&header, *content).unwrap();
        }
        finish(tar_builder)
    }

    fn finish(tar_builder: Builder<Vec<u8>>) -> Vec<u8> {
        let tar_bytes = tar_builder.into_inner().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar_bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_extract_success() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("GeoLite2-City.mmdb");
        let tar_gz = create_test_tar_gz(&[("GeoLite2-City.mmdb", b"fake mmdb content")]);

        let written = extract_database(&tar_gz[..], "GeoLite2-City.mmdb", &dest, MAX).unwrap();
        assert_eq!(written, 17);
        assert_eq!(std::fs::read(&dest).unwrap(), b"fake mmdb content");
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn test_extract_nested_path_among_other_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("GeoLite2-ASN.mmdb");
        let tar_gz = create_test_tar_gz(&[
            ("GeoLite2-ASN_20240101/README.txt", b"readme"),
            ("GeoLite2-ASN_20240101/GeoLite2-ASN.mmdb", b"asn data"),
            ("GeoLite2-ASN_20240101/LICENSE.txt", b"license"),
        ]);

        extract_database(&tar_gz[..], "GeoLite2-ASN.mmdb", &dest, MAX).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"asn data");
    }

    #[test]
    fn test_extract_requires_exact_basename() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("GeoLite2-City.mmdb");
        let tar_gz = create_test_tar_gz(&[
            ("GeoLite2-City.mmdb.sha256", b"checksum"),
            ("old-GeoLite2-City.mmdb", b"wrong"),
            ("GeoLite2-ASN.mmdb", b"wrong kind"),
        ]);

        let err = extract_database(&tar_gz[..], "GeoLite2-City.mmdb", &dest, MAX).unwrap_err();
        assert!(matches!(err, DownloadError::EntryMissing(_)), "got: {}", err);
        assert!(err.to_string().contains("GeoLite2-City.mmdb not found"));
        assert!(!dest.exists());
    }

    #[test]
    fn test_extract_skips_directory_with_expected_name() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("GeoLite2-City.mmdb");

        let mut tar_builder = Builder::new(Vec::new());
        let mut dir_header = Header::new_gnu();
        dir_header.set_path("GeoLite2-City.mmdb/").unwrap();
        dir_header.set_entry_type(EntryType::Directory);
        dir_header.set_size(0);
        dir_header.set_mode(0o755);
        dir_header.set_cksum();
        tar_builder.append(&dir_header, io::empty()).unwrap();

        let content = b"real file";
        let mut file_header = Header::new_gnu();
        file_header.set_path("GeoLite2-City_20240101/GeoLite2-City.mmdb").unwrap();
        file_header.set_entry_type(EntryType::Regular);
        file_header.set_size(content.len() as u64);
        file_header.set_mode(0o644);
        file_header.set_cksum();
        tar_builder.append(&file_header, &content[..]).unwrap();

        let tar_gz = finish(tar_builder);
        extract_database(&tar_gz[..], "GeoLite2-City.mmdb", &dest, MAX).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), content);
    }

    #[test]
    fn test_extract_only_directory_is_missing_entry() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("GeoLite2-City.mmdb");

        let mut tar_builder = Builder::new(Vec::new());
        let mut dir_header = Header::new_gnu();
        dir_header.set_path("GeoLite2-City.mmdb/").unwrap();
        dir_header.set_entry_type(EntryType::Directory);
        dir_header.set_size(0);
        dir_header.set_mode(0o755);
        dir_header.set_cksum();
        tar_builder.append(&dir_header, io::empty()).unwrap();

        let tar_gz = finish(tar_builder);
        let err = extract_database(&tar_gz[..], "GeoLite2-City.mmdb", &dest, MAX).unwrap_err();
        assert!(matches!(err, DownloadError::EntryMissing(_)));
    }

    #[test]
    fn test_extract_size_limit() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("GeoLite2-City.mmdb");
        let big = vec![7u8; 64];
        let tar_gz = create_test_tar_gz(&[("GeoLite2-City.mmdb", &big)]);

        let err = extract_database(&tar_gz[..], "GeoLite2-City.mmdb", &dest, 32).unwrap_err();
        assert!(matches!(err, DownloadError::TooLarge { .. }), "got: {}", err);
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn test_extract_replaces_existing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("GeoLite2-City.mmdb");
        std::fs::write(&dest, b"previous").unwrap();
        let tar_gz = create_test_tar_gz(&[("GeoLite2-City.mmdb", b"next")]);

        extract_database(&tar_gz[..], "GeoLite2-City.mmdb", &dest, MAX).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"next");
    }

    #[test]
    fn test_extract_not_gzip() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("GeoLite2-City.mmdb");

        let result = extract_database(&b"plain bytes, not gzip"[..], "GeoLite2-City.mmdb", &dest, MAX);
        assert!(matches!(result, Err(DownloadError::Io(_))));
    }
}
