// Shared test helpers: fake database readers, archive builders and config.
//
// Database files used by these tests are tiny text files in one of two
// shapes, `city:<name>` or `asn:<number>:<organization>`. Anything else is
// treated as corrupt by `TextFactory`.

#![allow(dead_code)] // Each test binary uses a different subset

use std::io::Write;
use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use httptest::Server;

use ip_service::{
    AsnRecord, CityRecord, Config, GeoReader, LookupError, OpenError, ReaderFactory, ResourceKind,
};

pub const OLD_TAG: &str = "2022-08-01T00:00:00+00:00";
pub const NEW_LAST_MODIFIED: &str = "Thu, 01 Sep 2022 18:54:52 GMT";
pub const NEW_TAG: &str = "2022-09-01T18:54:52+00:00";

struct TextReader {
    city: Option<String>,
    asn: Option<(u32, String)>,
}

impl GeoReader for TextReader {
    fn city(&self, ip: IpAddr) -> Result<CityRecord, LookupError> {
        self.city
            .as_ref()
            .map(|name| CityRecord {
                city: Some(name.clone()),
                ..Default::default()
            })
            .ok_or(LookupError::NotFound {
                kind: ResourceKind::City,
                ip,
            })
    }

    fn asn(&self, ip: IpAddr) -> Result<AsnRecord, LookupError> {
        self.asn
            .as_ref()
            .map(|(number, org)| AsnRecord {
                asn: Some(*number),
                organization: Some(org.clone()),
            })
            .ok_or(LookupError::NotFound {
                kind: ResourceKind::Asn,
                ip,
            })
    }
}

/// Opens text "databases" and counts every open attempt.
#[derive(Default)]
pub struct TextFactory {
    opens: AtomicUsize,
}

impl TextFactory {
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl ReaderFactory for TextFactory {
    fn open(&self, path: &Path) -> Result<Arc<dyn GeoReader>, OpenError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => OpenError::NotFound(path.to_path_buf()),
            _ => OpenError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let corrupt = || OpenError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("unrecognised content {:?}", content),
        };
        let parts: Vec<&str> = content.trim().splitn(3, ':').collect();
        let reader = match parts.as_slice() {
            ["city", name] => TextReader {
                city: Some(name.to_string()),
                asn: None,
            },
            ["asn", number, org] => TextReader {
                city: None,
                asn: Some((number.parse().map_err(|_| corrupt())?, org.to_string())),
            },
            _ => return Err(corrupt()),
        };
        Ok(Arc::new(reader))
    }
}

/// Config pointing both databases at `server`, with the timer disabled.
pub fn test_config(server: &Server, dir: &Path) -> Config {
    Config {
        license_key: "testKey".to_string(),
        db_dir: dir.join("db"),
        staging_dir: Some(dir.join("staging")),
        url_template: format!(
            "http://{}/{{edition}}?license_key={{license_key}}",
            server.addr()
        ),
        automatic_update: false,
        store_path: dir.join("versions.json"),
        ..Default::default()
    }
}

pub fn write_db(config: &Config, kind: ResourceKind, content: &str) {
    std::fs::create_dir_all(&config.db_dir).expect("Failed to create db dir");
    std::fs::write(config.db_dir.join(kind.file_name()), content).expect("Failed to write db");
}

/// gzip-compressed tar archive with one regular file.
pub fn tar_gz_with(name: &str, content: &[u8]) -> Vec<u8> {
    let mut tar_builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_path(name).expect("valid archive path");
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    tar_builder
        .append(&header, content)
        .expect("Failed to append archive entry");
    let tar_bytes = tar_builder.into_inner().expect("Failed to finish tar");

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes).expect("Failed to compress");
    encoder.finish().expect("Failed to finish gzip")
}

/// Polls `condition` until it holds or five seconds pass.
pub async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..250 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
