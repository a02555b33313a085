//! Persistent version metadata per database kind.
//!
//! This module provides the [`VersionStore`] seam plus an in-memory and a
//! JSON-file implementation. Missing values read as the empty string.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::types::ResourceKind;
use crate::error_handling::StoreError;

/// Durable record of the last remote check and the installed remote version.
///
/// Last write wins; no transactional guarantees are required.
pub trait VersionStore: Send + Sync {
    /// Last remote version tag recorded for `kind` (empty if none).
    fn get_remote_version(&self, kind: ResourceKind) -> String;

    /// Timestamp of the last remote check for `kind` (empty if none).
    fn get_last_checked(&self, kind: ResourceKind) -> String;

    /// Records "now" as the last remote check for `kind`.
    fn set_last_checked(&self, kind: ResourceKind) -> Result<(), StoreError>;

    /// Records `value` as the installed remote version for `kind`.
    fn set_remote_version(&self, kind: ResourceKind, value: &str) -> Result<(), StoreError>;
}

/// Stored values for one kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    #[serde(default)]
    pub remote_version: String,
    #[serde(default)]
    pub last_checked: String,
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Process-local store, mostly useful for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    records: Mutex<BTreeMap<ResourceKind, VersionRecord>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the record for `kind`.
    pub fn record(&self, kind: ResourceKind) -> VersionRecord {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    fn update(&self, kind: ResourceKind, f: impl FnOnce(&mut VersionRecord)) {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        f(records.entry(kind).or_default());
    }
}

impl VersionStore for MemoryVersionStore {
    fn get_remote_version(&self, kind: ResourceKind) -> String {
        self.record(kind).remote_version
    }

    fn get_last_checked(&self, kind: ResourceKind) -> String {
        self.record(kind).last_checked
    }

    fn set_last_checked(&self, kind: ResourceKind) -> Result<(), StoreError> {
        self.update(kind, |record| record.last_checked = now_timestamp());
        Ok(())
    }

    fn set_remote_version(&self, kind: ResourceKind, value: &str) -> Result<(), StoreError> {
        self.update(kind, |record| record.remote_version = value.to_string());
        Ok(())
    }
}

/// JSON document on disk, rewritten through a temporary file on every change.
#[derive(Debug)]
pub struct FileVersionStore {
    path: PathBuf,
    records: Mutex<BTreeMap<ResourceKind, VersionRecord>>,
}

impl FileVersionStore {
    /// Opens (or starts) the store at `path`, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let records = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        log::debug!("Opened version store at {}", path.display());

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    fn read(&self, kind: ResourceKind) -> VersionRecord {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    fn update(
        &self,
        kind: ResourceKind,
        f: impl FnOnce(&mut VersionRecord),
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut updated = records.clone();
        f(updated.entry(kind).or_default());

        // Readers only see the change once it is on disk
        let content = serde_json::to_string_pretty(&updated)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)?;
        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        *records = updated;
        Ok(())
    }
}

impl VersionStore for FileVersionStore {
    fn get_remote_version(&self, kind: ResourceKind) -> String {
        self.read(kind).remote_version
    }

    fn get_last_checked(&self, kind: ResourceKind) -> String {
        self.read(kind).last_checked
    }

    fn set_last_checked(&self, kind: ResourceKind) -> Result<(), StoreError> {
        self.update(kind, |record| record.last_checked = now_timestamp())
    }

    fn set_remote_version(&self, kind: ResourceKind, value: &str) -> Result<(), StoreError> {
        self.update(kind, |record| record.remote_version = value.to_string())
    }
}
