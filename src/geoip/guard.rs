//! Hot-swappable holder for the active reader of one database kind.

use std::sync::{Arc, PoisonError, RwLock};

use super::reader::GeoReader;
use super::types::ResourceKind;
use crate::error_handling::LookupError;

/// Holds the currently active reader for a kind.
///
/// Queries clone the `Arc` under a read lock and run outside of it, so a
/// swap only waits for other pointer clones, never for in-flight lookups.
/// Once a reader has been installed the slot is never emptied again.
pub struct ReaderGuard {
    kind: ResourceKind,
    active: RwLock<Option<Arc<dyn GeoReader>>>,
}

impl ReaderGuard {
    /// Creates an empty guard (no reader loaded yet).
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            active: RwLock::new(None),
        }
    }

    /// Runs `f` against the active reader.
    pub fn query<T, F>(&self, f: F) -> Result<T, LookupError>
    where
        F: FnOnce(&dyn GeoReader) -> Result<T, LookupError>,
    {
        let reader = self.current().ok_or(LookupError::NotLoaded(self.kind))?;
        f(reader.as_ref())
    }

    /// Snapshot of the active reader.
    pub fn current(&self) -> Option<Arc<dyn GeoReader>> {
        // The slot only ever holds a complete Arc, so a poisoned lock is still consistent
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Installs `reader`, returning the one it replaced.
    pub fn swap(&self, reader: Arc<dyn GeoReader>) -> Option<Arc<dyn GeoReader>> {
        let mut slot = self
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        slot.replace(reader)
    }

    pub fn is_loaded(&self) -> bool {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
