//! Cached health probe for the managed databases.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::pipeline::Shared;
use super::types::ResourceKind;
use crate::config::{HEALTH_PROBE_IPS, HEALTH_PROBE_NAME};
use crate::error_handling::LookupError;

/// Placeholder for store values that were never written.
const NOT_AVAILABLE: &str = "n/a";

/// Result of one verification pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthProbe {
    pub name: String,
    pub healthy: bool,
    /// `<kind>_db_status`, `<kind>_db_version` and `<kind>_last_check` per kind
    pub message: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    /// Seconds the probe is served from cache
    pub interval: u64,
}

/// Aggregated service status built from individual probes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReply {
    pub status: String,
    pub probes: Vec<HealthProbe>,
}

impl StatusReply {
    /// `STATUS_OK_<service>` unless any probe is unhealthy.
    pub fn from_probes(service: &str, probes: Vec<HealthProbe>) -> Self {
        let status = if probes.iter().all(|probe| probe.healthy) {
            format!("STATUS_OK_{}", service)
        } else {
            format!("STATUS_FAIL_{}", service)
        };
        Self { status, probes }
    }
}

struct CachedProbe {
    expires_at: Instant,
    probe: Arc<HealthProbe>,
}

/// Serves the last probe until it expires.
///
/// The lock is held while verifying, so callers racing an expiry trigger a
/// single verification and all receive its result.
pub struct HealthProbeCache {
    ttl: Duration,
    cached: Mutex<Option<CachedProbe>>,
}

impl HealthProbeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cached: Mutex::new(None),
        }
    }

    pub fn status<F>(&self, verify: F) -> Arc<HealthProbe>
    where
        F: FnOnce() -> HealthProbe,
    {
        self.status_at(Instant::now(), verify)
    }

    pub fn status_at<F>(&self, now: Instant, verify: F) -> Arc<HealthProbe>
    where
        F: FnOnce() -> HealthProbe,
    {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = cached.as_ref() {
            if now < entry.expires_at {
                return Arc::clone(&entry.probe);
            }
        }

        let probe = Arc::new(verify());
        *cached = Some(CachedProbe {
            expires_at: now + self.ttl,
            probe: Arc::clone(&probe),
        });
        probe
    }
}

/// Runs the fixed test lookups against every active reader.
///
/// Observational only: failures are reported in the probe, readers are left
/// untouched.
pub(crate) fn verify(shared: &Shared, ttl: Duration) -> HealthProbe {
    let mut healthy = true;
    let mut message = BTreeMap::new();

    for (kind, state) in &shared.resources {
        let status = match probe_reader(*kind, |ip| match kind {
            ResourceKind::City => state.guard.query(|reader| reader.city(ip)).map(drop),
            ResourceKind::Asn => state.guard.query(|reader| reader.asn(ip)).map(drop),
        }) {
            Ok(()) => "ok".to_string(),
            Err(LookupError::NotLoaded(_)) => {
                healthy = false;
                "not loaded".to_string()
            }
            Err(e) => {
                healthy = false;
                e.to_string()
            }
        };
        if status != "ok" {
            log::warn!("{} health probe: {}", kind, status);
        }

        message.insert(format!("{}_db_status", kind), status);
        message.insert(
            format!("{}_db_version", kind),
            or_not_available(shared.store.get_remote_version(*kind)),
        );
        message.insert(
            format!("{}_last_check", kind),
            or_not_available(shared.store.get_last_checked(*kind)),
        );
    }

    HealthProbe {
        name: HEALTH_PROBE_NAME.to_string(),
        healthy,
        message,
        timestamp: Utc::now(),
        interval: ttl.as_secs(),
    }
}

fn probe_reader<F>(kind: ResourceKind, lookup: F) -> Result<(), LookupError>
where
    F: Fn(IpAddr) -> Result<(), LookupError>,
{
    for raw in HEALTH_PROBE_IPS {
        let ip: IpAddr = raw
            .parse()
            .map_err(|_| LookupError::InvalidIp(raw.to_string()))?;
        lookup(ip).map_err(|e| {
            log::debug!("{} health probe lookup of {} failed: {}", kind, ip, e);
            e
        })?;
    }
    Ok(())
}

fn or_not_available(value: String) -> String {
    if value.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        value
    }
}
