//! Public entry point: owns the databases, serves lookups and health.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::download::Downloader;
use super::health::{self, HealthProbe, HealthProbeCache};
use super::pipeline::{EventPipeline, ResourceState, Shared, StageEvent};
use super::reader::{GeoReader, ReaderFactory};
use super::types::{AsnRecord, CityRecord, IpInformation, ResourceKind};
use super::version_store::VersionStore;
use crate::config::{Config, HEALTH_PROBE_TTL};
use crate::error_handling::{LookupError, ManagerError};
use crate::initialization::init_client;

/// Database lifecycle manager.
///
/// Construction opens whatever is already on disk and starts one background
/// worker that keeps the files fresh. Lookups and status calls never go
/// through that worker.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use ip_service::{Config, FileVersionStore, GeoManager, MaxMindFactory};
///
/// # async fn run() -> anyhow::Result<()> {
/// let config = Config {
///     license_key: "my-license-key".to_string(),
///     ..Default::default()
/// };
/// let store = Arc::new(FileVersionStore::open(&config.store_path)?);
/// let manager = GeoManager::new(&config, store, Arc::new(MaxMindFactory)).await?;
///
/// let info = manager.lookup("8.8.8.8")?;
/// println!("{:?}", info.asn_organization);
///
/// manager.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct GeoManager {
    shared: Arc<Shared>,
    events: mpsc::UnboundedSender<StageEvent>,
    health: HealthProbeCache,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl GeoManager {
    /// Builds the manager with a default HTTP client.
    ///
    /// # Errors
    ///
    /// Fails when a working directory can't be created, the HTTP client can't
    /// be built, or a database file exists but can't be opened.
    pub async fn new(
        config: &Config,
        store: Arc<dyn VersionStore>,
        factory: Arc<dyn ReaderFactory>,
    ) -> Result<Self, ManagerError> {
        let client = init_client()?;
        Self::with_client(config, store, factory, client).await
    }

    /// Like [`GeoManager::new`] with a caller-supplied client.
    pub async fn with_client(
        config: &Config,
        store: Arc<dyn VersionStore>,
        factory: Arc<dyn ReaderFactory>,
        client: reqwest::Client,
    ) -> Result<Self, ManagerError> {
        let staging_dir = config.staging_dir();
        create_dir(&config.db_dir).await?;
        create_dir(&staging_dir).await?;

        let resources: BTreeMap<_, _> = config
            .descriptors()
            .into_iter()
            .map(|descriptor| (descriptor.kind, ResourceState::new(descriptor)))
            .collect();
        let shared = Arc::new(Shared {
            resources,
            store,
            factory,
        });

        let cancel = CancellationToken::new();
        let downloader = Downloader::new(client, config.license_key.clone(), staging_dir);
        let pipeline = EventPipeline::new(
            Arc::clone(&shared),
            downloader,
            cancel.clone(),
            config.automatic_update,
        );

        for kind in ResourceKind::ALL {
            pipeline.initial_load(kind).await?;
        }

        let events = pipeline.sender();
        let worker = pipeline.spawn();
        log::info!(
            "GeoIP manager started (db dir: {}, update interval: {:?}, automatic update: {})",
            config.db_dir.display(),
            config.update_interval,
            config.automatic_update
        );

        Ok(Self {
            shared,
            events,
            health: HealthProbeCache::new(HEALTH_PROBE_TTL),
            cancel,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// City-level geolocation for `ip`.
    pub fn lookup_city(&self, ip: &str) -> Result<CityRecord, LookupError> {
        let ip = parse_ip(ip)?;
        self.query(ResourceKind::City, |reader| reader.city(ip))
    }

    /// Autonomous system for `ip`.
    pub fn lookup_asn(&self, ip: &str) -> Result<AsnRecord, LookupError> {
        let ip = parse_ip(ip)?;
        self.query(ResourceKind::Asn, |reader| reader.asn(ip))
    }

    /// City and ASN data merged into one record.
    ///
    /// The city database is required; ASN data is added when available.
    pub fn lookup(&self, ip: &str) -> Result<IpInformation, LookupError> {
        let addr = parse_ip(ip)?;
        let city = self.query(ResourceKind::City, |reader| reader.city(addr))?;
        let asn = match self.query(ResourceKind::Asn, |reader| reader.asn(addr)) {
            Ok(record) => Some(record),
            Err(e) => {
                log::debug!("ASN lookup for {} failed: {}", addr, e);
                None
            }
        };
        Ok(IpInformation::new(addr, city, asn))
    }

    /// Cached health probe, recomputed at most once per TTL.
    pub fn status(&self) -> Arc<HealthProbe> {
        self.health
            .status(|| health::verify(&self.shared, HEALTH_PROBE_TTL))
    }

    /// Queues a version check for `kind` outside the timer.
    pub fn trigger_check(&self, kind: ResourceKind) {
        if self.events.send(StageEvent::Check(kind)).is_err() {
            log::warn!("{} check: manager is closed", kind);
        }
    }

    /// Whether a reader is installed for `kind`.
    pub fn is_loaded(&self, kind: ResourceKind) -> bool {
        self.shared
            .resource(kind)
            .is_some_and(|state| state.guard.is_loaded())
    }

    /// Stops the pipeline and waits for the worker to exit.
    ///
    /// An in-flight stage is allowed to finish. Calling `close` again is a
    /// no-op.
    pub async fn close(&self) -> Result<(), ManagerError> {
        log::info!("Closing GeoIP manager");
        self.cancel.cancel();
        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            worker.await?;
        }
        Ok(())
    }

    fn query<T, F>(&self, kind: ResourceKind, f: F) -> Result<T, LookupError>
    where
        F: FnOnce(&dyn GeoReader) -> Result<T, LookupError>,
    {
        self.shared
            .resource(kind)
            .ok_or(LookupError::NotLoaded(kind))?
            .guard
            .query(f)
    }
}

impl Drop for GeoManager {
    fn drop(&mut self) {
        // Dropping without close() still stops the worker at its next await point
        self.cancel.cancel();
    }
}

fn parse_ip(ip: &str) -> Result<IpAddr, LookupError> {
    ip.trim()
        .parse()
        .map_err(|_| LookupError::InvalidIp(ip.to_string()))
}

async fn create_dir(path: &Path) -> Result<(), ManagerError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| ManagerError::Io {
            path: path.to_path_buf(),
            source,
        })
}
