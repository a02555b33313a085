//! Single-worker refresh pipeline.
//!
//! Every lifecycle stage for every database kind is a [`StageEvent`] on one
//! ordered queue, drained by one task per manager. Stage handlers run outside
//! of `select!`, so cancellation lets the current stage finish and only stops
//! new stages from being picked up.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::download::Downloader;
use super::guard::ReaderGuard;
use super::rate_limiter::RefreshLimiter;
use super::reader::{GeoReader, ReaderFactory};
use super::types::{ResourceDescriptor, ResourceKind};
use super::version_store::VersionStore;
use crate::config::RATE_LIMIT_WINDOW;
use crate::error_handling::{DownloadError, ManagerError, OpenError, StoreError};

/// Per-kind runtime state shared between the worker and lookup callers.
pub(crate) struct ResourceState {
    pub descriptor: ResourceDescriptor,
    pub guard: ReaderGuard,
    pub limiter: RefreshLimiter,
}

impl ResourceState {
    pub fn new(descriptor: ResourceDescriptor) -> Self {
        Self {
            guard: ReaderGuard::new(descriptor.kind),
            limiter: RefreshLimiter::new(descriptor.rate_limit_burst, RATE_LIMIT_WINDOW),
            descriptor,
        }
    }
}

/// Everything both the worker and the manager's callers need.
pub(crate) struct Shared {
    pub resources: BTreeMap<ResourceKind, ResourceState>,
    pub store: Arc<dyn VersionStore>,
    pub factory: Arc<dyn ReaderFactory>,
}

impl Shared {
    pub fn resource(&self, kind: ResourceKind) -> Option<&ResourceState> {
        self.resources.get(&kind)
    }
}

/// One lifecycle stage for one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StageEvent {
    /// Compare the remote version with the stored one.
    Check(ResourceKind),
    /// Fetch and install; `tag` is the version seen by the preceding check.
    Download {
        kind: ResourceKind,
        tag: Option<String>,
    },
    /// Open the local file and swap it in; `tag` is persisted on success.
    Reload {
        kind: ResourceKind,
        tag: Option<String>,
    },
}

impl StageEvent {
    fn kind(&self) -> ResourceKind {
        match self {
            StageEvent::Check(kind) => *kind,
            StageEvent::Download { kind, .. } | StageEvent::Reload { kind, .. } => *kind,
        }
    }

    fn stage(&self) -> &'static str {
        match self {
            StageEvent::Check(_) => "check",
            StageEvent::Download { .. } => "download",
            StageEvent::Reload { .. } => "reload",
        }
    }
}

pub(crate) struct EventPipeline {
    shared: Arc<Shared>,
    downloader: Downloader,
    tx: mpsc::UnboundedSender<StageEvent>,
    rx: mpsc::UnboundedReceiver<StageEvent>,
    cancel: CancellationToken,
    automatic_update: bool,
    next_due: BTreeMap<ResourceKind, Instant>,
    /// Kinds with a queued or running download/reload sequence
    in_flight: Mutex<BTreeSet<ResourceKind>>,
}

impl EventPipeline {
    pub fn new(
        shared: Arc<Shared>,
        downloader: Downloader,
        cancel: CancellationToken,
        automatic_update: bool,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            shared,
            downloader,
            tx,
            rx,
            cancel,
            automatic_update,
            next_due: BTreeMap::new(),
            in_flight: Mutex::new(BTreeSet::new()),
        }
    }

    /// Handle for enqueueing stages from outside the worker.
    pub fn sender(&self) -> mpsc::UnboundedSender<StageEvent> {
        self.tx.clone()
    }

    /// Opens the existing local file for `kind` without touching the network.
    ///
    /// A missing file is routed to the download stage. Any other failure is
    /// returned so that construction fails.
    pub async fn initial_load(&self, kind: ResourceKind) -> Result<(), ManagerError> {
        let Some(state) = self.shared.resource(kind) else {
            return Ok(());
        };

        match open_reader(&self.shared.factory, &state.descriptor.file_path).await {
            Ok(reader) => {
                state.guard.swap(reader);
                log::info!(
                    "{} initial load: opened {}",
                    kind,
                    state.descriptor.file_path.display()
                );
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                log::info!("{} initial load: {}, scheduling download", kind, e);
                self.schedule_download(kind, None);
                Ok(())
            }
            Err(source) => Err(ManagerError::InitialLoad { kind, source }),
        }
    }

    /// Moves the pipeline onto its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let mut ticker = self.ticker();
        log::debug!(
            "Refresh pipeline started (automatic update: {})",
            self.automatic_update
        );

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                now = next_tick(&mut ticker) => {
                    self.schedule_due_checks(now);
                    continue;
                }
                event = self.rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.handle(event).await;
        }

        log::info!("Refresh pipeline stopped");
    }

    /// Shared timer ticking at the shortest refresh interval.
    fn ticker(&mut self) -> Option<Interval> {
        if !self.automatic_update {
            return None;
        }
        let period = self
            .shared
            .resources
            .values()
            .map(|state| state.descriptor.refresh_interval)
            .min()?;
        if period.is_zero() {
            log::warn!("Refresh interval is zero, automatic updates disabled");
            return None;
        }

        let start = Instant::now();
        for (kind, state) in &self.shared.resources {
            self.next_due
                .insert(*kind, start + state.descriptor.refresh_interval);
        }
        let mut ticker = interval_at(start + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Some(ticker)
    }

    fn schedule_due_checks(&mut self, now: Instant) {
        for (kind, state) in &self.shared.resources {
            let due = self.next_due.entry(*kind).or_insert(now);
            if now >= *due {
                *due = now + state.descriptor.refresh_interval;
                if self.tx.send(StageEvent::Check(*kind)).is_err() {
                    log::warn!("{} check: pipeline queue closed", kind);
                }
            }
        }
    }

    /// Starts the download/reload sequence for `kind`.
    ///
    /// The kind stays in flight until its reload finishes or the limiter
    /// refuses the download; checks for it are skipped meanwhile.
    fn schedule_download(&self, kind: ResourceKind, tag: Option<String>) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind);
        self.enqueue(StageEvent::Download { kind, tag });
    }

    fn finish_sequence(&self, kind: ResourceKind) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&kind);
    }

    fn is_in_flight(&self, kind: ResourceKind) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&kind)
    }

    fn enqueue(&self, event: StageEvent) {
        let (kind, stage) = (event.kind(), event.stage());
        if self.tx.send(event).is_err() {
            log::warn!("{} {}: pipeline queue closed", kind, stage);
        }
    }

    async fn handle(&self, event: StageEvent) {
        let Some(state) = self.shared.resource(event.kind()) else {
            log::warn!("{} {}: unknown database kind", event.kind(), event.stage());
            return;
        };
        log::debug!("{} {}: start", event.kind(), event.stage());

        match event {
            StageEvent::Check(_) => self.check(state).await,
            StageEvent::Download { tag, .. } => self.download(state, tag).await,
            StageEvent::Reload { tag, .. } => self.reload(state, tag).await,
        }
    }

    async fn check(&self, state: &ResourceState) {
        let kind = state.descriptor.kind;
        if self.is_in_flight(kind) {
            log::debug!("{} check: update already in progress, skipping", kind);
            return;
        }

        let missing = !tokio::fs::try_exists(&state.descriptor.file_path)
            .await
            .unwrap_or(false);

        let tag = match self.downloader.remote_version(&state.descriptor).await {
            Ok(tag) => {
                if let Err(e) = write_store(&self.shared.store, move |store| {
                    store.set_last_checked(kind)
                })
                .await
                {
                    log::warn!("{} check: failed to record check time: {}", kind, e);
                }
                tag
            }
            Err(e) => {
                log_stage_error(kind, "check", &e);
                if !missing {
                    return;
                }
                None
            }
        };

        let stale = match &tag {
            Some(tag) => *tag != self.shared.store.get_remote_version(kind),
            None => true,
        };
        if !stale && !missing {
            log::info!("{} check: no new version", kind);
            return;
        }

        log::info!(
            "{} check: {}, scheduling download",
            kind,
            if missing { "local file missing" } else { "new version available" }
        );
        self.schedule_download(kind, tag);
    }

    async fn download(&self, state: &ResourceState, tag: Option<String>) {
        let kind = state.descriptor.kind;
        if !state.limiter.allow() {
            log::info!(
                "{} download: deferred by rate limiter, retrying on next check",
                kind
            );
            self.finish_sequence(kind);
            return;
        }

        let tag = match self.downloader.fetch(&state.descriptor).await {
            Ok(installed) => {
                log::info!(
                    "{} download: installed {} bytes at {}",
                    kind,
                    installed.bytes,
                    state.descriptor.file_path.display()
                );
                installed.version.or(tag)
            }
            Err(e) => {
                log_stage_error(kind, "download", &e);
                None
            }
        };
        self.enqueue(StageEvent::Reload { kind, tag });
    }

    async fn reload(&self, state: &ResourceState, tag: Option<String>) {
        let kind = state.descriptor.kind;
        self.install(state, tag).await;
        self.finish_sequence(kind);
    }

    async fn install(&self, state: &ResourceState, tag: Option<String>) {
        let kind = state.descriptor.kind;
        let reader = match open_reader(&self.shared.factory, &state.descriptor.file_path).await {
            Ok(reader) => reader,
            Err(e) => {
                log::warn!("{} reload: {}, keeping previous reader", kind, e);
                return;
            }
        };

        let build = reader.build_version();
        let replaced = state.guard.swap(reader).is_some();
        log::info!(
            "{} reload: {} reader ({})",
            kind,
            if replaced { "replaced" } else { "installed" },
            build.as_deref().unwrap_or("unknown build")
        );

        if let Some(tag) = tag {
            let value = tag.clone();
            if let Err(e) = write_store(&self.shared.store, move |store| {
                store.set_remote_version(kind, &value)
            })
            .await
            {
                log::warn!("{} reload: failed to record version {}: {}", kind, tag, e);
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) -> Instant {
    match ticker {
        Some(ticker) => ticker.tick().await,
        None => std::future::pending().await,
    }
}

/// Opens `path` on the blocking pool.
pub(crate) async fn open_reader(
    factory: &Arc<dyn ReaderFactory>,
    path: &std::path::Path,
) -> Result<Arc<dyn GeoReader>, OpenError> {
    let factory = Arc::clone(factory);
    let path: PathBuf = path.to_path_buf();
    let join_path = path.clone();
    tokio::task::spawn_blocking(move || factory.open(&path))
        .await
        .map_err(|e| OpenError::Io {
            path: join_path,
            source: std::io::Error::other(e),
        })?
}

/// Runs a version store write on the blocking pool.
async fn write_store<F>(store: &Arc<dyn VersionStore>, write: F) -> Result<(), StoreError>
where
    F: FnOnce(&dyn VersionStore) -> Result<(), StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || write(store.as_ref()))
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
}

fn log_stage_error(kind: ResourceKind, stage: &str, error: &DownloadError) {
    match error {
        DownloadError::ProviderRateLimited => {
            log::warn!("{} {}: rate limited by provider", kind, stage)
        }
        _ => log::warn!("{} {}: {}", kind, stage, error),
    }
}
