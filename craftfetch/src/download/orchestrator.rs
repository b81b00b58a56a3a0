//! The download orchestrator.
//!
//! A [`Downloader`] turns a manifest into files on disk: it resolves the
//! manifest into items, drops the ones already present, then fetches and
//! writes the rest with bounded concurrency. Progress and lifecycle changes
//! are published on the downloader's [`EventBus`].

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::events::{DownloadEvent, EventBus, Progress, SubscriptionId};
use super::filter::filter_missing;
use super::item::Downloadable;
use super::queue::run_bounded;
use super::resolver::ManifestResolver;
use super::state::{RunPhase, RunSnapshot, RunState, RunTicket};
use crate::config::{DownloaderConfig, DEFAULT_CONCURRENCY};
use crate::error::{DownloadError, DownloadResult};
use crate::io::{FetchError, Fetcher, FileSystem, ReqwestFetcher, TokioFileSystem};
use crate::manifest::PackageManifest;
use crate::platform::Platform;

/// How a call to [`Downloader::download`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every missing item was written. `Finish` was emitted.
    Finished,
    /// The run stopped on an error. `Error` was emitted.
    Failed,
    /// [`Downloader::abort`] was called while the run was active.
    Aborted,
    /// Another run was already active; nothing was done.
    AlreadyRunning,
}

/// Concurrent downloader for one working directory.
pub struct Downloader {
    resolver: ManifestResolver,
    fetcher: Arc<dyn Fetcher>,
    fs: Arc<dyn FileSystem>,
    platform: Platform,
    concurrency: usize,
    state: Mutex<RunState>,
    events: EventBus,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("working_dir", &self.resolver.working_dir())
            .field("platform", &self.platform)
            .field("concurrency", &self.concurrency)
            .field("state", &self.snapshot())
            .finish()
    }
}

impl Downloader {
    /// Create a downloader with default concurrency.
    pub fn new(
        working_dir: impl Into<PathBuf>,
        platform: Platform,
        fetcher: Arc<dyn Fetcher>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        let resolver = ManifestResolver::new(Arc::clone(&fetcher), Arc::clone(&fs), working_dir);
        Self {
            resolver,
            fetcher,
            fs,
            platform,
            concurrency: DEFAULT_CONCURRENCY,
            state: Mutex::new(RunState::new()),
            events: EventBus::new(),
        }
    }

    /// Create a downloader from `config` using the given adapters.
    pub fn from_config(
        config: &DownloaderConfig,
        platform: Platform,
        fetcher: Arc<dyn Fetcher>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        let mut downloader = Self::new(config.working_dir.clone(), platform, fetcher, fs)
            .with_concurrency(config.concurrency);
        downloader.resolver = downloader
            .resolver
            .with_resource_endpoint(config.resource_endpoint.clone());
        downloader
    }

    /// Create a downloader from `config` over HTTP and the local disk.
    pub fn with_network(
        config: &DownloaderConfig,
        platform: Platform,
    ) -> Result<Self, FetchError> {
        let fetcher = match config.timeout {
            Some(timeout) => ReqwestFetcher::with_timeout(timeout)?,
            None => ReqwestFetcher::new()?,
        };
        Ok(Self::from_config(
            config,
            platform,
            Arc::new(fetcher),
            Arc::new(TokioFileSystem::new()),
        ))
    }

    /// Set the maximum concurrent item downloads. Zero is raised to one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn resolver(&self) -> &ManifestResolver {
        &self.resolver
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Receive every event.
    pub fn subscribe(
        &self,
        callback: impl Fn(&DownloadEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(callback)
    }

    pub fn on_progress(
        &self,
        callback: impl Fn(&Progress) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.events.on_progress(callback)
    }

    pub fn on_error(
        &self,
        callback: impl Fn(&DownloadError) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.events.on_error(callback)
    }

    pub fn on_abort(&self, callback: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        self.events.on_abort(callback)
    }

    pub fn on_finish(&self, callback: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        self.events.on_finish(callback)
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.state.lock().snapshot()
    }

    /// Returns true while a run is preparing or downloading.
    pub fn is_busy(&self) -> bool {
        self.snapshot().is_busy()
    }

    /// Items `download` would fetch right now, without fetching them.
    ///
    /// The asset index is still fetched and cached if absent.
    pub async fn plan(&self, manifest: &PackageManifest) -> DownloadResult<Vec<Downloadable>> {
        let resolved = self.resolver.resolve(manifest, self.platform).await?;
        filter_missing(self.fs.as_ref(), &resolved).await
    }

    /// Download every file of `manifest` that is not on disk yet.
    ///
    /// Returns [`RunOutcome::AlreadyRunning`] without side effects if a run
    /// is active.
    pub async fn download(&self, manifest: &PackageManifest) -> RunOutcome {
        let ticket = self.state.lock().begin();
        let Some(run) = ticket else {
            debug!(manifest = %manifest.id, "Download already in progress, ignoring");
            return RunOutcome::AlreadyRunning;
        };

        info!(
            manifest = %manifest.id,
            platform = %self.platform,
            generation = run.generation,
            "Preparing download"
        );

        let items = match self.plan(manifest).await {
            Ok(items) => items,
            Err(e) => return self.fail(&run, e),
        };

        let total = {
            let mut state = self.state.lock();
            if !state.is_live(&run) {
                debug!(generation = run.generation, "Run aborted during preparation");
                return RunOutcome::Aborted;
            }
            state.total = items.len();
            run.pool.replace(items);
            state.phase = RunPhase::Running;
            state.total
        };

        info!(total, concurrency = self.concurrency, "Downloading");

        let result = run_bounded(&run.pool, self.concurrency, |item| {
            self.fetch_and_write(&run, item)
        })
        .await;

        if let Err(e) = result {
            return self.fail(&run, e);
        }

        let mut state = self.state.lock();
        if !state.is_live(&run) {
            debug!(generation = run.generation, "Run aborted while downloading");
            return RunOutcome::Aborted;
        }
        if !run.pool.is_empty() {
            // Only reachable if items were pushed behind the workers' backs.
            warn!(pending = run.pool.len(), "Run ended with items left");
            state.phase = RunPhase::Idle;
            return RunOutcome::Failed;
        }
        state.reset();
        drop(state);

        info!(total, "Download complete");
        self.events.emit(&DownloadEvent::Finish);
        RunOutcome::Finished
    }

    /// Stop the active run.
    ///
    /// State is reset immediately and `Abort` is emitted. Workers already
    /// fetching finish their current item but record no progress. Calling
    /// this with no active run still emits `Abort`.
    pub fn abort(&self) {
        let cancelled = {
            let mut state = self.state.lock();
            let snapshot = state.snapshot();
            state.cancel();
            snapshot
        };
        info!(
            loaded = cancelled.loaded,
            total = cancelled.total,
            "Download aborted"
        );
        self.events.emit(&DownloadEvent::Abort);
    }

    async fn fetch_and_write(&self, run: &RunTicket, item: Downloadable) -> DownloadResult<()> {
        if run.token.is_cancelled() {
            return Ok(());
        }

        let response =
            self.fetcher
                .fetch(item.url())
                .await
                .map_err(|e| DownloadError::FetchFailed {
                    url: item.url().to_string(),
                    reason: e.reason,
                })?;
        if !response.is_success() {
            return Err(DownloadError::HttpStatus {
                url: item.url().to_string(),
                status: response.status,
            });
        }

        if run.token.is_cancelled() {
            debug!(item = item.name(), "Skipping write of cancelled run");
            return Ok(());
        }

        self.fs
            .write(item.destination(), response.bytes())
            .await
            .map_err(|source| DownloadError::WriteFailed {
                path: item.destination().to_path_buf(),
                source,
            })?;

        let Some((total, loaded)) = self.state.lock().record_loaded(run) else {
            return Ok(());
        };

        debug!(item = item.name(), loaded, total, "Downloaded");
        self.events.emit(&DownloadEvent::Progress(Progress {
            total,
            loaded,
            current: item.name().to_string(),
        }));
        Ok(())
    }

    /// End `run` on `error`. A run that was aborted in the meantime reports
    /// `Aborted` and emits nothing.
    fn fail(&self, run: &RunTicket, error: DownloadError) -> RunOutcome {
        {
            let mut state = self.state.lock();
            if !state.is_live(run) {
                debug!(error = %error, "Ignoring error of aborted run");
                return RunOutcome::Aborted;
            }
            state.phase = RunPhase::Idle;
        }

        error!(error = %error, "Download failed");
        self.events.emit(&DownloadEvent::Error(Arc::new(error)));
        RunOutcome::Failed
    }
}
