//! Run state of a downloader.
//!
//! A downloader runs at most one download at a time. Its state moves
//! `Idle -> Preparing -> Running -> Idle`; an abort drops it back to `Idle`
//! from anywhere. Each run is identified by a generation number and owns a
//! cancellation token, so work left over from an aborted run can recognise
//! that the state no longer belongs to it.

use tokio_util::sync::CancellationToken;

use super::item::Downloadable;
use super::queue::WorkPool;

/// Lifecycle phase of a downloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    /// No run in progress.
    #[default]
    Idle,
    /// Resolving the manifest and filtering existing files.
    Preparing,
    /// Downloading items.
    Running,
}

/// Point-in-time copy of the run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSnapshot {
    pub phase: RunPhase,
    /// Items to download in the current or last run.
    pub total: usize,
    /// Items written so far.
    pub loaded: usize,
    /// Items not yet picked up by a worker.
    pub pending: usize,
}

impl RunSnapshot {
    /// Returns true if a run is preparing or running.
    pub fn is_busy(&self) -> bool {
        self.phase != RunPhase::Idle
    }

    /// Get the progress as a percentage of items written.
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.loaded as f64 / self.total as f64) * 100.0
        }
    }
}

/// Identity of one run, held by the code driving it.
#[derive(Debug, Clone)]
pub(crate) struct RunTicket {
    pub generation: u64,
    pub token: CancellationToken,
    pub pool: WorkPool<Downloadable>,
}

/// Mutable run state, guarded by the downloader's lock.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    pub phase: RunPhase,
    pub total: usize,
    pub loaded: usize,
    pub items: WorkPool<Downloadable>,
    generation: u64,
    token: CancellationToken,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run, or return `None` if one is already active.
    pub fn begin(&mut self) -> Option<RunTicket> {
        if self.phase != RunPhase::Idle {
            return None;
        }

        self.generation += 1;
        self.token = CancellationToken::new();
        self.items = WorkPool::new();
        self.total = 0;
        self.loaded = 0;
        self.phase = RunPhase::Preparing;

        Some(RunTicket {
            generation: self.generation,
            token: self.token.clone(),
            pool: self.items.clone(),
        })
    }

    /// Returns true while `run` is the active, uncancelled run.
    pub fn is_live(&self, run: &RunTicket) -> bool {
        run.generation == self.generation && !run.token.is_cancelled()
    }

    /// Count one written item. Returns `(total, loaded)` or `None` if `run`
    /// is no longer live.
    pub fn record_loaded(&mut self, run: &RunTicket) -> Option<(usize, usize)> {
        if !self.is_live(run) {
            return None;
        }
        self.loaded = (self.loaded + 1).min(self.total);
        Some((self.total, self.loaded))
    }

    /// Cancel the active run, if any, and reset.
    pub fn cancel(&mut self) {
        self.token.cancel();
        self.reset();
    }

    /// Back to idle with empty counters and pool.
    ///
    /// The old pool is emptied and detached so that workers still holding it
    /// stop pulling items, and cannot pull items of a later run.
    pub fn reset(&mut self) {
        self.items.clear();
        self.items = WorkPool::new();
        self.total = 0;
        self.loaded = 0;
        self.phase = RunPhase::Idle;
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            phase: self.phase,
            total: self.total,
            loaded: self.loaded,
            pending: self.items.len(),
        }
    }
}
