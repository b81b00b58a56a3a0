//! Manifest download pipeline.
//!
//! This module turns an install manifest into files on disk:
//! - Manifest expansion into download items (`resolver`)
//! - Removal of items already on disk (`filter`)
//! - A shared LIFO work pool drained by bounded workers (`queue`)
//! - Run lifecycle tracking (`state`)
//! - Event publication to subscribers (`events`)
//! - High-level orchestration (`orchestrator`)
//!
//! # Architecture
//!
//! ```text
//! Downloader (orchestrator)
//!         │
//!         ├── ManifestResolver ──► assets + libraries + logging config
//!         │
//!         ├── filter_missing ────► drops items whose file exists
//!         │
//!         ├── run_bounded(WorkPool) ──► N workers: fetch ► write ► progress
//!         │
//!         ├── RunState (phase, counters, cancellation)
//!         │
//!         └── EventBus (progress / error / abort / finish)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use craftfetch::config::DownloaderConfig;
//! use craftfetch::download::{Downloader, RunOutcome};
//! use craftfetch::platform::Platform;
//!
//! let config = DownloaderConfig::new("/games/craft");
//! let downloader = Downloader::with_network(&config, Platform::current()?)?;
//!
//! downloader.on_progress(|p| println!("{}/{} {}", p.loaded, p.total, p.current));
//!
//! match downloader.download(&manifest).await {
//!     RunOutcome::Finished => println!("done"),
//!     other => println!("stopped: {:?}", other),
//! }
//! ```

mod events;
mod filter;
mod item;
mod orchestrator;
mod queue;
mod resolver;
mod state;

pub use events::{DownloadEvent, EventBus, EventKind, Progress, SubscriptionId};
pub use filter::filter_missing;
pub use item::Downloadable;
pub use orchestrator::{Downloader, RunOutcome};
pub use queue::{run_bounded, WorkPool};
pub use resolver::{
    ManifestResolver, ASSET_INDEXES_DIR, ASSET_OBJECTS_DIR, LIBRARIES_DIR, LOG_CONFIGS_DIR,
    RESOURCE_ENDPOINT,
};
pub use state::{RunPhase, RunSnapshot};
