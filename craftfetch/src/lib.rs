//! craftfetch - concurrent downloader for game install manifests
//!
//! Given a build manifest, this library works out every file the build
//! needs on the current platform (asset objects, library jars, native jars
//! and the logging config), skips the ones already on disk, and downloads
//! the rest with bounded concurrency while reporting progress.
//!
//! Entry point is [`download::Downloader`].

pub mod config;
pub mod download;
pub mod error;
pub mod io;
pub mod logging;
pub mod manifest;
pub mod platform;

pub use config::DownloaderConfig;
pub use download::{DownloadEvent, Downloader, RunOutcome};
pub use error::{DownloadError, DownloadResult};
pub use manifest::PackageManifest;
pub use platform::Platform;
