//! Error types for download runs.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::platform::PlatformError;

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors that can terminate a download run.
///
/// None of these are retried. Any error raised while resolving, filtering or
/// downloading ends the run and is reported through the error event.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The platform identifier is not one of darwin, win32 or linux.
    #[error(transparent)]
    UnsupportedPlatform(#[from] PlatformError),

    /// Transport failure while fetching a URL.
    #[error("failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Failed to write a file.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to read a file.
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to check whether a file exists.
    #[error("failed to probe {}: {source}", path.display())]
    ProbeFailed { path: PathBuf, source: io::Error },

    /// The asset index document is not valid JSON of the expected shape.
    #[error("failed to parse asset index {}: {source}", path.display())]
    IndexParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// An asset object carries a hash that is short or not hexadecimal.
    #[error("asset {name} has invalid hash {hash:?}")]
    InvalidAssetHash { name: String, hash: String },

    /// A manifest path is absolute or climbs out of its directory.
    #[error("{name} has unsafe path {path:?}")]
    UnsafePath { name: String, path: String },
}

impl DownloadError {
    /// Returns true if the failure came from the network side of a run.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::FetchFailed { .. } | Self::HttpStatus { .. })
    }

    /// Returns true if the failure came from writing to disk.
    pub fn is_write_failure(&self) -> bool {
        matches!(self, Self::WriteFailed { .. })
    }
}
