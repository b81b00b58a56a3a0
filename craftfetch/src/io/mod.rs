//! Capability interfaces for network and file-system access.
//!
//! The download engine never touches the network or the disk directly. It
//! goes through the [`Fetcher`] and [`FileSystem`] traits so that callers can
//! supply their own adapters:
//!
//! - [`ReqwestFetcher`] / [`TokioFileSystem`]: production adapters
//! - [`MemoryFetcher`] / [`MemoryFileSystem`]: in-memory adapters for tests
//!   and dry runs
//!
//! Both traits return boxed futures so they can be used as trait objects
//! (`Arc<dyn Fetcher>`), and implementations must tolerate concurrent calls.

mod fs;
mod http;
mod memory;

pub use fs::TokioFileSystem;
pub use http::ReqwestFetcher;
pub use memory::{MemoryFetcher, MemoryFileSystem};

use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;

use bytes::Bytes;
use thiserror::Error;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Transport-level failure of a fetch.
///
/// A response with an error status is not a `FetchError`; it is returned as
/// a [`FetchResponse`] and judged by the caller.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct FetchError {
    pub reason: String,
}

impl FetchError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8.
    pub fn text(&self) -> Result<String, FetchError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| FetchError::new(format!("response body is not UTF-8: {}", e)))
    }

    /// Raw body bytes.
    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }
}

/// Fetches remote resources.
pub trait Fetcher: Send + Sync {
    /// GET `url` and buffer the whole body.
    fn fetch(&self, url: &str) -> BoxFuture<'_, Result<FetchResponse, FetchError>>;
}

/// File-system operations used by the downloader.
pub trait FileSystem: Send + Sync {
    /// Write `contents` to `path`, creating parent directories and replacing
    /// any existing file.
    fn write(&self, path: &Path, contents: Bytes) -> BoxFuture<'_, io::Result<()>>;

    /// Read a whole file as UTF-8 text.
    fn read_to_string(&self, path: &Path) -> BoxFuture<'_, io::Result<String>>;

    /// Check whether a file or directory exists at `path`.
    fn exists(&self, path: &Path) -> BoxFuture<'_, io::Result<bool>>;

    /// Remove a directory and everything below it.
    fn remove_dir(&self, path: &Path) -> BoxFuture<'_, io::Result<()>>;
}
