//! In-memory capability adapters.
//!
//! Used by the test suites and by dry runs that must not touch the network
//! or the disk.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::{BoxFuture, FetchError, FetchResponse, Fetcher, FileSystem};

/// [`FileSystem`] keeping file contents in a map.
///
/// A path "exists" if a file is stored at it or below it, so directories
/// exist implicitly once they contain a file.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<PathBuf, Bytes>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a file without counting it as a write.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Bytes>) {
        self.files.lock().insert(path.into(), contents.into());
    }

    /// Contents of the file at `path`, if any.
    pub fn get(&self, path: &Path) -> Option<Bytes> {
        self.files.lock().get(path).cloned()
    }

    /// All stored file paths in sorted order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().keys().cloned().collect()
    }

    /// Number of successful `write` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent `write` fail with `PermissionDenied`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn contains(&self, path: &Path) -> bool {
        let files = self.files.lock();
        files.contains_key(path) || files.keys().any(|p| p.starts_with(path))
    }
}

impl FileSystem for MemoryFileSystem {
    fn write(&self, path: &Path, contents: Bytes) -> BoxFuture<'_, io::Result<()>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "writes disabled",
                ));
            }
            self.files.lock().insert(path, contents);
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn read_to_string(&self, path: &Path) -> BoxFuture<'_, io::Result<String>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            let contents = self
                .get(&path)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))?;
            String::from_utf8(contents.to_vec())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        })
    }

    fn exists(&self, path: &Path) -> BoxFuture<'_, io::Result<bool>> {
        let path = path.to_path_buf();
        Box::pin(async move { Ok(self.contains(&path)) })
    }

    fn remove_dir(&self, path: &Path) -> BoxFuture<'_, io::Result<()>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            self.files.lock().retain(|p, _| !p.starts_with(&path));
            Ok(())
        })
    }
}

/// [`Fetcher`] answering from a table of canned responses.
///
/// Unknown URLs answer 404. An optional gate semaphore holds every request
/// until a permit is released, which lets tests step a run one item at a
/// time.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    responses: Mutex<HashMap<String, FetchResponse>>,
    broken: Mutex<HashSet<String>>,
    requests: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each request until `gate` hands out a permit.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Answer `url` with a 200 and `body`.
    pub fn insert(&self, url: impl Into<String>, body: impl Into<Bytes>) {
        self.insert_response(url, FetchResponse::new(200, body));
    }

    /// Answer `url` with `response`.
    pub fn insert_response(&self, url: impl Into<String>, response: FetchResponse) {
        self.responses.lock().insert(url.into(), response);
    }

    /// Fail requests to `url` at the transport level.
    pub fn break_url(&self, url: impl Into<String>) {
        self.broken.lock().insert(url.into());
    }

    /// URLs requested so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'_, Result<FetchResponse, FetchError>> {
        let url = url.to_string();
        Box::pin(async move {
            self.requests.lock().push(url.clone());

            if let Some(gate) = &self.gate {
                gate.acquire()
                    .await
                    .map_err(|_| FetchError::new("gate closed"))?
                    .forget();
            }

            if self.broken.lock().contains(&url) {
                return Err(FetchError::new(format!("connection reset: {}", url)));
            }

            Ok(self
                .responses
                .lock()
                .get(&url)
                .cloned()
                .unwrap_or_else(|| FetchResponse::new(404, Bytes::new())))
        })
    }
}
