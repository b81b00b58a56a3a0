//! File-system adapter backed by `tokio::fs`.
//!
//! Writes land in a sibling `<name>.part` file first and are renamed into
//! place once complete, so a destination that exists is always whole.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use super::{BoxFuture, FileSystem};

/// Production [`FileSystem`] using the tokio blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for TokioFileSystem {
    fn write(&self, path: &Path, contents: Bytes) -> BoxFuture<'_, io::Result<()>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let part = part_path(&path);
            let written = match tokio::fs::write(&part, &contents).await {
                Ok(()) => tokio::fs::rename(&part, &path).await,
                Err(e) => Err(e),
            };
            if written.is_err() {
                let _ = tokio::fs::remove_file(&part).await;
            }
            written
        })
    }

    fn read_to_string(&self, path: &Path) -> BoxFuture<'_, io::Result<String>> {
        let path = path.to_path_buf();
        Box::pin(async move { tokio::fs::read_to_string(&path).await })
    }

    fn exists(&self, path: &Path) -> BoxFuture<'_, io::Result<bool>> {
        let path = path.to_path_buf();
        Box::pin(async move { tokio::fs::try_exists(&path).await })
    }

    fn remove_dir(&self, path: &Path) -> BoxFuture<'_, io::Result<()>> {
        let path = path.to_path_buf();
        Box::pin(async move { tokio::fs::remove_dir_all(&path).await })
    }
}

/// Temporary sibling a write goes through before the rename.
fn part_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}
