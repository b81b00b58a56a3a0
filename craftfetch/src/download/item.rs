//! The unit of download work.

use std::fmt;
use std::path::{Path, PathBuf};

/// A remote URL paired with the local path it is written to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Downloadable {
    name: String,
    url: String,
    destination: PathBuf,
}

impl Downloadable {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            destination: destination.into(),
        }
    }

    /// Display name used in progress events and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

impl fmt::Display for Downloadable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} -> {})", self.name, self.url, self.destination.display())
    }
}
