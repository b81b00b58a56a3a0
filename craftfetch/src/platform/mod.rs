//! Target platform identification.
//!
//! Manifests name operating systems loosely ("osx", "windows", "linux"), and
//! hosts report them in yet another spelling. Everything is folded into the
//! three canonical [`Platform`] values before rules or classifiers are
//! consulted.
//!
//! # Example
//!
//! ```
//! use craftfetch::platform::{normalize, Platform};
//!
//! assert_eq!(normalize("osx").unwrap(), Platform::Darwin);
//! assert_eq!(Platform::Win32.native_classifier_key(), "natives-windows");
//! ```

pub mod rules;

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

pub use rules::{platform_matcher, should_include, Os, Rule, RuleAction};

static DARWIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)osx|darwin|mac").expect("valid darwin pattern"));
static WIN32: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)win").expect("valid win32 pattern"));
static LINUX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)linux").expect("valid linux pattern"));

/// Errors raised while identifying a platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// The identifier does not map to a supported platform.
    #[error("unsupported platform: {0}")]
    Unsupported(String),
}

/// Canonical platform identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Darwin,
    Win32,
    Linux,
}

impl Platform {
    /// Detect the platform of the running host.
    pub fn current() -> Result<Self, PlatformError> {
        normalize(std::env::consts::OS)
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Darwin => "darwin",
            Self::Win32 => "win32",
            Self::Linux => "linux",
        }
    }

    /// Key of the native-library classifier published for this platform.
    pub fn native_classifier_key(&self) -> &'static str {
        match self {
            Self::Darwin => "natives-macos",
            Self::Win32 => "natives-windows",
            Self::Linux => "natives-linux",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

/// Fold a raw platform identifier into a canonical [`Platform`].
///
/// Matching is case-insensitive and by substring. The darwin patterns are
/// tried first since "darwin" itself contains "win".
pub fn normalize(raw: &str) -> Result<Platform, PlatformError> {
    if DARWIN.is_match(raw) {
        Ok(Platform::Darwin)
    } else if WIN32.is_match(raw) {
        Ok(Platform::Win32)
    } else if LINUX.is_match(raw) {
        Ok(Platform::Linux)
    } else {
        Err(PlatformError::Unsupported(raw.to_string()))
    }
}

/// Classifier key for a raw platform identifier.
pub fn native_classifier_key(raw: &str) -> Result<&'static str, PlatformError> {
    normalize(raw).map(|p| p.native_classifier_key())
}
