//! Downloader configuration.
//!
//! Settings come from built-in defaults, optionally overlaid by the
//! `[downloader]` section of an INI file:
//!
//! ```ini
//! [downloader]
//! working_dir = /games/craft
//! concurrency = 32
//! resource_endpoint = https://mirror.example.com/assets
//! timeout_secs = 60
//! ```
//!
//! Keys that are absent keep their default. Unknown keys are ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::download::RESOURCE_ENDPOINT;

/// Default number of concurrent item downloads.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// INI section holding downloader settings.
pub const CONFIG_SECTION: &str = "downloader";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config file {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] ini::ParseError),

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Configuration for a [`Downloader`](crate::download::Downloader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloaderConfig {
    /// Root directory files are laid out under.
    pub working_dir: PathBuf,

    /// Maximum concurrent item downloads.
    pub concurrency: usize,

    /// Base URL asset objects are served from.
    pub resource_endpoint: String,

    /// Per-request HTTP timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            concurrency: DEFAULT_CONCURRENCY,
            resource_endpoint: RESOURCE_ENDPOINT.to_string(),
            timeout: None,
        }
    }
}

impl DownloaderConfig {
    /// Create a configuration laying files out under `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Default::default()
        }
    }

    /// Set the maximum concurrent downloads.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the asset object base URL.
    pub fn with_resource_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.resource_endpoint = endpoint.into();
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Load defaults overlaid with the INI file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Self::default().merge_ini(&ini)
    }

    /// Load defaults overlaid with INI `text`.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text)?;
        Self::default().merge_ini(&ini)
    }

    fn merge_ini(mut self, ini: &Ini) -> Result<Self, ConfigError> {
        let Some(section) = ini.section(Some(CONFIG_SECTION)) else {
            return Ok(self);
        };

        if let Some(dir) = section.get("working_dir") {
            self.working_dir = PathBuf::from(dir.trim());
        }
        if let Some(value) = section.get("concurrency") {
            self.concurrency = parse_positive("concurrency", value)?;
        }
        if let Some(endpoint) = section.get("resource_endpoint") {
            self.resource_endpoint = endpoint.trim().to_string();
        }
        if let Some(value) = section.get("timeout_secs") {
            let secs = parse_positive("timeout_secs", value)?;
            self.timeout = Some(Duration::from_secs(secs as u64));
        }

        Ok(self)
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    match value.trim().parse::<usize>() {
        Ok(0) => Err(invalid("must be at least 1")),
        Ok(n) => Ok(n),
        Err(_) => Err(invalid("expected a whole number")),
    }
}

/// Default root directory: `<data dir>/craftfetch`.
pub fn default_working_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("craftfetch"))
        .unwrap_or_else(|| PathBuf::from(".craftfetch"))
}

/// Default config file location: `<config dir>/craftfetch/config.ini`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("craftfetch").join("config.ini"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DownloaderConfig::default();
        assert_eq!(config.concurrency, 20);
        assert_eq!(config.resource_endpoint, RESOURCE_ENDPOINT);
        assert!(config.timeout.is_none());
        assert!(config.working_dir.ends_with("craftfetch"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = DownloaderConfig::new("/games/craft")
            .with_concurrency(4)
            .with_resource_endpoint("https://mirror.example.com")
            .with_timeout(Duration::from_secs(10));

        assert_eq!(config.working_dir, PathBuf::from("/games/craft"));
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.resource_endpoint, "https://mirror.example.com");
        assert_eq!(config.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_ini_overrides_defaults() {
        let config = DownloaderConfig::from_ini_str(
            "[downloader]\n\
             working_dir = /games/craft\n\
             concurrency = 32\n\
             resource_endpoint = https://mirror.example.com/assets\n\
             timeout_secs = 60\n",
        )
        .unwrap();

        assert_eq!(config.working_dir, PathBuf::from("/games/craft"));
        assert_eq!(config.concurrency, 32);
        assert_eq!(config.resource_endpoint, "https://mirror.example.com/assets");
        assert_eq!(config.timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_missing_keys_keep_defaults() {
        let config = DownloaderConfig::from_ini_str("[downloader]\nconcurrency = 8\n").unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.resource_endpoint, RESOURCE_ENDPOINT);
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_missing_section_is_default() {
        let config = DownloaderConfig::from_ini_str("[other]\nconcurrency = 8\n").unwrap();
        assert_eq!(config, DownloaderConfig::default());
    }

    #[test]
    fn test_invalid_concurrency() {
        let err = DownloaderConfig::from_ini_str("[downloader]\nconcurrency = lots\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "concurrency"));

        let err = DownloaderConfig::from_ini_str("[downloader]\nconcurrency = 0\n").unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[downloader]\ntimeout_secs = 5").unwrap();

        let config = DownloaderConfig::load(file.path()).unwrap();

        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DownloaderConfig::load(&dir.path().join("absent.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Load { .. }));
    }
}
