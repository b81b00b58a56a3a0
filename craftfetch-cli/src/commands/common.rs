//! Arguments and helpers shared by the download and plan commands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use craftfetch::config::{default_config_path, DownloaderConfig};
use craftfetch::io::{Fetcher, ReqwestFetcher};
use craftfetch::platform::{normalize, Platform};
use craftfetch::PackageManifest;

use crate::error::CliError;

/// Where to read the manifest from and how to lay out files.
#[derive(Debug, Clone, Args)]
pub struct ManifestArgs {
    /// Build manifest, as a file path or an http(s) URL
    pub manifest: String,

    /// Directory files are downloaded into (overrides working_dir)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Target platform: linux, windows or osx (defaults to this machine)
    #[arg(short, long)]
    pub platform: Option<String>,

    /// Maximum concurrent downloads (overrides concurrency)
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Base URL for asset objects (overrides resource_endpoint)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// HTTP request timeout in seconds (overrides timeout_secs)
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl ManifestArgs {
    /// Resolve settings: config file first, then command-line overrides.
    pub fn resolve_config(&self, config_path: Option<&Path>) -> Result<DownloaderConfig, CliError> {
        let mut config = load_config(config_path)?;

        if let Some(dir) = &self.dir {
            config.working_dir = dir.clone();
        }
        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 {
                return Err(CliError::Config(
                    "--concurrency must be at least 1".to_string(),
                ));
            }
            config.concurrency = concurrency;
        }
        if let Some(endpoint) = &self.endpoint {
            config.resource_endpoint = endpoint.clone();
        }
        if let Some(secs) = self.timeout {
            config.timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// The requested platform, or the one this binary runs on.
    pub fn resolve_platform(&self) -> Result<Platform, CliError> {
        let platform = match &self.platform {
            Some(raw) => normalize(raw)?,
            None => Platform::current()?,
        };
        Ok(platform)
    }

    /// Read and parse the manifest.
    pub async fn load_manifest(&self, config: &DownloaderConfig) -> Result<PackageManifest, CliError> {
        let text = if is_url(&self.manifest) {
            fetch_manifest(&self.manifest, config).await?
        } else {
            tokio::fs::read_to_string(&self.manifest)
                .await
                .map_err(|e| self.manifest_error(e))?
        };

        PackageManifest::from_json(&text).map_err(|e| self.manifest_error(e))
    }

    fn manifest_error(&self, reason: impl ToString) -> CliError {
        CliError::Manifest {
            source: self.manifest.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Load the explicit config file, else the default one if present, else
/// built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<DownloaderConfig, CliError> {
    if let Some(path) = explicit {
        return Ok(DownloaderConfig::load(path)?);
    }

    match default_config_path() {
        Some(path) if path.is_file() => {
            tracing::debug!(path = %path.display(), "Loading default config file");
            Ok(DownloaderConfig::load(&path)?)
        }
        _ => Ok(DownloaderConfig::default()),
    }
}

pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

async fn fetch_manifest(url: &str, config: &DownloaderConfig) -> Result<String, CliError> {
    let manifest_error = |reason: String| CliError::Manifest {
        source: url.to_string(),
        reason,
    };

    let fetcher = match config.timeout {
        Some(timeout) => ReqwestFetcher::with_timeout(timeout),
        None => ReqwestFetcher::new(),
    }
    .map_err(|e| manifest_error(e.reason))?;

    let response = fetcher.fetch(url).await.map_err(|e| manifest_error(e.reason))?;
    if !response.is_success() {
        return Err(manifest_error(format!("HTTP {}", response.status)));
    }
    response.text().map_err(|e| manifest_error(e.reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(manifest: &str) -> ManifestArgs {
        ManifestArgs {
            manifest: manifest.to_string(),
            dir: None,
            platform: None,
            concurrency: None,
            endpoint: None,
            timeout: None,
        }
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://meta.example.com/1.17.json"));
        assert!(is_url("http://localhost/1.17.json"));
        assert!(!is_url("./1.17.json"));
        assert!(!is_url("/srv/manifests/https.json"));
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[downloader]\nworking_dir = /from/config\nconcurrency = 8\ntimeout_secs = 30"
        )
        .unwrap();

        let mut args = args("m.json");
        args.dir = Some(PathBuf::from("/from/flag"));
        args.timeout = Some(5);

        let config = args.resolve_config(Some(file.path())).unwrap();

        assert_eq!(config.working_dir, PathBuf::from("/from/flag"));
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut args = args("m.json");
        args.concurrency = Some(0);
        let file = tempfile::NamedTempFile::new().unwrap();

        assert!(matches!(
            args.resolve_config(Some(file.path())),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_platform_flag_is_normalized() {
        let mut args = args("m.json");
        args.platform = Some("Windows".to_string());
        assert_eq!(args.resolve_platform().unwrap(), Platform::Win32);

        args.platform = Some("amiga".to_string());
        assert!(matches!(args.resolve_platform(), Err(CliError::Platform(_))));
    }

    #[tokio::test]
    async fn test_load_manifest_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"id": "1.17.1", "assetIndex": {{"id": "5", "url": "https://x/5.json"}}}}"#
        )
        .unwrap();
        let args = args(file.path().to_str().unwrap());

        let manifest = args.load_manifest(&DownloaderConfig::default()).await.unwrap();

        assert_eq!(manifest.id, "1.17.1");
        assert!(manifest.libraries.is_empty());
    }

    #[tokio::test]
    async fn test_load_manifest_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(dir.path().join("absent.json").to_str().unwrap());

        let err = args.load_manifest(&DownloaderConfig::default()).await.unwrap_err();

        assert!(matches!(err, CliError::Manifest { .. }));
    }
}
