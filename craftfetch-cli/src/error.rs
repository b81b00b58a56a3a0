//! CLI error type.

use std::fmt;
use std::path::PathBuf;

use craftfetch::config::ConfigError;
use craftfetch::error::DownloadError;
use craftfetch::logging::LoggingError;
use craftfetch::platform::PlatformError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid configuration or arguments.
    Config(String),

    /// Failed to set up logging.
    Logging(LoggingError),

    /// The manifest could not be loaded.
    Manifest { source: String, reason: String },

    /// The platform is not supported.
    Platform(PlatformError),

    /// Resolution or download failed.
    Download(DownloadError),

    /// The run failed; the cause was reported by an error event.
    RunFailed(String),

    /// The run was interrupted.
    Aborted,

    /// Clearing the cached asset indexes failed.
    RefreshIndex { path: PathBuf, reason: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::Manifest { source, reason } => {
                write!(f, "Failed to load manifest {}: {}", source, reason)
            }
            CliError::Platform(e) => write!(f, "{}", e),
            CliError::Download(e) => write!(f, "Download failed: {}", e),
            CliError::RunFailed(cause) => write!(f, "Download failed: {}", cause),
            CliError::Aborted => write!(f, "Download aborted"),
            CliError::RefreshIndex { path, reason } => {
                write!(
                    f,
                    "Failed to clear asset indexes at {}: {}",
                    path.display(),
                    reason
                )
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Logging(e) => Some(e),
            CliError::Platform(e) => Some(e),
            CliError::Download(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<PlatformError> for CliError {
    fn from(e: PlatformError) -> Self {
        CliError::Platform(e)
    }
}

impl From<DownloadError> for CliError {
    fn from(e: DownloadError) -> Self {
        CliError::Download(e)
    }
}
