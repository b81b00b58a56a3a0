//! Tracing subscriber setup.
//!
//! The library only emits `tracing` events; binaries call [`init`] once to
//! print them. The filter defaults to the configured level and can be
//! overridden with the `CRAFTFETCH_LOG` environment variable using the usual
//! `EnvFilter` directive syntax (`CRAFTFETCH_LOG=craftfetch=trace`).

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding filter directives.
pub const LOG_ENV_VAR: &str = "CRAFTFETCH_LOG";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("log file path has no file name: {0}")]
    InvalidFile(PathBuf),

    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Subscriber settings.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level used when `CRAFTFETCH_LOG` is unset.
    pub level: LevelFilter,
    /// Also write plain-text logs to this file.
    pub file: Option<PathBuf>,
    /// Colour terminal output.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            file: None,
            ansi: true,
        }
    }
}

impl LogConfig {
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }
}

/// Install the global subscriber.
///
/// Terminal output goes to stderr. When a log file is configured the
/// returned guard flushes it on drop, so keep it alive until exit.
pub fn init(config: LogConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy();

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let (dir, name) = split_log_path(path)?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(config.ansi),
        )
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf), LoggingError> {
    let name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidFile(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, PathBuf::from(name)))
}
