//! `craftfetch download`: fetch every missing file of a manifest.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use console::style;
use craftfetch::download::{DownloadEvent, Downloader, RunOutcome, ASSET_INDEXES_DIR};
use craftfetch::io::{FileSystem, TokioFileSystem};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;

use super::common::ManifestArgs;
use crate::error::CliError;

/// Arguments for the download command.
#[derive(Debug, Args)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Discard cached asset indexes and fetch them again
    #[arg(long)]
    pub refresh_index: bool,
}

/// Run the download command.
pub async fn run(args: DownloadArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let config = args.manifest.resolve_config(config_path)?;
    let platform = args.manifest.resolve_platform()?;
    let manifest = args.manifest.load_manifest(&config).await?;

    println!(
        "{} {} for {} into {}",
        style("Downloading").cyan().bold(),
        style(&manifest.id).white().bold(),
        platform,
        config.working_dir.display()
    );

    if args.refresh_index {
        refresh_indexes(&config.working_dir.join(ASSET_INDEXES_DIR)).await?;
    }

    let downloader = Downloader::with_network(&config, platform)
        .map_err(|e| CliError::Config(format!("Failed to create HTTP client: {}", e)))?;
    let downloader = Arc::new(downloader);

    let bar = progress_bar();
    let progress_bar = bar.clone();
    downloader.on_progress(move |p| {
        progress_bar.set_length(p.total as u64);
        progress_bar.set_position(p.loaded as u64);
        progress_bar.set_message(p.current.clone());
    });
    let (events_id, events) = downloader.events().channel();

    let interrupted = Arc::clone(&downloader);
    let interrupts = Interrupts::default();
    ctrlc::set_handler(move || {
        if interrupts.record() {
            eprintln!();
            eprintln!("Stopping, press Ctrl+C again to exit immediately...");
            interrupted.abort();
        } else {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let outcome = downloader.download(&manifest).await;
    downloader.events().unsubscribe(events_id);
    report(outcome, &bar, events)
}

/// Exit status for a second interrupt (128 + SIGINT).
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Counts interrupt signals received during a run.
#[derive(Debug, Default)]
struct Interrupts(AtomicUsize);

impl Interrupts {
    /// Record a signal. Returns true for the first one only.
    fn record(&self) -> bool {
        self.0.fetch_add(1, Ordering::SeqCst) == 0
    }
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_message("Resolving manifest...");
    bar
}

fn report(
    outcome: RunOutcome,
    bar: &ProgressBar,
    mut events: UnboundedReceiver<DownloadEvent>,
) -> Result<(), CliError> {
    let mut loaded = 0;
    let mut cause = None;
    while let Ok(event) = events.try_recv() {
        match event {
            DownloadEvent::Progress(p) => loaded = p.loaded,
            DownloadEvent::Error(e) => cause = Some(e.to_string()),
            _ => {}
        }
    }

    bar.finish_and_clear();
    match outcome {
        RunOutcome::Finished if loaded == 0 => {
            println!("{} Everything is up to date", style("[OK]").green());
            Ok(())
        }
        RunOutcome::Finished => {
            println!("{} Downloaded {} files", style("[OK]").green(), loaded);
            Ok(())
        }
        RunOutcome::Failed => Err(CliError::RunFailed(
            cause.unwrap_or_else(|| "unknown error".to_string()),
        )),
        RunOutcome::Aborted => {
            println!("{} Stopped after {} files", style("[!]").yellow(), loaded);
            Err(CliError::Aborted)
        }
        RunOutcome::AlreadyRunning => Err(CliError::Config(
            "a download is already running".to_string(),
        )),
    }
}

async fn refresh_indexes(path: &Path) -> Result<(), CliError> {
    match TokioFileSystem::new().remove_dir(path).await {
        Ok(()) => {
            tracing::info!(path = %path.display(), "Cleared cached asset indexes");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CliError::RefreshIndex {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}
