//! craftfetch CLI - Command-line interface
//!
//! Downloads the assets, libraries and logging config of a game build
//! manifest using the craftfetch library.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use craftfetch::logging::{self, LogConfig};
use tracing::level_filters::LevelFilter;

use commands::download::DownloadArgs;
use commands::plan::PlanArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "craftfetch", version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (defaults to <config dir>/craftfetch/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download every file of a manifest that is not on disk yet
    Download(DownloadArgs),

    /// List the files a download would fetch
    Plan(PlanArgs),
}

fn level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut log_config = LogConfig::default().with_level(level(cli.verbose));
    log_config.ansi = console::colors_enabled_stderr();
    if let Some(path) = &cli.log_file {
        log_config = log_config.with_file(path);
    }
    let _guard = logging::init(log_config)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Download(args) => commands::download::run(args, config_path).await,
        Commands::Plan(args) => commands::plan::run(args, config_path).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_download() {
        let cli = Cli::try_parse_from([
            "craftfetch",
            "-vv",
            "download",
            "1.17.1.json",
            "--dir",
            "/games/craft",
            "-j",
            "8",
            "--refresh-index",
        ])
        .unwrap();

        assert_eq!(level(cli.verbose), LevelFilter::DEBUG);
        let Commands::Download(args) = cli.command else {
            panic!("expected download");
        };
        assert_eq!(args.manifest.manifest, "1.17.1.json");
        assert_eq!(args.manifest.dir, Some(PathBuf::from("/games/craft")));
        assert_eq!(args.manifest.concurrency, Some(8));
        assert!(args.refresh_index);
    }

    #[test]
    fn test_parse_plan() {
        let cli = Cli::try_parse_from([
            "craftfetch",
            "plan",
            "https://meta.example.com/1.17.1.json",
            "--platform",
            "osx",
            "--urls",
        ])
        .unwrap();

        let Commands::Plan(args) = cli.command else {
            panic!("expected plan");
        };
        assert_eq!(args.manifest.platform.as_deref(), Some("osx"));
        assert!(args.urls);
        assert_eq!(level(cli.verbose), LevelFilter::WARN);
    }
}
