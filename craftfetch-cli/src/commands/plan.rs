//! `craftfetch plan`: list the files a download would fetch.

use std::path::Path;

use clap::Args;
use console::style;
use craftfetch::download::{Downloadable, Downloader};

use super::common::ManifestArgs;
use crate::error::CliError;

/// Arguments for the plan command.
#[derive(Debug, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Print source URLs instead of destinations
    #[arg(long)]
    pub urls: bool,
}

/// Run the plan command.
pub async fn run(args: PlanArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let config = args.manifest.resolve_config(config_path)?;
    let platform = args.manifest.resolve_platform()?;
    let manifest = args.manifest.load_manifest(&config).await?;

    let downloader = Downloader::with_network(&config, platform)
        .map_err(|e| CliError::Config(format!("Failed to create HTTP client: {}", e)))?;
    let items = downloader.plan(&manifest).await?;

    for line in render(&items, args.urls) {
        println!("{}", line);
    }
    println!();
    println!(
        "{} files missing for {} on {}",
        style(items.len()).white().bold(),
        manifest.id,
        platform
    );
    Ok(())
}

fn render(items: &[Downloadable], urls: bool) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let target = if urls {
                item.url().to_string()
            } else {
                item.destination().display().to_string()
            };
            format!("{}  {}", item.name(), target)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let items = vec![Downloadable::new(
            "org.lwjgl:lwjgl:3.2.2",
            "https://libs.example.com/lwjgl.jar",
            "/games/libraries/org/lwjgl/lwjgl-3.2.2.jar",
        )];

        assert_eq!(
            render(&items, false),
            vec!["org.lwjgl:lwjgl:3.2.2  /games/libraries/org/lwjgl/lwjgl-3.2.2.jar"]
        );
        assert_eq!(
            render(&items, true),
            vec!["org.lwjgl:lwjgl:3.2.2  https://libs.example.com/lwjgl.jar"]
        );
    }
}
