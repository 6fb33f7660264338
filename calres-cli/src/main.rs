mod commands;
mod logging;
mod render;
mod singleton;
mod utils;

use std::path::{Path, PathBuf};

use anyhow::Result;
use calres_core::ItemKind;
use calres_core::config::CalresConfig;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "calres")]
#[command(about = "Keep the local resource and room cache in sync with its backends")]
struct Cli {
    /// Use this config file instead of ~/.config/calres/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log every change applied to the cache
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Update the cache once
    Sync {
        /// Only update this kind (resources or rooms)
        #[arg(short, long)]
        kind: Option<ItemKind>,

        /// Show every changed item, even for large changes
        #[arg(short, long)]
        verbose: bool,
    },
    /// Update the cache at a fixed interval until interrupted
    Watch {
        /// Time between runs (e.g. "15m", "1h"), overrides the configured interval
        #[arg(short, long)]
        interval: Option<String>,
    },
    /// Show cached items per backend
    Status,
    /// List cached items with their metadata
    List {
        /// resources or rooms
        kind: ItemKind,

        /// Only list items of this backend
        #[arg(short, long)]
        backend: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Watch { .. } => "info",
        _ => "warn",
    };
    logging::init(cli.debug, default_level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync { kind, verbose } => commands::sync::run(&config, kind, verbose).await,
        Commands::Watch { interval } => {
            let interval = match interval {
                Some(s) => humantime::parse_duration(&s)
                    .map_err(|e| anyhow::anyhow!("Invalid interval '{}': {}", s, e))?,
                None => config.interval()?,
            };
            commands::watch::run(&config, interval).await
        }
        Commands::Status => commands::status::run(&config),
        Commands::List { kind, backend } => commands::list::run(&config, kind, backend.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<CalresConfig> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file '{}' not found", path.display());
            }
            Ok(CalresConfig::load_from(path)?)
        }
        None => Ok(CalresConfig::load()?),
    }
}
