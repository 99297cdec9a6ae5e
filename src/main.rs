//! sdkdeps - prepares the Android SDK pieces other builds compile against.

use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sdkdeps::commands::{self, Command};
use sdkdeps::core::AppConfig;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "sdkdeps", version, about = "Fetch, cache and unpack Android SDK components")]
struct Cli {
    /// Config file (defaults to ./sdkdeps.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the build directory
    #[arg(long, global = true)]
    build_dir: Option<PathBuf>,

    /// Use a local mirror instead of the network
    #[arg(long, global = true)]
    offline_mirror: Option<PathBuf>,

    /// Hide download progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    debug!("sdkdeps v{} starting...", VERSION);

    let mut config = match cli.command {
        Command::Init { .. } => AppConfig::default(),
        _ => AppConfig::load_or_default(cli.config.as_deref())
            .await
            .context("Failed to load configuration")?,
    };

    if let Some(build_dir) = cli.build_dir {
        config.build_dir = build_dir;
    }
    if let Some(mirror) = cli.offline_mirror {
        info!("Using offline mirror {:?}", mirror);
        config.offline_mirror = Some(mirror);
    }

    commands::run(cli.command, config, !cli.no_progress).await
}

/// Initialize logging; `RUST_LOG` wins over `-v`
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
