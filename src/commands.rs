//! CLI commands for sdkdeps
//!
//! Each subcommand maps to one preparation step of the SDK pipeline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use anyhow::{bail, Context, Result};
use clap::Subcommand;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::info;

use sdkdeps_core::{AppConfig, HostOs};
use sdkdeps_toolchain::repository::location_file_name;
use sdkdeps_toolchain::{source_for, ProgressCallback, SdkPreparer, TaskOutcome};

/// Subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Download and unpack every SDK component
    Prepare,
    /// Extract android.jar from the platform archive
    AndroidJar,
    /// Extract dx.jar from the build-tools archive
    DxJar,
    /// Unpack the dx sources and pack them into dx-sources.jar
    DxSources,
    /// Run every step
    All,
    /// Show components, their coordinates and where they are fetched from
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the published artifacts as JSON
    Artifacts,
    /// Delete the build directory
    Clean,
    /// Delete the download cache
    ClearCache,
    /// Write a config file with the built-in defaults
    Init {
        #[arg(default_value = sdkdeps_core::config::DEFAULT_CONFIG_FILE)]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Execute a command against a loaded configuration
pub async fn run(command: Command, config: AppConfig, progress: bool) -> Result<()> {
    match command {
        Command::Init { path, force } => init(&path, force, &config).await,
        step => {
            let reporter = progress.then(progress_reporter);
            let source = source_for(&config, reporter).context("Failed to set up artifact source")?;
            let preparer = SdkPreparer::new(config, source, HostOs::current());
            run_step(step, &preparer).await
        }
    }
}

async fn run_step(command: Command, preparer: &SdkPreparer) -> Result<()> {
    match command {
        Command::Prepare => prepare(preparer).await,
        Command::AndroidJar => {
            let outcome = preparer.extract_android_jar().await?;
            report("android.jar", &outcome);
            Ok(())
        }
        Command::DxJar => {
            let outcome = preparer.extract_dx_jar().await?;
            report("dx.jar", &outcome);
            Ok(())
        }
        Command::DxSources => {
            let outcome = preparer.package_dx_sources_jar().await?;
            report("dx-sources.jar", &outcome);
            Ok(())
        }
        Command::All => {
            prepare(preparer).await?;
            report("android.jar", &preparer.extract_android_jar().await?);
            report("dx.jar", &preparer.extract_dx_jar().await?);
            report("dx-sources.jar", &preparer.package_dx_sources_jar().await?);
            Ok(())
        }
        Command::List { json } => list(preparer, json),
        Command::Artifacts => {
            println!("{}", serde_json::to_string_pretty(&preparer.published_artifacts())?);
            Ok(())
        }
        Command::Clean => {
            preparer.clean().await?;
            Ok(())
        }
        Command::ClearCache => {
            preparer.cache().clear().await?;
            Ok(())
        }
        Command::Init { .. } => bail!("init does not need a prepared SDK"),
    }
}

async fn prepare(preparer: &SdkPreparer) -> Result<()> {
    let outcomes = preparer.prepare_sdk().await.context("Failed to prepare the Android SDK")?;
    for (id, outcome) in &outcomes {
        report(id, outcome);
    }
    info!("Android SDK ready in {:?}", preparer.sdk_dir());
    Ok(())
}

fn report(what: &str, outcome: &TaskOutcome) {
    match outcome {
        TaskOutcome::UpToDate => info!("{}: up to date", what),
        TaskOutcome::Extracted(r) => info!("{}: unpacked {} files, {} directories", what, r.files, r.dirs),
        TaskOutcome::Written(path) => info!("{}: wrote {:?}", what, path),
    }
}

fn list(preparer: &SdkPreparer, json: bool) -> Result<()> {
    let status = preparer.status();
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    for component in &status {
        let state = if component.prepared {
            "prepared"
        } else if component.cached.is_some() {
            "cached"
        } else {
            "missing"
        };
        println!("{:<32} {:<9} {}", component.id, state, component.notation);
        println!("    -> {}", component.target_dir.display());
        for location in &component.locations {
            println!("    <- {}", location);
        }
    }
    Ok(())
}

async fn init(path: &Path, force: bool, config: &AppConfig) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config.save(path).await?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// One progress bar per download location
fn progress_reporter() -> ProgressCallback {
    let multi = MultiProgress::new();
    let bars: Mutex<HashMap<String, ProgressBar>> = Mutex::new(HashMap::new());

    Arc::new(move |location: &str, done: u64, total: u64| {
        let Ok(mut bars) = bars.lock() else {
            return;
        };
        let bar = bars.entry(location.to_string()).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new(total));
            if let Ok(style) = ProgressStyle::with_template("{msg:40} [{bar:30}] {bytes}/{total_bytes}") {
                bar.set_style(style);
            }
            bar.set_message(location_file_name(location).to_string());
            bar
        });
        bar.set_position(done);
        if total > 0 && done >= total {
            bar.finish();
        }
    })
}
