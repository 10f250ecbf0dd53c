//! CLI entry point for gx-viewer
//!
//! ```bash
//! gx-viewer list
//! gx-viewer --config config/gx-viewer.toml run --duration 10 --snapshot-after 2
//! gx-viewer run --duration 5 --json > summary.json
//! ```
//!
//! Cameras come from the `[mock]` section of the configuration. `run`
//! keeps going until Ctrl-C or `--duration` elapses.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gx_core::DeviceSdk;
use gx_driver_mock::MockSdk;
use gx_viewer::config::{ViewerConfig, DEFAULT_CONFIG_PATH};
use gx_viewer::{tracing_setup, HeadlessSurface, RunSummary, Viewer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

// Use mimalloc for the frame buffers allocated on the acquisition threads
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "gx-viewer")]
#[command(about = "Dual camera viewer with live acquisition", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List reachable cameras
    List,

    /// Open the configured sessions and stream until stopped
    Run {
        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration: Option<u64>,

        /// Save one image per session after this many seconds
        #[arg(long)]
        snapshot_after: Option<u64>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ViewerConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    config.validate()?;
    tracing_setup::init_from_config(&config)?;

    let sdk: Arc<dyn DeviceSdk> = Arc::new(MockSdk::from_config(&config.mock));
    let mut viewer: Viewer<HeadlessSurface> = Viewer::new(sdk, config.acquisition.clone());

    match cli.command {
        Commands::List => list_devices(&viewer),
        Commands::Run {
            duration,
            snapshot_after,
            json,
        } => {
            let summary = run(&mut viewer, &config, duration, snapshot_after).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
            viewer.shutdown().context("Failed to close sessions")
        }
    }
}

fn list_devices(viewer: &Viewer<HeadlessSurface>) -> Result<()> {
    let devices = viewer.list_devices().context("Device enumeration failed")?;
    if devices.is_empty() {
        println!("No cameras found");
        return Ok(());
    }
    for (slot, device) in devices.iter().enumerate() {
        println!(
            "{:>2}  {:<24} {:<16} {}",
            slot + 1,
            device.display_name,
            device.vendor_name,
            device.serial_number
        );
    }
    Ok(())
}

async fn run(
    viewer: &mut Viewer<HeadlessSurface>,
    config: &ViewerConfig,
    duration: Option<u64>,
    snapshot_after: Option<u64>,
) -> Result<RunSummary> {
    if config.sessions.is_empty() {
        warn!("No [[sessions]] configured, nothing to show");
        return Ok(RunSummary::default());
    }
    for session in &config.sessions {
        viewer
            .add_session(session, HeadlessSurface::default())
            .with_context(|| format!("Failed to start device {}", session.device_index))?;
    }

    let shutdown = async move {
        match duration {
            Some(secs) => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            None => {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!(error = %err, "Ctrl-C handler unavailable, stopping");
                }
            }
        }
    };

    info!(name = %config.application.name, "Streaming, press Ctrl-C to stop");
    Ok(viewer
        .run(shutdown, snapshot_after.map(Duration::from_secs))
        .await)
}

fn print_summary(summary: &RunSummary) {
    println!();
    for session in &summary.sessions {
        let fps = session
            .last_fps
            .map_or_else(|| "-".to_string(), |fps| format!("{:.1}", fps));
        let device = session
            .device_index
            .map_or_else(|| "-".to_string(), |i| i.to_string());
        println!(
            "{}  {}  device {}  acquired {}  shown {}  fps {}  snapshots {}",
            session.id,
            session.state,
            device,
            session.stats.acquired,
            session.frames_shown,
            fps,
            session.snapshots_saved
        );
        println!(
            "      incomplete {}  dropped {}  invalid {}",
            session.stats.incomplete, session.stats.dropped, session.stats.invalid
        );
        if let Some(err) = &session.last_error {
            println!("      stopped on: {}", err);
        }
    }
}
