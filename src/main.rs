use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use nearscan_lib::bootstrap::{
    self, run_pick, run_stream, wire_dependencies, PickAction, PickOptions, StreamOptions,
};
use ns_platform::ReplayScript;

#[derive(Parser)]
#[command(name = "nearscan")]
#[command(about = "Discover nearby wireless devices from a replayed scan", long_about = None)]
struct Cli {
    /// TOML configuration file (falls back to $NEARSCAN_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report every accepted sighting as it arrives
    Stream {
        /// Replay script (JSON array of sightings)
        #[arg(short, long)]
        script: PathBuf,
        /// Only report devices whose name starts with this prefix
        #[arg(short, long)]
        prefix: Option<String>,
        /// Report repeat sightings of the same device
        #[arg(long)]
        allow_duplicates: bool,
        /// Stop scanning after this many milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,
        /// Only report devices advertising one of these service UUIDs
        #[arg(long = "service")]
        services: Vec<String>,
        /// Classic (BR/EDR) inquiry instead of a low-energy scan
        #[arg(long)]
        classic: bool,
    },
    /// Let a scripted user pick one device from the list
    Pick {
        /// Replay script (JSON array of sightings)
        #[arg(short, long)]
        script: PathBuf,
        /// Select the device at this list index (0-based), once it is listed
        #[arg(long, conflicts_with = "cancel")]
        select: Option<usize>,
        /// Dismiss the list instead of selecting
        #[arg(long)]
        cancel: bool,
        /// Wait this long before selecting or cancelling
        #[arg(long, default_value_t = 0)]
        after_ms: u64,
        #[arg(short, long)]
        prefix: Option<String>,
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = bootstrap::resolve_config(cli.config).context("Failed to load configuration")?;
    bootstrap::tracing::init_tracing_subscriber(&config.logging)
        .context("Failed to initialize tracing")?;

    let script_path = match &cli.command {
        Commands::Stream { script, .. } | Commands::Pick { script, .. } => script.clone(),
    };
    let script = ReplayScript::load(&script_path)?;
    info!(path = %script_path.display(), steps = script.len(), "Replay script loaded");

    let runtime = wire_dependencies(&config, script);
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Stream {
            prefix,
            allow_duplicates,
            timeout_ms,
            services,
            classic,
            ..
        } => {
            let options = StreamOptions {
                name_prefix: prefix,
                allow_duplicates,
                timeout_ms,
                service_uuids: services,
                classic,
            };
            run_stream(&runtime, options, &mut stdout).await?;
        }
        Commands::Pick {
            select,
            cancel,
            after_ms,
            prefix,
            timeout_ms,
            ..
        } => {
            let action = match (select, cancel) {
                (Some(index), _) => PickAction::Select(index),
                (None, true) => PickAction::Cancel,
                (None, false) => PickAction::Wait,
            };
            let options = PickOptions {
                action,
                after: Duration::from_millis(after_ms),
                name_prefix: prefix,
                timeout_ms,
            };
            run_pick(&runtime, options, &mut stdout).await?;
        }
    }

    stdout.flush()?;
    Ok(())
}
