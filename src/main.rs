// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use tracing::info;

mod cli;

#[derive(Parser)]
#[command(name = "camera-pipeline")]
#[command(about = "Multi-threaded image-processing pipeline runtime")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in synthetic demo pipeline and stream it to the
    /// visualizer.
    Demo {
        /// Worker thread count (default: loaded config, or hardware parallelism)
        #[arg(short, long)]
        workers: Option<u32>,

        /// Number of frames to process (default: loaded config, or unbounded)
        #[arg(short, long)]
        frames: Option<u64>,

        /// TCP port the visualizer listens on (default: loaded config, or 8080)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect the on-disk configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as JSON
    Show,
    /// Print the path the configuration file is read from
    Path,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG environment variable to control log level.
    // Examples: RUST_LOG=debug, RUST_LOG=camera_pipeline=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    info!(version = camera_pipeline::constants::app_info::version(), "camera-pipeline starting");

    let args = Cli::parse();

    match args.command {
        Commands::Demo { workers, frames, port } => cli::run_demo(workers, frames, port),
        Commands::Config { action: ConfigAction::Show } => cli::config_show(),
        Commands::Config { action: ConfigAction::Path } => cli::config_path(),
    }
}
