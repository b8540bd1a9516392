// SPDX-License-Identifier: GPL-3.0-only

//! CLI command implementations.
//!
//! This module provides the command-line functionality behind
//! `camera-pipeline`'s subcommands:
//! - `demo`: run the built-in synthetic pipeline and stream it
//! - `config show` / `config path`: inspect the effective configuration

use std::sync::Arc;
use std::time::Duration;

use camera_pipeline::config::Config;
use camera_pipeline::constants::resolve_worker_count;
use camera_pipeline::demo::{CameraFeedStage, SleepStage};
use camera_pipeline::sink::{VisualizerSink, WebSocketServer};
use camera_pipeline::Pipeline;

/// Run the built-in demo pipeline: two synthetic camera feeds followed
/// by a sleep stage (to make the Parallel policy visible under load)
/// and a visualizer sink, streamed over the configured port. CLI flags
/// override the loaded [`Config`]; an absent flag falls back to it.
pub fn run_demo(
    workers: Option<u32>,
    frames: Option<u64>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let worker_count = resolve_worker_count(workers.or(config.worker_count));
    let frame_budget = frames.unwrap_or_else(|| config.frame_budget());
    let sink_port = port.unwrap_or(config.sink_port);

    tracing::info!(worker_count, frame_budget, sink_port, "starting demo pipeline");

    let server = Arc::new(WebSocketServer::bind(sink_port)?);

    let mut pipeline = Pipeline::new(worker_count);
    pipeline.add_stage(Box::new(CameraFeedStage::new("left", "rgb", 64, 48)))?;
    pipeline.add_stage(Box::new(CameraFeedStage::new("right", "rgb", 64, 48)))?;
    pipeline.add_stage(Box::new(SleepStage::new(Duration::from_millis(1))))?;
    pipeline.add_stage(Box::new(VisualizerSink::new(server)))?;

    let report = pipeline.start(frame_budget);
    println!(
        "completed {} frame(s), last frame id {:?}, elapsed {:?}",
        report.frames_completed, report.last_frame_id, report.elapsed
    );

    Ok(())
}

/// Print the effective configuration (loaded file merged with its
/// defaults) as pretty-printed JSON.
pub fn config_show() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Print the path the configuration file is (or would be) read from.
pub fn config_path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", Config::path()?.display());
    Ok(())
}
