// SPDX-License-Identifier: GPL-3.0-only

//! On-disk configuration for the pipeline runtime's CLI entry point.
//!
//! The runtime itself (`Pipeline`, `Stage`, `FrameContext`) has no notion
//! of a config file — this module only exists to give the `camera-pipeline`
//! binary a place to read worker count, frame budget, and sink port from,
//! resolved through `dirs` + serde.

use crate::constants::{DEFAULT_SINK_PORT, UNBOUNDED_FRAME_BUDGET};
use crate::errors::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime configuration loaded from (or defaulted in the absence of) a
/// JSON file in the OS config directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Worker thread count. `None` resolves to hardware parallelism.
    #[serde(default)]
    pub worker_count: Option<u32>,
    /// Frame budget. `None` means run until externally stopped.
    #[serde(default)]
    pub frame_budget: Option<u64>,
    /// TCP port the visualizer sink listens on.
    #[serde(default = "default_sink_port")]
    pub sink_port: u16,
}

fn default_sink_port() -> u16 {
    DEFAULT_SINK_PORT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_count: None,
            frame_budget: None,
            sink_port: DEFAULT_SINK_PORT,
        }
    }
}

impl Config {
    /// Resolved frame budget (`UNBOUNDED_FRAME_BUDGET` when unset).
    pub fn frame_budget(&self) -> u64 {
        self.frame_budget.unwrap_or(UNBOUNDED_FRAME_BUDGET)
    }

    /// Path to the config file: `<config dir>/camera-pipeline/config.json`.
    pub fn path() -> PipelineResult<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| PipelineError::Config("no config directory for this platform".into()))?;
        Ok(base.join("camera-pipeline").join("config.json"))
    }

    /// Load the config file, falling back to defaults if it doesn't exist.
    ///
    /// A present-but-malformed file is a [`PipelineError::Config`], not a
    /// panic — an operator with a hand-edited broken config should see a
    /// clear error rather than the tool silently reverting to defaults.
    pub fn load() -> PipelineResult<Self> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write this config to the standard config path, creating parent
    /// directories as needed.
    pub fn save(&self) -> PipelineResult<()> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
