// SPDX-License-Identifier: GPL-3.0-only

//! Crate-wide constants and defaults

/// Default TCP port the visualizer sink listens on.
pub const DEFAULT_SINK_PORT: u16 = 8080;

/// Default frame budget: run until externally stopped.
pub const UNBOUNDED_FRAME_BUDGET: u64 = u64::MAX;

/// Minimum worker count; a configured count of 0 is clamped up to this.
pub const MIN_WORKER_COUNT: u32 = 1;

/// Resolve the configured worker count against host parallelism.
///
/// `None` defaults to the host's hardware parallelism (minimum 1);
/// `Some(0)` is clamped up to 1 rather than spawning zero workers.
pub fn resolve_worker_count(configured: Option<u32>) -> u32 {
    match configured {
        Some(0) | None => std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(MIN_WORKER_COUNT)
            .max(MIN_WORKER_COUNT),
        Some(n) => n,
    }
}

/// Build-time version info, baked in by `build.rs` from `git describe`.
pub mod app_info {
    /// The version string shown by `camera-pipeline --version`: the
    /// crate version suffixed with a commit hash, or "dirty" if built
    /// from a non-tagged commit.
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
