// SPDX-License-Identifier: GPL-3.0-only

//! The pipeline runtime: a fixed pool of worker threads, each owning
//! its own [`FrameContext`], draining a shared monotonically
//! increasing frame id counter through the configured chain of
//! executors.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::context::FrameContext;
use crate::errors::PipelineError;
use crate::executors::{Executor, OrderedExecutor, ParallelExecutor, UnorderedExecutor};
use crate::stage::{Policy, Stage};

/// Summary returned by [`Pipeline::start`] once every worker has
/// drained the frame budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Number of frame ids actually processed by some worker. May be
    /// less than the requested budget if a worker panicked mid-frame
    /// and left that id undrained alongside pipeline shutdown.
    pub frames_completed: u64,
    /// Highest frame id any worker observed.
    pub last_frame_id: Option<u64>,
    /// Wall-clock time from `start()` to the last worker joining.
    pub elapsed: Duration,
}

/// A chain of stages, each already wrapped in the executor its
/// declared policy requires, driven by a fixed pool of worker
/// threads.
pub struct Pipeline {
    worker_count: u32,
    executors: Vec<Arc<dyn Executor>>,
    next_frame_id: AtomicU64,
    started: bool,
}

impl Pipeline {
    /// A pipeline with no stages yet, driven by `worker_count` worker
    /// threads (clamped to at least 1).
    pub fn new(worker_count: u32) -> Self {
        Self {
            worker_count: worker_count.max(1),
            executors: Vec::new(),
            next_frame_id: AtomicU64::new(0),
            started: false,
        }
    }

    /// Append a stage's executor to the chain. Fails with
    /// [`PipelineError::AlreadyStarted`] once `start` has run.
    pub fn add(&mut self, executor: Arc<dyn Executor>) -> Result<(), PipelineError> {
        if self.started {
            return Err(PipelineError::AlreadyStarted);
        }
        self.executors.push(executor);
        Ok(())
    }

    /// Inspect `stage`'s declared policy, wrap it in the matching
    /// executor, and append it. Fails with
    /// [`PipelineError::AlreadyStarted`] under the same rule as
    /// [`Self::add`]; the chosen executor's own `PolicyMismatch` check
    /// always passes here since the wrapper is picked from the stage's
    /// own declared policy rather than a caller's guess at one.
    pub fn add_stage(&mut self, stage: Box<dyn Stage>) -> Result<(), PipelineError> {
        let executor: Arc<dyn Executor> = match stage.policy() {
            Policy::Ordered => Arc::new(OrderedExecutor::new(stage)?),
            Policy::Unordered => Arc::new(UnorderedExecutor::new(stage)?),
            Policy::Parallel => Arc::new(ParallelExecutor::new(stage)?),
        };
        self.add(executor)
    }

    /// Run the pipeline to completion: spawn `worker_count` threads,
    /// each looping `context.clear(); context.set_frame_id(next());
    /// for executor in &chain { executor.run(&mut context)?; }` until
    /// `frame_budget` frame ids have been claimed.
    ///
    /// A stage error or panic is caught around that one executor's
    /// `run` call and isolates only the panicking worker — other
    /// workers keep draining ids until the budget is exhausted. Every
    /// executor downstream of the failure still has `skip` called on
    /// it for that frame id, so a dropped frame can't leave a later
    /// Ordered executor waiting forever on an id that will never
    /// arrive.
    pub fn start(mut self, frame_budget: u64) -> PipelineReport {
        self.started = true;
        let executors = Arc::new(self.executors);
        let next_frame_id = Arc::new(self.next_frame_id);
        let last_seen = Arc::new(AtomicU64::new(0));
        let started_at = Instant::now();

        info!(worker_count = self.worker_count, frame_budget, "pipeline starting");

        let handles: Vec<_> = (0..self.worker_count)
            .map(|worker_id| {
                let executors = Arc::clone(&executors);
                let next_frame_id = Arc::clone(&next_frame_id);
                let last_seen = Arc::clone(&last_seen);
                std::thread::spawn(move || {
                    worker_loop(worker_id, executors, next_frame_id, last_seen, frame_budget)
                })
            })
            .collect();

        let mut frames_completed = 0u64;
        for handle in handles {
            match handle.join() {
                Ok(count) => frames_completed += count,
                Err(_) => warn!("a pipeline worker thread itself panicked outside catch_unwind"),
            }
        }

        let last_frame_id = match last_seen.load(Ordering::Acquire) {
            0 if frames_completed == 0 => None,
            n => Some(n.saturating_sub(1)),
        };

        PipelineReport {
            frames_completed,
            last_frame_id,
            elapsed: started_at.elapsed(),
        }
    }
}

fn worker_loop(
    worker_id: u32,
    executors: Arc<Vec<Arc<dyn Executor>>>,
    next_frame_id: Arc<AtomicU64>,
    last_seen: Arc<AtomicU64>,
    frame_budget: u64,
) -> u64 {
    let mut ctx = FrameContext::new();
    let mut completed = 0u64;

    loop {
        let frame_id = next_frame_id.fetch_add(1, Ordering::Relaxed);
        if frame_id >= frame_budget {
            break;
        }
        last_seen.fetch_max(frame_id + 1, Ordering::AcqRel);

        ctx.clear();
        ctx.set_frame_id(frame_id);

        // Once a stage fails (error or panic), every remaining executor
        // in the chain still gets `skip(frame_id)` instead of `run` —
        // never invoking its stage, but still releasing any downstream
        // Ordered executor's wait on this id. Without this, a dropped
        // frame would leave that executor's `next_expected` stuck and
        // every later frame would block on it forever.
        let mut failed = false;
        let mut worker_should_exit = false;

        for executor in executors.iter() {
            if failed {
                executor.skip(frame_id);
                continue;
            }

            let ctx = &mut ctx;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| executor.run(ctx)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(
                        worker_id,
                        frame_id,
                        stage = executor.name(),
                        error = %err,
                        "stage returned an error; frame dropped"
                    );
                    failed = true;
                }
                Err(_) => {
                    error!(
                        worker_id,
                        frame_id,
                        stage = executor.name(),
                        "stage panicked; worker exiting, other workers continue"
                    );
                    failed = true;
                    worker_should_exit = true;
                }
            }
        }

        if !failed {
            completed += 1;
        }
        if worker_should_exit {
            break;
        }
    }

    completed
}
