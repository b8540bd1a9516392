// SPDX-License-Identifier: GPL-3.0-only

//! Policy executors: the wrappers that enforce a [`Stage`]'s declared
//! [`Policy`] around however many worker threads call `run`
//! concurrently.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::error;

use crate::context::FrameContext;
use crate::errors::{PipelineError, PipelineResult};
use crate::stage::{Policy, Stage};

/// Common interface every policy wrapper exposes to the pipeline's
/// worker loop. The pipeline only ever calls `run`/`skip` — it never
/// touches a `Stage` directly.
pub trait Executor: Send + Sync {
    /// Drive the wrapped stage for the frame currently loaded in `ctx`.
    fn run(&self, ctx: &mut FrameContext) -> PipelineResult<()>;

    /// Release whatever `run` would have advanced for `frame_id`
    /// without invoking the wrapped stage. Called by the worker loop
    /// on every executor downstream of one that failed (error or
    /// panic) for this frame, so a dropped frame still lets a
    /// downstream `Ordered` executor advance past the id it's
    /// waiting on instead of blocking forever. A no-op for executors
    /// with no frame-ordered state of their own.
    fn skip(&self, frame_id: u64) {
        let _ = frame_id;
    }

    /// The wrapped stage's name, for diagnostics.
    fn name(&self) -> &str;
}

fn require_policy(stage: &dyn Stage, want: Policy, executor: &'static str) -> PipelineResult<()> {
    if stage.policy() == want {
        Ok(())
    } else {
        Err(PipelineError::PolicyMismatch {
            executor,
            stage: stage.name().to_string(),
        })
    }
}

/// No coordination at all: any number of workers may be inside
/// `stage.process` at once. Wraps a [`Policy::Parallel`] stage.
pub struct ParallelExecutor {
    stage: Box<dyn Stage>,
}

impl ParallelExecutor {
    pub fn new(stage: Box<dyn Stage>) -> PipelineResult<Self> {
        require_policy(stage.as_ref(), Policy::Parallel, "ParallelExecutor")?;
        Ok(Self { stage })
    }
}

impl Executor for ParallelExecutor {
    fn run(&self, ctx: &mut FrameContext) -> PipelineResult<()> {
        self.stage.process(ctx)
    }

    fn name(&self) -> &str {
        self.stage.name()
    }
}

/// Mutual exclusion without ordering: at most one worker inside
/// `stage.process` at a time, but frames may complete in any order.
/// Wraps a [`Policy::Unordered`] stage.
pub struct UnorderedExecutor {
    stage: Box<dyn Stage>,
    lock: Mutex<()>,
}

impl UnorderedExecutor {
    pub fn new(stage: Box<dyn Stage>) -> PipelineResult<Self> {
        require_policy(stage.as_ref(), Policy::Unordered, "UnorderedExecutor")?;
        Ok(Self { stage, lock: Mutex::new(()) })
    }
}

impl Executor for UnorderedExecutor {
    fn run(&self, ctx: &mut FrameContext) -> PipelineResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        self.stage.process(ctx)
    }

    fn name(&self) -> &str {
        self.stage.name()
    }
}

/// Mutual exclusion plus strict frame-id ordering: workers block until
/// their frame id is the next expected one, then run, then advance the
/// counter and wake everyone else. Wraps a [`Policy::Ordered`] stage.
///
/// `run` advances `next_expected` even when the wrapped stage returns
/// an error or panics, so a dropped frame never leaves a later worker
/// blocked on this id forever; [`Self::skip`] does the same advance
/// without calling the stage at all, for when an *earlier* stage in
/// the chain already failed this frame before reaching this executor.
pub struct OrderedExecutor {
    stage: Box<dyn Stage>,
    next_expected: Mutex<u64>,
    condvar: Condvar,
}

impl OrderedExecutor {
    pub fn new(stage: Box<dyn Stage>) -> PipelineResult<Self> {
        require_policy(stage.as_ref(), Policy::Ordered, "OrderedExecutor")?;
        Ok(Self {
            stage,
            next_expected: Mutex::new(0),
            condvar: Condvar::new(),
        })
    }

    /// Block until `frame_id` is next in line, returning the locked
    /// counter so the caller can advance it. Fails with
    /// [`PipelineError::InvariantViolation`] if `frame_id` is already
    /// behind the counter — that would imply duplicate issuance.
    fn wait_turn(&self, frame_id: u64) -> PipelineResult<MutexGuard<'_, u64>> {
        let mut next_expected = self.next_expected.lock().unwrap_or_else(|p| p.into_inner());
        loop {
            if frame_id < *next_expected {
                return Err(PipelineError::InvariantViolation(format!(
                    "ordered stage '{}' observed frame {} after already advancing past it to {}",
                    self.stage.name(),
                    frame_id,
                    *next_expected
                )));
            }
            if frame_id == *next_expected {
                return Ok(next_expected);
            }
            next_expected = self
                .condvar
                .wait(next_expected)
                .unwrap_or_else(|p| p.into_inner());
        }
    }

    fn advance(&self, mut next_expected: MutexGuard<'_, u64>) {
        *next_expected += 1;
        drop(next_expected);
        self.condvar.notify_all();
    }
}

impl Executor for OrderedExecutor {
    fn run(&self, ctx: &mut FrameContext) -> PipelineResult<()> {
        let next_expected = self.wait_turn(ctx.frame_id())?;
        // Catch a stage panic here (rather than only at the worker-loop
        // boundary) so the counter still advances before the panic is
        // rethrown — otherwise this id's slot would be stuck forever
        // and every later frame would block on it.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.stage.process(ctx)));
        self.advance(next_expected);
        match outcome {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    fn skip(&self, frame_id: u64) {
        match self.wait_turn(frame_id) {
            Ok(next_expected) => self.advance(next_expected),
            Err(err) => error!(
                stage = self.stage.name(),
                frame_id,
                error = %err,
                "ordered executor could not skip frame"
            ),
        }
    }

    fn name(&self) -> &str {
        self.stage.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FrameContext;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    struct TagStage(Policy, &'static str);

    impl Stage for TagStage {
        fn policy(&self) -> Policy {
            self.0
        }
        fn name(&self) -> &str {
            self.1
        }
        fn process(&self, _ctx: &mut FrameContext) -> PipelineResult<()> {
            Ok(())
        }
    }

    #[test]
    fn mismatched_policy_is_rejected_at_construction() {
        let stage = Box::new(TagStage(Policy::Parallel, "p"));
        let err = OrderedExecutor::new(stage).unwrap_err();
        assert!(matches!(err, PipelineError::PolicyMismatch { .. }));
    }

    #[test]
    fn matching_policy_constructs() {
        assert!(ParallelExecutor::new(Box::new(TagStage(Policy::Parallel, "p"))).is_ok());
        assert!(UnorderedExecutor::new(Box::new(TagStage(Policy::Unordered, "u"))).is_ok());
        assert!(OrderedExecutor::new(Box::new(TagStage(Policy::Ordered, "o"))).is_ok());
    }

    #[test]
    fn ordered_executor_runs_frames_in_order_under_contention() {
        struct RecordStage {
            order: Arc<Mutex<Vec<u64>>>,
        }
        impl Stage for RecordStage {
            fn policy(&self) -> Policy {
                Policy::Ordered
            }
            fn name(&self) -> &str {
                "record"
            }
            fn process(&self, ctx: &mut FrameContext) -> PipelineResult<()> {
                self.order.lock().unwrap().push(ctx.frame_id());
                Ok(())
            }
        }

        let order = Arc::new(Mutex::new(Vec::new()));
        let executor = Arc::new(
            OrderedExecutor::new(Box::new(RecordStage { order: Arc::clone(&order) })).unwrap(),
        );

        const N: u64 = 100;
        let barrier = Arc::new(Barrier::new(N as usize));
        let handles: Vec<_> = (0..N)
            .rev()
            .map(|id| {
                let executor = Arc::clone(&executor);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut ctx = FrameContext::new();
                    ctx.set_frame_id(id);
                    executor.run(&mut ctx).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let recorded = order.lock().unwrap();
        let expected: Vec<u64> = (0..N).collect();
        assert_eq!(*recorded, expected);
    }

    #[test]
    fn unordered_executor_serializes_access_under_contention() {
        struct CountingStage {
            inside: AtomicU64,
            max_inside: AtomicU64,
        }
        impl Stage for CountingStage {
            fn policy(&self) -> Policy {
                Policy::Unordered
            }
            fn name(&self) -> &str {
                "counting"
            }
            fn process(&self, _ctx: &mut FrameContext) -> PipelineResult<()> {
                let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_inside.fetch_max(now, Ordering::SeqCst);
                std::thread::yield_now();
                self.inside.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let stage = Arc::new(CountingStage {
            inside: AtomicU64::new(0),
            max_inside: AtomicU64::new(0),
        });

        struct Forward(Arc<CountingStage>);
        impl Stage for Forward {
            fn policy(&self) -> Policy {
                self.0.policy()
            }
            fn name(&self) -> &str {
                self.0.name()
            }
            fn process(&self, ctx: &mut FrameContext) -> PipelineResult<()> {
                self.0.process(ctx)
            }
        }

        let executor = Arc::new(UnorderedExecutor::new(Box::new(Forward(Arc::clone(&stage)))).unwrap());
        const N: usize = 100;
        let barrier = Arc::new(Barrier::new(N));
        let handles: Vec<_> = (0..N)
            .map(|_| {
                let executor = Arc::clone(&executor);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut ctx = FrameContext::new();
                    executor.run(&mut ctx).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stage.max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn skip_advances_the_counter_without_running_the_stage() {
        struct RecordCalls(Arc<Mutex<Vec<u64>>>);
        impl Stage for RecordCalls {
            fn policy(&self) -> Policy {
                Policy::Ordered
            }
            fn name(&self) -> &str {
                "record-calls"
            }
            fn process(&self, ctx: &mut FrameContext) -> PipelineResult<()> {
                self.0.lock().unwrap().push(ctx.frame_id());
                Ok(())
            }
        }

        let calls = Arc::new(Mutex::new(Vec::new()));
        let executor = OrderedExecutor::new(Box::new(RecordCalls(Arc::clone(&calls)))).unwrap();

        // Frames 0 and 1 failed upstream and never reach this executor;
        // the worker loop calls skip() for each in order instead of run().
        executor.skip(0);
        executor.skip(1);

        // Frame 2 is now next in line and must run immediately, not block.
        let mut ctx = FrameContext::new();
        ctx.set_frame_id(2);
        executor.run(&mut ctx).unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![2], "skip must never invoke the wrapped stage");
    }

    #[test]
    fn a_panicking_ordered_stage_still_advances_next_expected() {
        struct PanicOnFrame(u64);
        impl Stage for PanicOnFrame {
            fn policy(&self) -> Policy {
                Policy::Ordered
            }
            fn name(&self) -> &str {
                "panics-on-zero"
            }
            fn process(&self, ctx: &mut FrameContext) -> PipelineResult<()> {
                if ctx.frame_id() == self.0 {
                    panic!("synthetic failure");
                }
                Ok(())
            }
        }

        let executor = OrderedExecutor::new(Box::new(PanicOnFrame(0))).unwrap();

        let mut ctx0 = FrameContext::new();
        ctx0.set_frame_id(0);
        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| executor.run(&mut ctx0)));
        assert!(panicked.is_err(), "the panic must still propagate out of run()");

        // If the counter were stuck at 0, this would block forever;
        // the test harness's own timeout is the deadlock detector here.
        let mut ctx1 = FrameContext::new();
        ctx1.set_frame_id(1);
        executor.run(&mut ctx1).unwrap();
    }
}
