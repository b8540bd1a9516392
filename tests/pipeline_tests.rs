// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end scenarios exercising the public `Pipeline`/`Stage` API:
//! ordered ordering under contention, unordered mutual exclusion,
//! parallel non-serialization, per-frame clear, camera creation
//! determinism, and setup-error rejection.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use camera_pipeline::errors::PipelineResult;
use camera_pipeline::{FrameContext, Pipeline, PipelineError, Policy, Stage};

struct RecordOrderStage(Arc<Mutex<Vec<u64>>>);
impl Stage for RecordOrderStage {
    fn policy(&self) -> Policy {
        Policy::Ordered
    }
    fn name(&self) -> &str {
        "record-order"
    }
    fn process(&self, ctx: &mut FrameContext) -> PipelineResult<()> {
        self.0.lock().unwrap().push(ctx.frame_id());
        Ok(())
    }
}

#[test]
fn ordered_ordering_under_contention() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut pipeline = Pipeline::new(100);
    pipeline.add_stage(Box::new(RecordOrderStage(Arc::clone(&seen)))).unwrap();

    let report = pipeline.start(100);

    assert_eq!(report.frames_completed, 100);
    let expected: Vec<u64> = (0..100).collect();
    assert_eq!(*seen.lock().unwrap(), expected);
}

struct MutualExclusionStage {
    inside: AtomicUsize,
    violations: AtomicUsize,
}
impl Stage for MutualExclusionStage {
    fn policy(&self) -> Policy {
        Policy::Unordered
    }
    fn name(&self) -> &str {
        "mutual-exclusion"
    }
    fn process(&self, _ctx: &mut FrameContext) -> PipelineResult<()> {
        let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
        if now != 1 {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
        self.inside.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn unordered_mutual_exclusion() {
    let stage = Arc::new(MutualExclusionStage { inside: AtomicUsize::new(0), violations: AtomicUsize::new(0) });

    struct Forward(Arc<MutualExclusionStage>);
    impl Stage for Forward {
        fn policy(&self) -> Policy {
            Policy::Unordered
        }
        fn name(&self) -> &str {
            "forward"
        }
        fn process(&self, ctx: &mut FrameContext) -> PipelineResult<()> {
            self.0.process(ctx)
        }
    }

    let mut pipeline = Pipeline::new(100);
    pipeline.add_stage(Box::new(Forward(Arc::clone(&stage)))).unwrap();

    let report = pipeline.start(1000);

    assert_eq!(report.frames_completed, 1000);
    assert_eq!(stage.violations.load(Ordering::SeqCst), 0);
}

struct SleepStage(Duration);
impl Stage for SleepStage {
    fn policy(&self) -> Policy {
        Policy::Parallel
    }
    fn name(&self) -> &str {
        "sleep"
    }
    fn process(&self, _ctx: &mut FrameContext) -> PipelineResult<()> {
        std::thread::sleep(self.0);
        Ok(())
    }
}

#[test]
fn parallel_non_serialization() {
    let mut pipeline = Pipeline::new(8);
    pipeline.add_stage(Box::new(SleepStage(Duration::from_millis(10)))).unwrap();

    let started = Instant::now();
    let report = pipeline.start(16);
    let elapsed = started.elapsed();

    assert_eq!(report.frames_completed, 16);
    assert!(elapsed < Duration::from_millis(70), "16 frames at 10ms ran too serially: {elapsed:?}");
}

struct WriterStage(AtomicU64);
impl Stage for WriterStage {
    fn policy(&self) -> Policy {
        Policy::Parallel
    }
    fn name(&self) -> &str {
        "writer"
    }
    fn process(&self, ctx: &mut FrameContext) -> PipelineResult<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        ctx.result("x").set(ctx.frame_id());
        Ok(())
    }
}

struct AssertAbsentStage(Arc<AtomicUsize>);
impl Stage for AssertAbsentStage {
    fn policy(&self) -> Policy {
        Policy::Parallel
    }
    fn name(&self) -> &str {
        "assert-absent"
    }
    fn process(&self, ctx: &mut FrameContext) -> PipelineResult<()> {
        if ctx.result("x").get::<u64>("x").is_ok() {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[test]
fn per_frame_clear_hides_the_previous_frames_results() {
    let violations = Arc::new(AtomicUsize::new(0));
    let mut pipeline = Pipeline::new(4);
    // AssertAbsentStage runs first each frame, so it must never see a
    // value the prior frame's WriterStage left behind.
    pipeline.add_stage(Box::new(AssertAbsentStage(Arc::clone(&violations)))).unwrap();
    pipeline.add_stage(Box::new(WriterStage(AtomicU64::new(0)))).unwrap();

    let report = pipeline.start(200);

    assert_eq!(report.frames_completed, 200);
    assert_eq!(violations.load(Ordering::SeqCst), 0);
}

struct CameraOrderStage;
impl Stage for CameraOrderStage {
    fn policy(&self) -> Policy {
        Policy::Parallel
    }
    fn name(&self) -> &str {
        "camera-order"
    }
    fn process(&self, ctx: &mut FrameContext) -> PipelineResult<()> {
        ctx.camera("left");
        ctx.camera("right");
        let names: Vec<&str> = ctx.cameras().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["left", "right"]);
        Ok(())
    }
}

#[test]
fn camera_creation_is_deterministic_every_frame() {
    let mut pipeline = Pipeline::new(4);
    pipeline.add_stage(Box::new(CameraOrderStage)).unwrap();
    let report = pipeline.start(50);
    assert_eq!(report.frames_completed, 50);
}

struct DeclaresUnordered;
impl Stage for DeclaresUnordered {
    fn policy(&self) -> Policy {
        Policy::Unordered
    }
    fn name(&self) -> &str {
        "declares-unordered"
    }
    fn process(&self, _ctx: &mut FrameContext) -> PipelineResult<()> {
        Ok(())
    }
}

#[test]
fn setup_error_rejection_never_reaches_start() {
    // Wrapping a stage that declares Unordered in an Ordered executor
    // must fail synchronously at construction, before any pipeline
    // exists to start.
    let err = camera_pipeline::executors::OrderedExecutor::new(Box::new(DeclaresUnordered));
    assert!(matches!(err, Err(PipelineError::PolicyMismatch { .. })));
}

#[test]
fn zero_budget_runs_no_stage() {
    let invoked = Arc::new(AtomicUsize::new(0));

    struct CountInvocations(Arc<AtomicUsize>);
    impl Stage for CountInvocations {
        fn policy(&self) -> Policy {
            Policy::Parallel
        }
        fn name(&self) -> &str {
            "count-invocations"
        }
        fn process(&self, _ctx: &mut FrameContext) -> PipelineResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let mut pipeline = Pipeline::new(4);
    pipeline.add_stage(Box::new(CountInvocations(Arc::clone(&invoked)))).unwrap();
    let report = pipeline.start(0);

    assert_eq!(report.frames_completed, 0);
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}
