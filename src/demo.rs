// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic, dependency-free stages standing in for the concrete
//! capture/transform stages the core pipeline never depends on. Used
//! by the `demo` CLI subcommand and by integration tests that need a
//! realistic-looking chain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::context::{ElementType, FrameContext, Image, VectorGraphic};
use crate::errors::PipelineResult;
use crate::stage::{Policy, Stage};

/// Writes a monotonically increasing counter into a named result slot
/// and stamps a synthetic grayscale image of the given size. Ordered:
/// a later frame must never observe a lower counter than an earlier
/// one did.
pub struct CounterStage {
    name: String,
    result_name: String,
    image_name: String,
    width: u32,
    height: u32,
    counter: AtomicU64,
}

impl CounterStage {
    pub fn new(result_name: impl Into<String>, image_name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: "counter".to_string(),
            result_name: result_name.into(),
            image_name: image_name.into(),
            width,
            height,
            counter: AtomicU64::new(0),
        }
    }
}

impl Stage for CounterStage {
    fn policy(&self) -> Policy {
        Policy::Ordered
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, ctx: &mut FrameContext) -> PipelineResult<()> {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        ctx.result(&self.result_name).set(count);

        let pixel = (count % 256) as u8;
        let data = vec![pixel; (self.width * self.height) as usize];
        *ctx.image(&self.image_name) = Image {
            width: self.width,
            height: self.height,
            element_type: ElementType::U8,
            data: Arc::from(data.into_boxed_slice()),
        };
        ctx.push_graphics(
            &self.image_name,
            [VectorGraphic::Text {
                color: [255, 255, 255],
                point: [4.0, 4.0],
                text: format!("frame {}", ctx.frame_id()),
            }],
        );
        Ok(())
    }
}

/// Sleeps for a fixed duration to make concurrency observable in
/// tests and demos. Parallel: any number of frames may sleep at once.
pub struct SleepStage {
    name: String,
    duration: Duration,
}

impl SleepStage {
    pub fn new(duration: Duration) -> Self {
        Self { name: "sleep".to_string(), duration }
    }
}

impl Stage for SleepStage {
    fn policy(&self) -> Policy {
        Policy::Parallel
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, _ctx: &mut FrameContext) -> PipelineResult<()> {
        std::thread::sleep(self.duration);
        Ok(())
    }
}

/// Appends each frame id it sees to a shared, mutex-guarded vector.
/// Unordered: frames may append in any relative order but never
/// concurrently, so the vector's length always equals the number of
/// completed calls.
pub struct AppendStage {
    name: String,
    seen: Arc<Mutex<Vec<u64>>>,
}

impl AppendStage {
    pub fn new(seen: Arc<Mutex<Vec<u64>>>) -> Self {
        Self { name: "append".to_string(), seen }
    }
}

impl Stage for AppendStage {
    fn policy(&self) -> Policy {
        Policy::Unordered
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, ctx: &mut FrameContext) -> PipelineResult<()> {
        self.seen.lock().unwrap().push(ctx.frame_id());
        Ok(())
    }
}

/// Like [`CounterStage`] but writes into a single named camera's
/// image slot rather than the top-level context, so the visualizer
/// sink has a `cameras()` catalog to stream from.
pub struct CameraFeedStage {
    name: String,
    camera_name: String,
    image_name: String,
    width: u32,
    height: u32,
    counter: AtomicU64,
}

impl CameraFeedStage {
    pub fn new(
        camera_name: impl Into<String>,
        image_name: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            name: "camera-feed".to_string(),
            camera_name: camera_name.into(),
            image_name: image_name.into(),
            width,
            height,
            counter: AtomicU64::new(0),
        }
    }
}

impl Stage for CameraFeedStage {
    fn policy(&self) -> Policy {
        Policy::Ordered
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, ctx: &mut FrameContext) -> PipelineResult<()> {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        let pixel = (count % 256) as u8;
        let data = vec![pixel; (self.width * self.height) as usize];
        let frame_id = ctx.frame_id();
        let camera = ctx.camera(&self.camera_name);
        *camera.image(&self.image_name) = Image {
            width: self.width,
            height: self.height,
            element_type: ElementType::U8,
            data: Arc::from(data.into_boxed_slice()),
        };
        camera.push_graphics(
            &self.image_name,
            [VectorGraphic::Text {
                color: [255, 255, 255],
                point: [4.0, 4.0],
                text: format!("frame {frame_id}"),
            }],
        );
        Ok(())
    }
}
