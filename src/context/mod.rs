// SPDX-License-Identifier: GPL-3.0-only

//! The per-frame context threaded through every stage: frame id,
//! timestamp, a dynamically-typed result map, named image slots, and
//! (at the top level) a set of per-camera sub-contexts.

mod graphics;
mod image;
mod value;

pub use graphics::{Color, Pixel, VectorGraphic};
pub use image::{ElementType, Image};
pub use value::AnyValue;

use std::collections::HashMap;
use std::time::Instant;

use image::ImageSlot;

use crate::errors::{PipelineError, PipelineResult};

/// A monotonic point in time a stage may stamp onto a frame. Hides the
/// "not yet stamped" case behind a concrete default rather than
/// requiring every call site to unwrap an `Option<Instant>`.
#[derive(Debug, Clone, Copy)]
pub struct FrameTime(Instant);

impl FrameTime {
    fn epoch() -> Self {
        Self(Instant::now())
    }

    /// The wrapped instant.
    pub fn instant(&self) -> Instant {
        self.0
    }
}

/// Single-camera data: results and image slots. Shared by the
/// top-level [`FrameContext`] and by each of its per-camera
/// sub-contexts.
#[derive(Debug, Default)]
struct Data {
    results: HashMap<String, AnyValue>,
    images: HashMap<String, ImageSlot>,
}

impl Data {
    fn clear(&mut self) {
        self.results.clear();
        for slot in self.images.values_mut() {
            slot.clear();
        }
    }

    fn result(&mut self, name: &str) -> &mut AnyValue {
        self.results.entry(name.to_string()).or_insert_with(AnyValue::empty)
    }

    fn image(&mut self, name: &str) -> &mut Image {
        &mut self.images.entry(name.to_string()).or_default().image
    }

    fn push_graphics(&mut self, name: &str, graphics: impl IntoIterator<Item = VectorGraphic>) {
        self.images.entry(name.to_string()).or_default().graphics.extend(graphics);
    }

    fn graphics(&self, name: &str) -> PipelineResult<&[VectorGraphic]> {
        self.images
            .get(name)
            .map(|slot| slot.graphics.as_slice())
            .ok_or_else(|| PipelineError::NotFound { name: name.to_string() })
    }

    fn for_each_image<F: FnMut(&str, &Image)>(&self, mut f: F) {
        for (name, slot) in &self.images {
            f(name, &slot.image);
        }
    }

    fn for_each_image_mut<F: FnMut(&str, &mut Image)>(&mut self, mut f: F) {
        for (name, slot) in &mut self.images {
            f(name, &mut slot.image);
        }
    }
}

/// A single camera's data, as seen through [`FrameContext::camera`].
/// Does not itself hold nested cameras. Carries its own frame id and
/// timestamp, kept in lockstep with the parent by
/// [`FrameContext::set_frame_id`]/[`FrameContext::set_time`].
#[derive(Debug)]
pub struct CameraContext {
    frame_id: u64,
    time: FrameTime,
    data: Data,
}

impl Default for CameraContext {
    fn default() -> Self {
        Self { frame_id: 0, time: FrameTime::epoch(), data: Data::default() }
    }
}

impl CameraContext {
    /// The frame id this camera last observed. Always equal to the
    /// parent [`FrameContext`]'s id after construction, since both are
    /// set only via [`FrameContext::set_frame_id`].
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// The timestamp this camera last observed.
    pub fn time(&self) -> FrameTime {
        self.time
    }

    pub fn result(&mut self, name: &str) -> &mut AnyValue {
        self.data.result(name)
    }

    pub fn image(&mut self, name: &str) -> &mut Image {
        self.data.image(name)
    }

    pub fn push_graphics(&mut self, name: &str, graphics: impl IntoIterator<Item = VectorGraphic>) {
        self.data.push_graphics(name, graphics)
    }

    pub fn graphics(&self, name: &str) -> PipelineResult<&[VectorGraphic]> {
        self.data.graphics(name)
    }

    pub fn for_each_image<F: FnMut(&str, &Image)>(&self, f: F) {
        self.data.for_each_image(f)
    }

    pub fn for_each_image_mut<F: FnMut(&str, &mut Image)>(&mut self, f: F) {
        self.data.for_each_image_mut(f)
    }
}

/// The context passed to every [`crate::stage::Stage`]: this frame's
/// id and timestamp, its own result/image data, and its named
/// camera sub-contexts.
#[derive(Debug)]
pub struct FrameContext {
    frame_id: u64,
    time: FrameTime,
    data: Data,
    cameras: Vec<(String, CameraContext)>,
}

impl Default for FrameContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameContext {
    /// A fresh context at frame 0, unstamped, with no cameras yet.
    pub fn new() -> Self {
        Self {
            frame_id: 0,
            time: FrameTime::epoch(),
            data: Data::default(),
            cameras: Vec::new(),
        }
    }

    /// Reset per-frame data for reuse by the next frame id: result
    /// values are dropped, image slots are truncated in place
    /// (keeping their keys), and every camera sub-context is cleared
    /// the same way. Frame id and timestamp are untouched here —
    /// the worker loop sets those explicitly before reuse.
    pub fn clear(&mut self) {
        self.data.clear();
        for (_, camera) in &mut self.cameras {
            camera.data.clear();
        }
    }

    /// The current frame id.
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// Set the frame id. Propagates to every existing camera
    /// sub-context immediately, so an observer reading any camera
    /// right after this call sees the same id as the parent.
    pub fn set_frame_id(&mut self, id: u64) {
        self.frame_id = id;
        for (_, camera) in &mut self.cameras {
            camera.frame_id = id;
        }
    }

    /// The current timestamp (unstamped frames read as the context's
    /// construction time).
    pub fn time(&self) -> FrameTime {
        self.time
    }

    /// Stamp the current timestamp. Propagates to every existing
    /// camera sub-context immediately, same as [`Self::set_frame_id`].
    pub fn set_time(&mut self, time: FrameTime) {
        self.time = time;
        for (_, camera) in &mut self.cameras {
            camera.time = time;
        }
    }

    /// The named result slot, created empty on first access.
    pub fn result(&mut self, name: &str) -> &mut AnyValue {
        self.data.result(name)
    }

    /// The named image slot, created empty on first access.
    pub fn image(&mut self, name: &str) -> &mut Image {
        self.data.image(name)
    }

    /// Append graphics to the named image slot, creating it if
    /// necessary.
    pub fn push_graphics(&mut self, name: &str, graphics: impl IntoIterator<Item = VectorGraphic>) {
        self.data.push_graphics(name, graphics)
    }

    /// The graphics overlaid on the named image slot. Fails with
    /// [`PipelineError::NotFound`] if the slot was never written.
    pub fn graphics(&self, name: &str) -> PipelineResult<&[VectorGraphic]> {
        self.data.graphics(name)
    }

    /// Visit every image slot this context (not its cameras) holds.
    pub fn for_each_image<F: FnMut(&str, &Image)>(&self, f: F) {
        self.data.for_each_image(f)
    }

    /// Visit every image slot this context (not its cameras) holds,
    /// mutably.
    pub fn for_each_image_mut<F: FnMut(&str, &mut Image)>(&mut self, f: F) {
        self.data.for_each_image_mut(f)
    }

    /// The named camera sub-context, created on first access.
    /// Lookup is idempotent and insertion order is preserved, so
    /// repeated calls with the same set of names always yield
    /// [`Self::cameras`] in the order those names were first seen.
    pub fn camera(&mut self, name: &str) -> &mut CameraContext {
        if let Some(idx) = self.cameras.iter().position(|(n, _)| n == name) {
            return &mut self.cameras[idx].1;
        }
        let mut camera = CameraContext::default();
        camera.frame_id = self.frame_id;
        camera.time = self.time;
        self.cameras.push((name.to_string(), camera));
        &mut self.cameras.last_mut().unwrap().1
    }

    /// All camera sub-contexts created so far, in first-seen order.
    pub fn cameras(&self) -> &[(String, CameraContext)] {
        &self.cameras
    }
}
