// SPDX-License-Identifier: GPL-3.0-only

//! The visualizer: a stage that catalogs every `camera -> image`
//! pair produced so far, picks one (by client selection or by
//! default), encodes it, and streams it to connected websocket
//! clients.

mod server;
mod wire;

pub use server::{StreamSelection, WebSocketServer};
pub use wire::{encode_bmp, ControlMessage, OutboundFrame};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::FrameContext;
use crate::errors::{PipelineError, PipelineResult};
use crate::stage::{Policy, Stage};

/// The Ordered stage that drives the visualizer. Holds no state of
/// its own beyond the server handle — selection lives in the server
/// so a client's choice survives across frames.
pub struct VisualizerSink {
    name: String,
    server: Arc<WebSocketServer>,
}

impl VisualizerSink {
    pub fn new(server: Arc<WebSocketServer>) -> Self {
        Self { name: "visualizer".to_string(), server }
    }
}

impl Stage for VisualizerSink {
    fn policy(&self) -> Policy {
        Policy::Ordered
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, ctx: &mut FrameContext) -> PipelineResult<()> {
        let mut cameras: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut catalog: Vec<(String, String)> = Vec::new();
        for (camera_name, camera_ctx) in ctx.cameras() {
            let mut image_names = Vec::new();
            camera_ctx.for_each_image(|image_name, _| image_names.push(image_name.to_string()));
            for name in &image_names {
                catalog.push((camera_name.clone(), name.clone()));
            }
            cameras.insert(camera_name.clone(), image_names);
        }

        let selection = self
            .server
            .selection()
            .filter(|s| catalog.iter().any(|(c, i)| *c == s.camera && *i == s.image))
            .or_else(|| catalog.first().map(|(c, i)| StreamSelection { camera: c.clone(), image: i.clone() }));
        if let Some(selection) = &selection {
            self.server.set_default_selection(selection.clone());
        }

        let (width, height, image_bytes, graphics) = match &selection {
            Some(selection) => {
                let image = ctx.camera(&selection.camera).image(&selection.image).clone();
                let graphics = ctx
                    .camera(&selection.camera)
                    .graphics(&selection.image)
                    .map(|g| g.to_vec())
                    .unwrap_or_default();
                (image.width, image.height, Some(encode_bmp(&image)?), graphics)
            }
            None => (0, 0, None, Vec::new()),
        };

        let frame = OutboundFrame {
            frame_id: ctx.frame_id(),
            cameras,
            current: selection,
            width,
            height,
            image: image_bytes,
            graphics,
        };
        let bytes = serde_json::to_vec(&frame).map_err(|e| PipelineError::Sink(e.to_string()))?;
        self.server.broadcast(bytes);
        Ok(())
    }
}
