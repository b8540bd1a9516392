// SPDX-License-Identifier: GPL-3.0-only

//! The visualizer's wire format: what goes out over the websocket for
//! a selected frame, and what a client sends back to change the
//! selection. Encoded as JSON via `serde_json` rather than a binary
//! map format (see DESIGN.md).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::context::{ElementType, Image, VectorGraphic};
use crate::errors::{PipelineError, PipelineResult};
use crate::sink::server::StreamSelection;

/// A frame pushed to every connected client:
/// `{cameras, current, image, graphics}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub frame_id: u64,
    /// Every camera discovered this frame, mapped to the image slot
    /// names it has written.
    pub cameras: BTreeMap<String, Vec<String>>,
    /// The camera/image pair actually encoded below, if any catalog
    /// entry exists yet.
    pub current: Option<StreamSelection>,
    pub width: u32,
    pub height: u32,
    /// BMP-encoded pixel data of the selected image, absent when
    /// `current` is `None`.
    pub image: Option<Vec<u8>>,
    /// The selected image's vector-graphic overlays.
    pub graphics: Vec<VectorGraphic>,
}

/// A client's request to change which camera/image pair is streamed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
    pub camera: String,
    pub image: String,
}

/// BMP-encode an image for the wire. Only `U8` images are currently
/// supported by the sink; wider element types would need a
/// normalization step before encoding.
pub fn encode_bmp(image: &Image) -> PipelineResult<Vec<u8>> {
    if image.element_type != ElementType::U8 {
        return Err(PipelineError::Sink(format!(
            "visualizer can only encode U8 images, got {:?}",
            image.element_type
        )));
    }
    if image.is_empty() {
        return Err(PipelineError::Sink("cannot encode an empty image".into()));
    }

    let buffer = image::GrayImage::from_raw(image.width, image.height, image.data.to_vec())
        .ok_or_else(|| PipelineError::Sink("image dimensions don't match buffer length".into()))?;

    let mut bytes = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut bytes);
    image::DynamicImage::ImageLuma8(buffer)
        .write_to(&mut cursor, image::ImageFormat::Bmp)
        .map_err(|e| PipelineError::Sink(e.to_string()))?;
    Ok(bytes)
}
