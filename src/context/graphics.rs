// SPDX-License-Identifier: GPL-3.0-only

//! Vector graphics overlaid on an image slot: a closed enum of
//! point/line/rectangle/text primitives.

use serde::{Deserialize, Serialize};

/// An RGB color, one byte per channel.
pub type Color = [u8; 3];

/// A pixel-space coordinate.
pub type Pixel = [f32; 2];

/// A single graphic primitive overlaid on an image, for the visualizer
/// to render on top of the selected frame. Serializes to
/// `{type: "point"|"line"|"rectangle"|"text", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VectorGraphic {
    Point { color: Color, point: Pixel },
    Line { color: Color, start: Pixel, end: Pixel },
    Rectangle {
        color: Color,
        #[serde(rename = "topLeft")]
        top_left: Pixel,
        #[serde(rename = "bottomRight")]
        bottom_right: Pixel,
    },
    Text { color: Color, point: Pixel, text: String },
}
