// SPDX-License-Identifier: GPL-3.0-only

//! The image slot: a named, reference-counted pixel buffer plus any
//! vector graphics overlaid on it for the visualizer.

use std::sync::Arc;

use crate::context::graphics::VectorGraphic;

/// The scalar type of each element in [`Image::data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    U8,
    U16,
    F32,
}

/// An opaque pixel buffer. Stages interpret `data` according to
/// `width`, `height`, and `element_type`; the core pipeline never
/// looks inside it.
#[derive(Debug, Clone)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub element_type: ElementType,
    pub data: Arc<[u8]>,
}

impl Image {
    /// A zero-sized `U8` image — the value a freshly created image
    /// slot starts with.
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            element_type: ElementType::U8,
            data: Arc::from(&[][..]),
        }
    }

    /// True if this image has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for Image {
    fn default() -> Self {
        Self::empty()
    }
}

/// An image plus whatever vector graphics a stage has overlaid on it.
/// A named slot's presence (as opposed to its contents) is what
/// distinguishes "never written" from "written, currently empty".
#[derive(Debug, Clone, Default)]
pub struct ImageSlot {
    pub(crate) image: Image,
    pub(crate) graphics: Vec<VectorGraphic>,
}

impl ImageSlot {
    pub(crate) fn clear(&mut self) {
        self.image = Image::empty();
        self.graphics.clear();
    }
}
