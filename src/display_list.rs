//! Display list – the frozen paint description of a laid-out region.
//!
//! Everything is in logical px with the region's top-left at the origin. The
//! capture stage scales it onto a device-pixel surface; nothing here knows
//! about the output resolution.

use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::style::{Color, GradientDirection};

/// A laid-out region ready for rasterization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayList {
    /// Logical width the region was laid out at.
    pub width: f32,
    /// Natural height of the region at that width.
    pub height: f32,
    /// Paint items in back-to-front order.
    pub items: Vec<PaintItem>,
}

/// Axis-aligned rectangle in logical px.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// RGBA with components in 0.0 – 1.0.
pub type Rgba = [f32; 4];

impl From<Color> for [f32; 4] {
    fn from(c: Color) -> Self {
        [c.r, c.g, c.b, c.a]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Fill {
    Solid(Rgba),
    LinearGradient {
        direction: GradientAxis,
        from: Rgba,
        to: Rgba,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradientAxis {
    ToRight,
    ToLeft,
    ToBottom,
    ToTop,
}

impl From<GradientDirection> for GradientAxis {
    fn from(d: GradientDirection) -> Self {
        match d {
            GradientDirection::ToRight => GradientAxis::ToRight,
            GradientDirection::ToLeft => GradientAxis::ToLeft,
            GradientDirection::ToBottom => GradientAxis::ToBottom,
            GradientDirection::ToTop => GradientAxis::ToTop,
        }
    }
}

/// One line of text, positioned by the top of its line box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub x: f32,
    /// Baseline position.
    pub baseline: f32,
    pub width: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaintItem {
    Rect {
        rect: LayoutRect,
        fill: Fill,
        radius: f32,
    },
    /// Per-side border widths (top, right, bottom, left) drawn inside `rect`.
    Border {
        rect: LayoutRect,
        widths: [f32; 4],
        color: Rgba,
    },
    Text {
        lines: Vec<TextLine>,
        font_size: f32,
        bold: bool,
        italic: bool,
        underline: bool,
        color: Rgba,
    },
    Image {
        rect: LayoutRect,
        src: String,
        /// Decoded pixels; `None` when the image was unreadable and is
        /// painted blank.
        #[serde(skip)]
        pixels: Option<Arc<RgbaImage>>,
    },
}

impl DisplayList {
    /// Serialise to JSON for inspection.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Number of images that will paint blank.
    pub fn blank_images(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i, PaintItem::Image { pixels: None, .. }))
            .count()
    }
}
