//! Object annotations
//!
//! Boxes arrive in normalized `[0, 1]` coordinates with the origin at the
//! bottom-left (the client projects them from a 3D scene). Raster coordinates
//! have the origin at the top-left, so `y` is flipped (`y' = 1 - y`) before
//! scaling to pixels.

use serde::{Deserialize, Serialize};

/// Bounding box in normalized, bottom-left-origin coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub top_left_x: f64,
    pub top_left_y: f64,
    pub bottom_right_x: f64,
    pub bottom_right_y: f64,
}

impl NormalizedBox {
    /// Check that every coordinate lies in `[0, 1]`
    pub fn is_normalized(&self) -> bool {
        [
            self.top_left_x,
            self.top_left_y,
            self.bottom_right_x,
            self.bottom_right_y,
        ]
        .iter()
        .all(|v| (0.0..=1.0).contains(v))
    }

    /// Convert to a top-left-origin pixel rectangle
    ///
    /// Returns `None` if any coordinate is out of range (boxes are skipped, not
    /// clamped) or if the box has no area once rounded to pixels.
    pub fn to_raster(&self, width: u32, height: u32) -> Option<RasterRect> {
        if !self.is_normalized() {
            return None;
        }

        let w = width as f64;
        let h = height as f64;

        let ya = (1.0 - self.top_left_y) * h;
        let yb = (1.0 - self.bottom_right_y) * h;
        let xa = self.top_left_x * w;
        let xb = self.bottom_right_x * w;

        let rect = RasterRect {
            left: xa.min(xb).round() as u32,
            top: ya.min(yb).round() as u32,
            right: xa.max(xb).round() as u32,
            bottom: ya.max(yb).round() as u32,
        };

        if rect.width() == 0 || rect.height() == 0 {
            return None;
        }
        Some(rect)
    }
}

/// Pixel rectangle, `right` and `bottom` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl RasterRect {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// A tagged object box as sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub obj_tag: String,
    pub bbox: NormalizedBox,
}

impl Annotation {
    pub fn new(obj_tag: impl Into<String>, bbox: NormalizedBox) -> Self {
        Self {
            obj_tag: obj_tag.into(),
            bbox,
        }
    }
}
