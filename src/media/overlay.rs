//! Frame overlays
//!
//! Draws annotation boxes, labels and render timestamps onto RGB images.
//! Geometry is always drawn; text needs a font and is skipped without one.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::media::annotation::{Annotation, RasterRect};

/// Box outline color
pub const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Label and timestamp color
pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const TEXT_SCALE: f32 = 18.0;
const STAMP_ORIGIN: (i32, i32) = (10, 10);

/// Overlay renderer
#[derive(Clone, Default)]
pub struct Overlay {
    font: Option<FontArc>,
}

impl std::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overlay")
            .field("has_font", &self.font.is_some())
            .finish()
    }
}

impl Overlay {
    /// Overlay without text rendering
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay rendering text with `font`
    pub fn with_font(font: FontArc) -> Self {
        Self { font: Some(font) }
    }

    /// Load a TrueType/OpenType font from disk
    pub fn load_font(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        let font = FontArc::try_from_vec(data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Self::with_font(font))
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw every annotation whose box is in range
    ///
    /// Returns the number of boxes drawn; out-of-range boxes are skipped.
    pub fn draw_annotations(&self, image: &mut RgbImage, annotations: &[Annotation]) -> usize {
        let (width, height) = image.dimensions();
        let mut drawn = 0;

        for annotation in annotations {
            match annotation.bbox.to_raster(width, height) {
                Some(rect) => {
                    self.draw_box(image, rect, Some(&annotation.obj_tag));
                    drawn += 1;
                }
                None => {
                    tracing::trace!(tag = %annotation.obj_tag, "Skipping out-of-range box");
                }
            }
        }

        drawn
    }

    /// Draw a rectangle outline with an optional label above it
    pub fn draw_box(&self, image: &mut RgbImage, rect: RasterRect, label: Option<&str>) {
        if rect.width() == 0 || rect.height() == 0 {
            return;
        }

        let outer = Rect::at(rect.left as i32, rect.top as i32).of_size(rect.width(), rect.height());
        draw_hollow_rect_mut(image, outer, BOX_COLOR);

        // Second, inset pass for a 2px outline
        if rect.width() > 2 && rect.height() > 2 {
            let inner = Rect::at(rect.left as i32 + 1, rect.top as i32 + 1)
                .of_size(rect.width() - 2, rect.height() - 2);
            draw_hollow_rect_mut(image, inner, BOX_COLOR);
        }

        if let (Some(font), Some(label)) = (&self.font, label) {
            let y = (rect.top as i32 - TEXT_SCALE as i32).max(0);
            draw_text_mut(
                image,
                BOX_COLOR,
                rect.left as i32,
                y,
                PxScale::from(TEXT_SCALE),
                font,
                label,
            );
        }
    }

    /// Stamp `text` in the top-left corner
    ///
    /// Returns false if no font is loaded.
    pub fn stamp(&self, image: &mut RgbImage, text: &str) -> bool {
        let Some(font) = &self.font else {
            return false;
        };

        draw_text_mut(
            image,
            TEXT_COLOR,
            STAMP_ORIGIN.0,
            STAMP_ORIGIN.1,
            PxScale::from(TEXT_SCALE),
            font,
            text,
        );
        true
    }

    /// Stamp the current local render time
    pub fn stamp_now(&self, image: &mut RgbImage) -> bool {
        self.stamp(image, &render_timestamp())
    }
}

/// Local wall-clock time with millisecond precision
pub fn render_timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}
