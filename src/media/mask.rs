//! Segmentation masks
//!
//! The client renders the region of interest in pure green `(0, 255, 0)` on a
//! secondary image. A pixel belongs to the mask only on an exact match; anything
//! else, including near-green, is background.

use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::media::frame::{Frame, CHANNELS};

/// Exact key color marking foreground pixels
pub const MASK_KEY: Rgb<u8> = Rgb([0, 255, 0]);

/// Binary per-pixel region, one byte per pixel (`1` = foreground)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    width: u32,
    height: u32,
    bits: Bytes,
}

impl SegmentationMask {
    /// Derive a mask from a key image by exact match against [`MASK_KEY`]
    pub fn from_key_image(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let bits: Vec<u8> = image.pixels().map(|p| u8::from(*p == MASK_KEY)).collect();

        Self {
            width,
            height,
            bits: Bytes::from(bits),
        }
    }

    /// Derive a mask sized to `width x height`
    ///
    /// A key image of a different size is resampled with nearest-neighbour so
    /// key pixels keep their exact color.
    pub fn from_key_image_sized(image: &RgbImage, width: u32, height: u32) -> Self {
        if image.dimensions() == (width, height) {
            Self::from_key_image(image)
        } else {
            let resized = imageops::resize(image, width, height, FilterType::Nearest);
            Self::from_key_image(&resized)
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the pixel at `(x, y)` is foreground; out of bounds is background
    pub fn contains(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.bits[(y * self.width + x) as usize] != 0
    }

    /// Number of foreground pixels
    pub fn foreground_count(&self) -> usize {
        self.bits.iter().filter(|&&b| b != 0).count()
    }

    /// Zero out every pixel of `frame` outside the mask
    ///
    /// Returns a new frame; the input is untouched. Returns `None` if the
    /// dimensions differ.
    pub fn apply(&self, frame: &Frame) -> Option<Frame> {
        if frame.dimensions() != self.dimensions() {
            return None;
        }

        let mut pixels = frame.pixels().to_vec();
        for (px, &bit) in pixels.chunks_exact_mut(CHANNELS).zip(self.bits.iter()) {
            if bit == 0 {
                px.fill(0);
            }
        }

        Frame::new(frame.width(), frame.height(), pixels)
            .ok()
            .map(|masked| masked.with_received_at(frame.received_at()))
    }

    /// Render as a black/white image (foreground = 255)
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.contains(x, y) { 255 } else { 0 }])
        })
    }
}
