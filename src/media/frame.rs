//! Decoded frame type
//!
//! A [`Frame`] is an RGB8 raster plus the instant it was received. Pixel data
//! lives in a `bytes::Bytes`, so cloning a frame out of shared state only bumps
//! a reference count; the pixels themselves are never copied or mutated after
//! construction.

use std::time::Instant;

use bytes::Bytes;
use image::RgbImage;

use crate::error::CodecError;

/// Bytes per pixel (RGB8)
pub const CHANNELS: usize = 3;

/// An immutable decoded raster image
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Bytes,
    received_at: Instant,
}

impl Frame {
    /// Create a frame from raw RGB8 pixels
    ///
    /// Fails if the buffer length does not match the dimensions, so a frame
    /// with pixels that disagree with its width and height cannot exist.
    pub fn new(width: u32, height: u32, pixels: impl Into<Bytes>) -> Result<Self, CodecError> {
        let pixels = pixels.into();
        if pixels.len() != width as usize * height as usize * CHANNELS {
            return Err(CodecError::DimensionMismatch {
                width,
                height,
                len: pixels.len(),
            });
        }

        Ok(Self {
            width,
            height,
            pixels,
            received_at: Instant::now(),
        })
    }

    /// Take ownership of an RGB image buffer
    pub fn from_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: Bytes::from(image.into_raw()),
            received_at: Instant::now(),
        }
    }

    /// Copy the pixels into a mutable image buffer
    pub fn to_image(&self) -> RgbImage {
        RgbImage::from_raw(self.width, self.height, self.pixels.to_vec())
            .expect("frame pixel length is validated at construction")
    }

    /// Same frame with a different receipt instant
    pub fn with_received_at(mut self, at: Instant) -> Self {
        self.received_at = at;
        self
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

    pub fn pixels(&self) -> &Bytes {
        &self.pixels
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    /// True if every channel of every pixel is zero
    ///
    /// Clients send an all-black canvas before their first real capture; such
    /// frames carry no content and are discarded on receipt.
    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|&b| b == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_length() {
        assert!(Frame::new(2, 2, vec![0u8; 12]).is_ok());

        let err = Frame::new(2, 2, vec![0u8; 11]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::DimensionMismatch {
                width: 2,
                height: 2,
                len: 11
            }
        ));
    }

    #[test]
    fn test_blank_detection() {
        let blank = Frame::new(4, 4, vec![0u8; 48]).unwrap();
        assert!(blank.is_blank());

        let mut data = vec![0u8; 48];
        data[47] = 1;
        let not_blank = Frame::new(4, 4, data).unwrap();
        assert!(!not_blank.is_blank());
    }

    #[test]
    fn test_image_conversion_preserves_pixels() {
        let image = RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        let frame = Frame::from_image(image.clone());

        assert_eq!(frame.dimensions(), (3, 2));
        assert_eq!(frame.to_image(), image);
    }

    #[test]
    fn test_clone_shares_pixels() {
        let frame = Frame::new(1, 1, vec![1u8, 2, 3]).unwrap();
        let cloned = frame.clone();
        assert_eq!(frame.pixels().as_ptr(), cloned.pixels().as_ptr());
    }
}
