//! Wire image codec
//!
//! Images travel as data URLs: `data:image/<format>;base64,<payload>`. Decoding
//! strips the header, base64-decodes the payload and decompresses the container
//! (format is sniffed from the bytes, the header is informational only).
//! Encoding always produces PNG.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};

use crate::error::CodecError;
use crate::media::frame::Frame;

/// Header prepended to every encoded image
pub const PNG_DATA_URL_HEADER: &str = "data:image/png;base64,";

/// Decode a data URL into an RGB image
pub fn decode_image(data_url: &str) -> Result<RgbImage, CodecError> {
    let (_header, payload) = data_url
        .split_once(',')
        .ok_or(CodecError::MissingSeparator)?;

    let compressed = STANDARD.decode(payload.trim())?;
    let image = image::load_from_memory(&compressed)?;

    Ok(image.to_rgb8())
}

/// Decode a data URL into a [`Frame`]
pub fn decode_frame(data_url: &str) -> Result<Frame, CodecError> {
    decode_image(data_url).map(Frame::from_image)
}

/// Encode a frame as a PNG data URL
pub fn encode_frame(frame: &Frame) -> Result<String, CodecError> {
    encode_image(DynamicImage::ImageRgb8(frame.to_image()))
}

/// Encode a grayscale image (e.g. a rendered mask) as a PNG data URL
pub fn encode_gray(image: GrayImage) -> Result<String, CodecError> {
    encode_image(DynamicImage::ImageLuma8(image))
}

/// Encode an RGB image as a PNG data URL
pub fn encode_rgb(image: RgbImage) -> Result<String, CodecError> {
    encode_image(DynamicImage::ImageRgb8(image))
}

fn encode_image(image: DynamicImage) -> Result<String, CodecError> {
    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, ImageFormat::Png)?;

    let payload = STANDARD.encode(png.into_inner());
    let mut url = String::with_capacity(PNG_DATA_URL_HEADER.len() + payload.len());
    url.push_str(PNG_DATA_URL_HEADER);
    url.push_str(&payload);
    Ok(url)
}
