//! Simple processors

use crate::error::ProcessorError;
use crate::media::frame::Frame;

use super::{FrameProcessor, ProcessParams};

/// Returns every frame unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughProcessor;

impl FrameProcessor for PassthroughProcessor {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn process(&self, frame: &Frame, _params: &ProcessParams) -> Result<Frame, ProcessorError> {
        Ok(frame.clone())
    }
}

/// Adapts a closure into a [`FrameProcessor`]
pub struct FnProcessor<F> {
    name: String,
    func: F,
}

impl<F> FnProcessor<F>
where
    F: Fn(&Frame, &ProcessParams) -> Result<Frame, ProcessorError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> FrameProcessor for FnProcessor<F>
where
    F: Fn(&Frame, &ProcessParams) -> Result<Frame, ProcessorError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, frame: &Frame, params: &ProcessParams) -> Result<Frame, ProcessorError> {
        (self.func)(frame, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_passthrough_returns_same_pixels() {
        let frame = Frame::from_image(RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])));
        let out = PassthroughProcessor
            .process(&frame, &ProcessParams::default())
            .unwrap();

        assert_eq!(out.pixels(), frame.pixels());
        assert_eq!(PassthroughProcessor.name(), "passthrough");
    }

    #[test]
    fn test_fn_processor_sees_params() {
        let processor = FnProcessor::new("prompted", |frame: &Frame, params: &ProcessParams| {
            match params.prompt.as_deref() {
                Some("invert") => {
                    let mut image = frame.to_image();
                    image::imageops::invert(&mut image);
                    Ok(Frame::from_image(image))
                }
                _ => Err(ProcessorError::Failed("unknown prompt".into())),
            }
        });

        let frame = Frame::from_image(RgbImage::from_pixel(1, 1, Rgb([0, 10, 255])));
        let params = ProcessParams::default().with_prompt("invert");
        let out = processor.process(&frame, &params).unwrap();
        assert_eq!(out.to_image().get_pixel(0, 0), &Rgb([255, 245, 0]));

        assert!(processor.process(&frame, &ProcessParams::default()).is_err());
        assert_eq!(processor.name(), "prompted");
    }
}
