//! Detector integration
//!
//! A [`Detector`] finds labelled objects in a frame (zero-shot detectors take
//! the candidate labels as input). [`DetectionOverlayProcessor`] turns any
//! detector into a frame processor that draws the detections.

use crate::error::ProcessorError;
use crate::media::annotation::RasterRect;
use crate::media::frame::Frame;
use crate::media::overlay::Overlay;

use super::model::LazyModel;
use super::{FrameProcessor, ProcessParams};

/// Box in pixel coordinates, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub xmin: u32,
    pub ymin: u32,
    pub xmax: u32,
    pub ymax: u32,
}

impl PixelBox {
    /// Clip to the frame; `None` if nothing remains
    pub fn clip(&self, width: u32, height: u32) -> Option<RasterRect> {
        let rect = RasterRect {
            left: self.xmin.min(width),
            top: self.ymin.min(height),
            right: self.xmax.min(width),
            bottom: self.ymax.min(height),
        };

        if rect.width() == 0 || rect.height() == 0 {
            None
        } else {
            Some(rect)
        }
    }
}

/// A single detected object
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub score: f32,
    pub bbox: PixelBox,
}

/// Object detector capability
pub trait Detector: Send + Sync {
    fn detect(&self, frame: &Frame, labels: &[String]) -> Result<Vec<Detection>, ProcessorError>;
}

/// Draws detector output onto each frame
///
/// The detector lives in a process-wide [`LazyModel`] and is loaded on the
/// first frame, so constructing the processor is cheap.
pub struct DetectionOverlayProcessor<D: 'static> {
    model: &'static LazyModel<D>,
    init: fn() -> Result<D, ProcessorError>,
    overlay: Overlay,
    min_score: f32,
}

impl<D: Detector + 'static> DetectionOverlayProcessor<D> {
    pub fn new(model: &'static LazyModel<D>, init: fn() -> Result<D, ProcessorError>) -> Self {
        Self {
            model,
            init,
            overlay: Overlay::new(),
            min_score: 0.0,
        }
    }

    /// Render labels with this overlay
    pub fn overlay(mut self, overlay: Overlay) -> Self {
        self.overlay = overlay;
        self
    }

    /// Drop detections scoring below `min_score`
    pub fn min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

impl<D: Detector + 'static> FrameProcessor for DetectionOverlayProcessor<D> {
    fn name(&self) -> &str {
        "detection-overlay"
    }

    fn process(&self, frame: &Frame, params: &ProcessParams) -> Result<Frame, ProcessorError> {
        let detector = self.model.get_or_try_init(self.init)?;
        let detections = detector.detect(frame, &params.labels)?;

        let mut image = frame.to_image();
        let (width, height) = image.dimensions();
        let mut drawn = 0usize;

        for detection in detections.iter().filter(|d| d.score >= self.min_score) {
            if let Some(rect) = detection.bbox.clip(width, height) {
                let label = format!("{} {:.2}", detection.label, detection.score);
                self.overlay.draw_box(&mut image, rect, Some(&label));
                drawn += 1;
            }
        }

        tracing::trace!(detections = detections.len(), drawn = drawn, "Detections drawn");
        Ok(Frame::from_image(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::overlay::BOX_COLOR;
    use image::{Rgb, RgbImage};

    struct FixedDetector;

    impl Detector for FixedDetector {
        fn detect(
            &self,
            _frame: &Frame,
            labels: &[String],
        ) -> Result<Vec<Detection>, ProcessorError> {
            Ok(labels
                .iter()
                .enumerate()
                .map(|(i, label)| Detection {
                    label: label.clone(),
                    score: 0.3 * (i + 1) as f32,
                    bbox: PixelBox {
                        xmin: 2 + i as u32 * 10,
                        ymin: 2,
                        xmax: 8 + i as u32 * 10,
                        ymax: 8,
                    },
                })
                .collect())
        }
    }

    #[test]
    fn test_draws_detections_above_threshold() {
        static MODEL: LazyModel<FixedDetector> = LazyModel::new();
        let processor = DetectionOverlayProcessor::new(&MODEL, || Ok(FixedDetector)).min_score(0.5);

        let frame = Frame::from_image(RgbImage::new(32, 16));
        let params = ProcessParams::default().with_labels(["low", "high"]);
        let out = processor.process(&frame, &params).unwrap().to_image();

        // "low" scores 0.3 and is filtered out; "high" scores 0.6
        assert_eq!(out.get_pixel(2, 2), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(12, 2), &BOX_COLOR);
        assert!(MODEL.is_initialized());
    }

    #[test]
    fn test_init_failure_propagates() {
        static MODEL: LazyModel<FixedDetector> = LazyModel::new();
        let processor = DetectionOverlayProcessor::new(&MODEL, || {
            Err(ProcessorError::Init("no device".into()))
        });

        let frame = Frame::from_image(RgbImage::new(4, 4));
        let err = processor
            .process(&frame, &ProcessParams::default())
            .unwrap_err();
        assert_eq!(err, ProcessorError::Init("no device".into()));
    }

    #[test]
    fn test_pixel_box_clip() {
        let bbox = PixelBox {
            xmin: 5,
            ymin: 5,
            xmax: 50,
            ymax: 50,
        };
        let rect = bbox.clip(20, 10).unwrap();
        assert_eq!((rect.right, rect.bottom), (20, 10));

        let outside = PixelBox {
            xmin: 30,
            ymin: 0,
            xmax: 40,
            ymax: 5,
        };
        assert!(outside.clip(20, 10).is_none());
    }
}
