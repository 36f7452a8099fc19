//! Frame processing capabilities
//!
//! A [`FrameProcessor`] is the opaque, possibly slow transformation applied to
//! each frame by the session's processing worker. It runs on a dedicated
//! thread, so implementations may block for as long as they need.
//!
//! Model-backed implementations keep their heavy state in a [`LazyModel`],
//! a process-wide cell initialised at most once on first use.
//!
//! Built-in strategies:
//! - [`PassthroughProcessor`]: returns the frame unchanged
//! - [`DetectionOverlayProcessor`]: draws the boxes reported by a [`Detector`]
//! - [`FnProcessor`]: wraps a closure

pub mod builtin;
pub mod detection;
pub mod model;

pub use builtin::{FnProcessor, PassthroughProcessor};
pub use detection::{Detection, DetectionOverlayProcessor, Detector, PixelBox};
pub use model::LazyModel;

use crate::error::ProcessorError;
use crate::media::frame::Frame;

/// Per-call processing parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessParams {
    /// Free-form prompt for generative processors
    pub prompt: Option<String>,

    /// Candidate labels for zero-shot detectors
    pub labels: Vec<String>,
}

impl ProcessParams {
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }
}

/// Transformation applied to each frame
///
/// The returned frame may have different dimensions; the worker resizes it
/// back to the input size.
pub trait FrameProcessor: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str {
        "processor"
    }

    /// Process one frame
    fn process(&self, frame: &Frame, params: &ProcessParams) -> Result<Frame, ProcessorError>;
}
