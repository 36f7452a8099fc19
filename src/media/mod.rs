//! Frame media handling
//!
//! This module provides:
//! - The immutable [`Frame`] raster
//! - Data-URL image codec (decode any container, encode PNG)
//! - Normalized annotation boxes and their raster conversion
//! - Green-keyed segmentation masks
//! - Box, label and timestamp overlays

pub mod annotation;
pub mod codec;
pub mod frame;
pub mod mask;
pub mod overlay;

pub use annotation::{Annotation, NormalizedBox, RasterRect};
pub use frame::Frame;
pub use mask::{SegmentationMask, MASK_KEY};
pub use overlay::Overlay;
