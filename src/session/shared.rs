//! Shared frame state
//!
//! The single point where the receive loop, the processing worker and the send
//! loop exchange frames. Every field holds only the latest value: writers
//! replace, readers copy out. There is no queue, so a fast writer may
//! overwrite a value no reader saw, and a slow reader may see the same value
//! twice.
//!
//! All four fields sit behind one mutex so a frame and the mask committed with
//! it are always read as a pair. The lock is held only to swap or clone
//! reference-counted values, never across processing or I/O.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::media::annotation::Annotation;
use crate::media::frame::Frame;
use crate::media::mask::SegmentationMask;

/// Immutable, shareable annotation list
pub type AnnotationList = Arc<[Annotation]>;

/// Input captured for one processing cycle
#[derive(Debug, Clone)]
pub struct InputSnapshot {
    /// Latest input frame (already masked if a mask was supplied)
    pub frame: Option<Frame>,
    /// Latest annotation list
    pub annotations: Option<AnnotationList>,
    /// Mask committed together with `frame`
    pub mask: Option<SegmentationMask>,
    /// Incremented on every input or annotation commit
    pub generation: u64,
}

#[derive(Debug, Default)]
struct Slots {
    input: Option<Frame>,
    annotations: Option<AnnotationList>,
    mask: Option<SegmentationMask>,
    output: Option<Frame>,
    generation: u64,
}

/// Latest-value frame exchange for one session
#[derive(Debug, Default)]
pub struct SharedFrameState {
    slots: Mutex<Slots>,
}

impl SharedFrameState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        // Slots are only ever replaced whole, so a poisoned lock still holds
        // a consistent value
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commit a new input frame with its mask, and optionally new annotations
    ///
    /// The frame and mask are replaced together: committing without a mask
    /// clears the stored one. Passing `None` for annotations keeps the current
    /// list; passing a list replaces it entirely.
    pub fn set_input(
        &self,
        frame: Frame,
        annotations: Option<AnnotationList>,
        mask: Option<SegmentationMask>,
    ) {
        let mut slots = self.lock();
        slots.input = Some(frame);
        slots.mask = mask;
        if annotations.is_some() {
            slots.annotations = annotations;
        }
        slots.generation += 1;
    }

    /// Replace the annotation list without touching the frame or mask
    pub fn set_annotations(&self, annotations: AnnotationList) {
        let mut slots = self.lock();
        slots.annotations = Some(annotations);
        slots.generation += 1;
    }

    /// Publish a processed frame
    pub fn set_output(&self, frame: Frame) {
        self.lock().output = Some(frame);
    }

    /// Copy out the current input, annotations and mask as one snapshot
    pub fn read_for_processing(&self) -> InputSnapshot {
        let slots = self.lock();
        InputSnapshot {
            frame: slots.input.clone(),
            annotations: slots.annotations.clone(),
            mask: slots.mask.clone(),
            generation: slots.generation,
        }
    }

    /// Frame to send: the latest output, else the latest input
    pub fn read_for_send(&self) -> Option<Frame> {
        let slots = self.lock();
        slots.output.clone().or_else(|| slots.input.clone())
    }

    /// Frame to send together with the mask committed alongside the input
    ///
    /// Both come from one lock scope, so a concurrent `set_input` is seen
    /// entirely or not at all.
    pub fn read_for_send_with_mask(&self) -> Option<(Frame, Option<SegmentationMask>)> {
        let slots = self.lock();
        let frame = slots.output.clone().or_else(|| slots.input.clone())?;
        Some((frame, slots.mask.clone()))
    }

    /// Current input generation
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::annotation::NormalizedBox;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn frame(size: u32, value: u8) -> Frame {
        Frame::from_image(RgbImage::from_pixel(size, size, Rgb([value, value, value])))
    }

    fn mask(size: u32) -> SegmentationMask {
        SegmentationMask::from_key_image(&RgbImage::new(size, size))
    }

    fn annotations(tag: &str) -> AnnotationList {
        Arc::from(vec![Annotation::new(
            tag,
            NormalizedBox {
                top_left_x: 0.0,
                top_left_y: 1.0,
                bottom_right_x: 1.0,
                bottom_right_y: 0.0,
            },
        )])
    }

    #[test]
    fn test_empty_state_reads_absent() {
        let state = SharedFrameState::new();

        let snapshot = state.read_for_processing();
        assert!(snapshot.frame.is_none());
        assert!(snapshot.annotations.is_none());
        assert!(snapshot.mask.is_none());
        assert_eq!(snapshot.generation, 0);
        assert!(state.read_for_send().is_none());
    }

    #[test]
    fn test_latest_wins() {
        let state = SharedFrameState::new();
        for value in 1..=10u8 {
            state.set_input(frame(2, value), None, None);
        }

        let snapshot = state.read_for_processing();
        assert_eq!(snapshot.frame.unwrap().pixels()[0], 10);
        assert_eq!(snapshot.generation, 10);
    }

    #[test]
    fn test_read_for_send_prefers_output() {
        let state = SharedFrameState::new();
        state.set_input(frame(2, 1), None, None);
        assert_eq!(state.read_for_send().unwrap().pixels()[0], 1);

        state.set_output(frame(2, 2));
        assert_eq!(state.read_for_send().unwrap().pixels()[0], 2);

        // A newer input does not hide the last good output
        state.set_input(frame(2, 3), None, None);
        assert_eq!(state.read_for_send().unwrap().pixels()[0], 2);
    }

    #[test]
    fn test_input_without_mask_clears_mask() {
        let state = SharedFrameState::new();
        state.set_input(frame(4, 1), None, Some(mask(4)));
        assert!(state.read_for_processing().mask.is_some());

        state.set_input(frame(4, 2), None, None);
        assert!(state.read_for_processing().mask.is_none());
    }

    #[test]
    fn test_annotations_replaced_wholesale_or_kept() {
        let state = SharedFrameState::new();
        state.set_input(frame(2, 1), Some(annotations("first")), None);
        state.set_input(frame(2, 2), None, None);
        assert_eq!(
            state.read_for_processing().annotations.unwrap()[0].obj_tag,
            "first"
        );

        state.set_annotations(annotations("second"));
        let snapshot = state.read_for_processing();
        assert_eq!(snapshot.annotations.unwrap()[0].obj_tag, "second");
        assert_eq!(snapshot.frame.unwrap().pixels()[0], 2);
        assert_eq!(snapshot.generation, 3);
    }

    #[test]
    fn test_snapshot_pairs_are_never_mixed() {
        let state = Arc::new(SharedFrameState::new());
        let done = Arc::new(AtomicBool::new(false));

        let writers: Vec<_> = (0..4u32)
            .map(|w| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    for i in 0..500u32 {
                        let size = 1 + (w * 7 + i) % 13;
                        state.set_input(frame(size, 1), None, Some(mask(size)));
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..2)
            .map(|_| {
                let state = Arc::clone(&state);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut checked = 0usize;
                    while !done.load(Ordering::Relaxed) {
                        let snapshot = state.read_for_processing();
                        if let (Some(frame), Some(mask)) = (snapshot.frame, snapshot.mask) {
                            assert_eq!(frame.dimensions(), mask.dimensions());
                            checked += 1;
                        }
                    }
                    checked
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::Relaxed);
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(state.generation(), 2000);
    }

    #[test]
    fn test_send_pair_matches_committed_input() {
        let state = Arc::new(SharedFrameState::new());
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let state = Arc::clone(&state);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut small = true;
                while !done.load(Ordering::Relaxed) {
                    let size = if small { 4 } else { 9 };
                    state.set_input(frame(size, 1), None, Some(mask(size)));
                    small = !small;
                }
            })
        };

        let mut checked = 0;
        while checked < 3000 {
            if let Some((frame, Some(mask))) = state.read_for_send_with_mask() {
                assert_eq!(frame.dimensions(), mask.dimensions());
                checked += 1;
            }
        }

        done.store(true, Ordering::Relaxed);
        writer.join().unwrap();
    }
}
