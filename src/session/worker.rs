//! Processing worker
//!
//! Runs the frame processor on a dedicated OS thread so a slow call never
//! stalls the receive or send tasks. Each cycle:
//!
//! 1. Idle while the session is still connecting or no new input exists
//! 2. Snapshot `(frame, annotations, mask)` from [`SharedFrameState`]
//! 3. Draw annotations onto a copy of the frame
//! 4. Run the processor (one call at a time, no backlog)
//! 5. Resize the result back to the input dimensions
//! 6. Stamp the render time and publish it with `set_output`
//!
//! Inputs that arrive during a call simply overwrite each other; the next
//! cycle picks up whichever is latest. A failed or panicking call is logged
//! and the previous output stays visible.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use image::imageops::{self, FilterType};

use super::lifecycle::{SessionControl, SessionPhase};
use super::shared::SharedFrameState;
use crate::error::ProcessorError;
use crate::media::frame::Frame;
use crate::media::overlay::Overlay;
use crate::processor::{FrameProcessor, ProcessParams};
use crate::stats::SessionCounters;

/// Worker options
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between polls when there is nothing to do
    pub idle_interval: Duration,
    /// Parameters passed to every processor call
    pub params: ProcessParams,
    /// Renderer for annotations and the timestamp stamp
    pub overlay: Overlay,
    /// Stamp the render time onto each output (needs a font)
    pub stamp_timestamp: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_millis(50),
            params: ProcessParams::default(),
            overlay: Overlay::new(),
            stamp_timestamp: true,
        }
    }
}

/// Outcome of one worker cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No input newer than the last processed one
    Idle,
    /// A new output was published
    Published,
    /// The processor failed; output left unchanged
    Failed(ProcessorError),
    /// The session began closing during the call; result discarded
    Discarded,
}

/// Background processing activity for one session
pub struct ProcessingWorker {
    session_id: u64,
    state: Arc<SharedFrameState>,
    control: Arc<SessionControl>,
    processor: Arc<dyn FrameProcessor>,
    counters: Arc<SessionCounters>,
    config: WorkerConfig,
    last_generation: u64,
}

impl ProcessingWorker {
    pub fn new(
        control: Arc<SessionControl>,
        state: Arc<SharedFrameState>,
        processor: Arc<dyn FrameProcessor>,
        counters: Arc<SessionCounters>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            session_id: control.id(),
            state,
            control,
            processor,
            counters,
            config,
            last_generation: 0,
        }
    }

    /// Start the worker on its own thread
    pub fn spawn(self) -> std::io::Result<WorkerHandle> {
        let name = format!("frame-worker-{}", self.session_id);
        let thread = thread::Builder::new().name(name).spawn(move || self.run())?;

        Ok(WorkerHandle {
            thread: Some(thread),
        })
    }

    fn run(mut self) {
        tracing::debug!(
            session_id = self.session_id,
            processor = self.processor.name(),
            "Processing worker started"
        );

        loop {
            match self.control.phase() {
                SessionPhase::Closing | SessionPhase::Closed => break,
                SessionPhase::Connecting => {
                    thread::sleep(self.config.idle_interval);
                    continue;
                }
                SessionPhase::Active => {}
            }

            if self.run_cycle() == CycleOutcome::Idle {
                thread::sleep(self.config.idle_interval);
            }
        }

        tracing::debug!(session_id = self.session_id, "Processing worker stopped");
    }

    /// Run one processing cycle
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let snapshot = self.state.read_for_processing();
        let Some(frame) = snapshot.frame else {
            return CycleOutcome::Idle;
        };
        if snapshot.generation == self.last_generation {
            return CycleOutcome::Idle;
        }
        self.last_generation = snapshot.generation;

        let input = match snapshot.annotations.as_deref() {
            Some(annotations) if !annotations.is_empty() => {
                let mut image = frame.to_image();
                self.config.overlay.draw_annotations(&mut image, annotations);
                Frame::from_image(image).with_received_at(frame.received_at())
            }
            _ => frame.clone(),
        };

        let started = Instant::now();
        let result = self.call_processor(&input);

        if self.control.is_stopping() {
            return CycleOutcome::Discarded;
        }

        match result {
            Ok(output) => {
                let output = self.finish_output(output, &frame);
                self.state.set_output(output);
                self.counters.frame_processed();

                tracing::trace!(
                    session_id = self.session_id,
                    generation = snapshot.generation,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Frame processed"
                );
                CycleOutcome::Published
            }
            Err(e) => {
                self.counters.processing_failed();
                tracing::warn!(
                    session_id = self.session_id,
                    processor = self.processor.name(),
                    error = %e,
                    "Frame processing failed"
                );
                CycleOutcome::Failed(e)
            }
        }
    }

    fn call_processor(&self, input: &Frame) -> Result<Frame, ProcessorError> {
        let processor = &self.processor;
        let params = &self.config.params;

        panic::catch_unwind(AssertUnwindSafe(|| processor.process(input, params)))
            .unwrap_or_else(|payload| Err(ProcessorError::Panicked(panic_message(&payload))))
    }

    /// Resize to the source dimensions and stamp the render time
    fn finish_output(&self, output: Frame, source: &Frame) -> Frame {
        let (width, height) = source.dimensions();
        let needs_resize = output.dimensions() != (width, height);
        let needs_stamp = self.config.stamp_timestamp && self.config.overlay.has_font();

        if !needs_resize && !needs_stamp {
            return output.with_received_at(source.received_at());
        }

        let mut image = output.to_image();
        if needs_resize {
            image = imageops::resize(&image, width, height, FilterType::Triangle);
        }
        if needs_stamp {
            self.config.overlay.stamp_now(&mut image);
        }

        Frame::from_image(image).with_received_at(source.received_at())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Handle to a running worker thread
pub struct WorkerHandle {
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Check if the thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the thread to exit without blocking the async runtime
    ///
    /// The caller must have moved the session into `Closing` first.
    pub async fn join(mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => tracing::error!("Processing worker thread panicked"),
            Err(e) => tracing::error!(error = %e, "Failed to join processing worker"),
        }
    }
}
