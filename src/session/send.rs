//! Send loop
//!
//! Pushes the latest available frame to the client at a fixed cadence and
//! forwards broadcast notices from the registry as they arrive.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt};
use image::DynamicImage;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::lifecycle::CloseReason;
use super::shared::SharedFrameState;
use crate::error::Error;
use crate::media::codec;
use crate::media::frame::Frame;
use crate::media::mask::SegmentationMask;
use crate::media::overlay::Overlay;
use crate::protocol::ServerMessage;
use crate::stats::SessionCounters;

/// Send loop options
#[derive(Debug, Clone)]
pub struct SendConfig {
    /// Delay after a frame was sent
    pub send_interval: Duration,
    /// Delay when there was nothing to send
    pub idle_poll_interval: Duration,
    /// Attach the current mask as `seg_image`
    pub attach_mask: bool,
    /// Stamp the render time onto the attached mask (needs a font)
    pub stamp_timestamp: bool,
    pub overlay: Overlay,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_millis(150),
            idle_poll_interval: Duration::from_millis(100),
            attach_mask: true,
            stamp_timestamp: true,
            overlay: Overlay::new(),
        }
    }
}

/// Outbound half of a session
pub struct SendLoop {
    session_id: u64,
    state: Arc<SharedFrameState>,
    counters: Arc<SessionCounters>,
    config: SendConfig,
}

impl SendLoop {
    pub fn new(
        session_id: u64,
        state: Arc<SharedFrameState>,
        counters: Arc<SessionCounters>,
        config: SendConfig,
    ) -> Self {
        Self {
            session_id,
            state,
            counters,
            config,
        }
    }

    /// Send until a write fails
    ///
    /// Never returns on its own otherwise; the session cancels it at teardown.
    pub async fn run<K>(&self, mut sink: K, mut notices: mpsc::Receiver<String>) -> CloseReason
    where
        K: Sink<Message, Error = WsError> + Unpin,
    {
        let mut notices_open = true;

        loop {
            let delay = match self.send_latest(&mut sink).await {
                Ok(true) => self.config.send_interval,
                Ok(false) => self.config.idle_poll_interval,
                Err(e) => return self.write_failed(&e),
            };

            let tick = tokio::time::sleep(delay);
            tokio::pin!(tick);

            loop {
                tokio::select! {
                    _ = &mut tick => break,
                    notice = notices.recv(), if notices_open => match notice {
                        Some(text) => {
                            let len = text.len();
                            if let Err(e) = sink.send(Message::Text(text)).await {
                                return self.write_failed(&e);
                            }
                            self.counters.notice_sent(len);
                        }
                        // Registry dropped our entry
                        None => notices_open = false,
                    },
                }
            }
        }
    }

    /// Send the current frame, if there is one
    ///
    /// Returns whether a frame went out. Encoding failures are logged and
    /// treated as nothing to send; only write errors are returned.
    pub async fn send_latest<K>(&self, sink: &mut K) -> Result<bool, WsError>
    where
        K: Sink<Message, Error = WsError> + Unpin,
    {
        let Some((frame, mask)) = self.state.read_for_send_with_mask() else {
            return Ok(false);
        };

        let text = match self.build_message(&frame, mask.as_ref()) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(session_id = self.session_id, error = %e, "Failed to encode frame");
                return Ok(false);
            }
        };

        let len = text.len();
        sink.send(Message::Text(text)).await?;
        self.counters.frame_sent(len);
        tracing::trace!(session_id = self.session_id, bytes = len, "Frame sent");
        Ok(true)
    }

    /// Serialize `frame` plus the mask read with it into one outbound message
    pub fn build_message(&self, frame: &Frame, mask: Option<&SegmentationMask>) -> Result<String, Error> {
        let mut message = ServerMessage::new(codec::encode_frame(frame)?);

        if self.config.attach_mask {
            if let Some(mask) = mask {
                message = message.with_seg_image(self.render_mask(mask)?);
            }
        }

        Ok(message.to_json()?)
    }

    fn render_mask(&self, mask: &SegmentationMask) -> Result<String, Error> {
        let gray = mask.to_image();
        if !(self.config.stamp_timestamp && self.config.overlay.has_font()) {
            return Ok(codec::encode_gray(gray)?);
        }

        let mut rgb = DynamicImage::ImageLuma8(gray).to_rgb8();
        self.config.overlay.stamp_now(&mut rgb);
        Ok(codec::encode_rgb(rgb)?)
    }

    fn write_failed(&self, error: &WsError) -> CloseReason {
        tracing::debug!(session_id = self.session_id, error = %error, "Send failed");
        CloseReason::from_transport_error(error)
    }
}
