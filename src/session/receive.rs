//! Receive loop
//!
//! Reads messages off the connection and commits decoded frames into
//! [`SharedFrameState`]. A bad message is logged and skipped; only the `close`
//! literal or a transport failure ends the loop.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::lifecycle::CloseReason;
use super::shared::{AnnotationList, SharedFrameState};
use crate::error::Error;
use crate::media::codec;
use crate::media::mask::SegmentationMask;
use crate::protocol::{ClientMessage, DataMessage};
use crate::stats::SessionCounters;

/// What a single data message changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// State was updated
    Committed {
        frame: bool,
        annotations: bool,
        mask: bool,
    },
    /// Primary image was all zeros; nothing changed
    Blank,
    /// Nothing usable in the message
    Ignored,
}

/// Whether the loop keeps reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Inbound half of a session
pub struct ReceiveLoop {
    session_id: u64,
    state: Arc<SharedFrameState>,
    counters: Arc<SessionCounters>,
}

impl ReceiveLoop {
    pub fn new(session_id: u64, state: Arc<SharedFrameState>, counters: Arc<SessionCounters>) -> Self {
        Self {
            session_id,
            state,
            counters,
        }
    }

    /// Read until the client closes or the transport fails
    pub async fn run<S>(&self, mut stream: S) -> CloseReason
    where
        S: Stream<Item = Result<Message, WsError>> + Unpin,
    {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if self.handle_text(&text) == Flow::Close {
                        tracing::debug!(session_id = self.session_id, "Close message received");
                        return CloseReason::ClientClose;
                    }
                }
                Ok(Message::Binary(data)) => {
                    tracing::debug!(
                        session_id = self.session_id,
                        len = data.len(),
                        "Ignoring binary message"
                    );
                }
                Ok(Message::Close(frame)) => {
                    tracing::debug!(session_id = self.session_id, frame = ?frame, "Peer closed connection");
                    return CloseReason::Disconnected;
                }
                // Ping/pong are answered by the transport
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(session_id = self.session_id, error = %e, "Receive failed");
                    return CloseReason::from_transport_error(&e);
                }
            }
        }

        CloseReason::Disconnected
    }

    /// Handle one text message
    pub fn handle_text(&self, text: &str) -> Flow {
        let result = ClientMessage::parse(text)
            .map_err(Error::from)
            .and_then(|message| match message {
                ClientMessage::Close => Ok(None),
                ClientMessage::Data(data) => self.apply(data).map(Some),
            });

        match result {
            Ok(None) => Flow::Close,
            Ok(Some(outcome)) => {
                tracing::trace!(session_id = self.session_id, outcome = ?outcome, "Message applied");
                Flow::Continue
            }
            Err(e) => {
                self.counters.malformed_message();
                tracing::warn!(session_id = self.session_id, error = %e, "Skipping malformed message");
                Flow::Continue
            }
        }
    }

    /// Decode a data message and commit what it carries
    ///
    /// Any decode failure rejects the whole message without touching state.
    pub fn apply(&self, data: DataMessage) -> Result<ReceiveOutcome, Error> {
        if data.is_empty() {
            return Ok(ReceiveOutcome::Ignored);
        }
        let annotations: Option<AnnotationList> = data.bboxes.map(AnnotationList::from);

        let Some(image_url) = data.image else {
            if data.seg_image.is_some() {
                tracing::warn!(session_id = self.session_id, "Ignoring seg_image without image");
            }
            return Ok(match annotations {
                Some(list) => {
                    self.state.set_annotations(list);
                    ReceiveOutcome::Committed {
                        frame: false,
                        annotations: true,
                        mask: false,
                    }
                }
                None => ReceiveOutcome::Ignored,
            });
        };

        let frame = codec::decode_frame(&image_url)?;
        if frame.is_blank() {
            self.counters.frame_discarded();
            return Ok(ReceiveOutcome::Blank);
        }

        let (frame, mask) = match data.seg_image {
            Some(seg_url) => {
                let key = codec::decode_image(&seg_url)?;
                let mask = SegmentationMask::from_key_image_sized(&key, frame.width(), frame.height());
                let masked = mask.apply(&frame).unwrap_or(frame);
                (masked, Some(mask))
            }
            None => (frame, None),
        };

        let outcome = ReceiveOutcome::Committed {
            frame: true,
            annotations: annotations.is_some(),
            mask: mask.is_some(),
        };

        self.state.set_input(frame, annotations, mask);
        self.counters.frame_received();
        Ok(outcome)
    }
}
