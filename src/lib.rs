//! Real-time frame streaming over WebSocket
//!
//! A client streams camera frames as JSON text messages carrying base64
//! data-URL images, optional normalized bounding boxes and an optional
//! green-keyed segmentation mask. Each connection gets a session that
//! decodes the latest frame, runs it through a pluggable
//! [`FrameProcessor`](processor::FrameProcessor) on a worker thread and
//! streams the latest result back at a steady cadence.
//!
//! Frames are latest-wins: intermediate inputs are overwritten, never queued.
//!
//! # Example
//!
//! ```no_run
//! use frame_relay::processor::PassthroughProcessor;
//! use frame_relay::{FrameServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> frame_relay::Result<()> {
//!     let server = FrameServer::new(ServerConfig::default(), PassthroughProcessor);
//!     server
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//! }
//! ```

pub mod error;
pub mod media;
pub mod processor;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use media::Frame;
pub use processor::{FrameProcessor, ProcessParams};
pub use registry::SessionRegistry;
pub use server::{FrameServer, ServerConfig};
pub use session::{CloseReason, Session, SessionConfig};
