//! WebSocket frame server
//!
//! [`FrameServer`] accepts connections on the configured endpoint and runs a
//! [`Session`](crate::session::Session) for each one.

pub mod config;
pub mod listener;

pub use config::ServerConfig;
pub use listener::FrameServer;
