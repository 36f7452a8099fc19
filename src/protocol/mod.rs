//! Session wire protocol

pub mod message;

pub use message::{ClientMessage, DataMessage, ServerMessage, CLOSE_COMMAND};
