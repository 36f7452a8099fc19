//! Error types
//!
//! Errors are grouped by how a session reacts to them:
//! - [`CodecError`] and [`ProtocolError`]: malformed input, the message is skipped
//! - [`ProcessorError`]: processing failed, the cycle is skipped
//! - transport errors never surface here; the loops classify them into a
//!   [`CloseReason`](crate::session::CloseReason) and the session is torn down
//!
//! [`Error`] is what startup and the server return: bind and accept failures
//! ([`Error::Io`]), duplicate registration ([`Error::Registry`]). The codec,
//! protocol and processor conversions let embedding code use `?` across the
//! crate's APIs.

use std::fmt;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Socket level I/O error
    Io(std::io::Error),
    /// Image payload could not be decoded or encoded
    Codec(CodecError),
    /// Message structure was not understood
    Protocol(ProtocolError),
    /// Frame processor failure
    Processing(ProcessorError),
    /// Session could not be registered
    Registry(crate::registry::RegistryError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Codec(e) => write!(f, "Codec error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Processing(e) => write!(f, "Processing error: {}", e),
            Error::Registry(e) => write!(f, "Registry error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Codec(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Processing(e) => Some(e),
            Error::Registry(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<crate::registry::RegistryError> for Error {
    fn from(e: crate::registry::RegistryError) -> Self {
        Error::Registry(e)
    }
}

impl From<ProcessorError> for Error {
    fn from(e: ProcessorError) -> Self {
        Error::Processing(e)
    }
}

/// Image encode/decode errors
#[derive(Debug)]
pub enum CodecError {
    /// Data URL has no `,` separating header from payload
    MissingSeparator,
    /// Payload is not valid base64
    Base64(base64::DecodeError),
    /// Compressed container could not be decoded or encoded
    Image(image::ImageError),
    /// Pixel buffer length does not match `width * height * 3`
    DimensionMismatch {
        width: u32,
        height: u32,
        len: usize,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::MissingSeparator => write!(f, "data URL is missing ',' separator"),
            CodecError::Base64(e) => write!(f, "invalid base64 payload: {}", e),
            CodecError::Image(e) => write!(f, "image container error: {}", e),
            CodecError::DimensionMismatch { width, height, len } => write!(
                f,
                "pixel buffer of {} bytes does not match {}x{} RGB",
                len, width, height
            ),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Base64(e) => Some(e),
            CodecError::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<base64::DecodeError> for CodecError {
    fn from(e: base64::DecodeError) -> Self {
        CodecError::Base64(e)
    }
}

impl From<image::ImageError> for CodecError {
    fn from(e: image::ImageError) -> Self {
        CodecError::Image(e)
    }
}

/// Wire message errors
#[derive(Debug)]
pub enum ProtocolError {
    /// Text payload is not valid JSON for the inbound message shape
    InvalidJson(serde_json::Error),
    /// Outbound message could not be serialized
    Serialize(serde_json::Error),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::InvalidJson(e) => write!(f, "invalid message: {}", e),
            ProtocolError::Serialize(e) => write!(f, "failed to serialize message: {}", e),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::InvalidJson(e) | ProtocolError::Serialize(e) => Some(e),
        }
    }
}

/// Frame processor and detector errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    /// Model or resource could not be initialised
    Init(String),
    /// Processing call failed
    Failed(String),
    /// Processor panicked; the payload message if it was a string
    Panicked(String),
}

impl fmt::Display for ProcessorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorError::Init(msg) => write!(f, "initialisation failed: {}", msg),
            ProcessorError::Failed(msg) => write!(f, "processing failed: {}", msg),
            ProcessorError::Panicked(msg) => write!(f, "processor panicked: {}", msg),
        }
    }
}

impl std::error::Error for ProcessorError {}
