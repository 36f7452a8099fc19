//! Frame streaming sessions
//!
//! Each connection runs three activities around one [`SharedFrameState`]:
//!
//! ```text
//!  client ──► ReceiveLoop ──► SharedFrameState ──► SendLoop ──► client
//!                                 │      ▲
//!                                 ▼      │
//!                            ProcessingWorker (OS thread)
//! ```
//!
//! The loops are tokio tasks; the worker runs on its own thread so a slow
//! processor never stalls receiving or sending. [`SessionControl`] carries
//! the lifecycle and the stop signal shared by all three.

pub mod context;
pub mod lifecycle;
pub mod receive;
pub mod send;
pub mod shared;
pub mod worker;

pub use context::{Session, SessionConfig};
pub use lifecycle::{CloseReason, SessionControl, SessionPhase};
pub use receive::{ReceiveLoop, ReceiveOutcome};
pub use send::{SendConfig, SendLoop};
pub use shared::{AnnotationList, InputSnapshot, SharedFrameState};
pub use worker::{CycleOutcome, ProcessingWorker, WorkerConfig, WorkerHandle};
