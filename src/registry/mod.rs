//! Session registry
//!
//! The registry tracks every live session for diagnostics and broadcast. It
//! never influences how a single session handles frames.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<SessionRegistry>
//!                   ┌──────────────────────────┐
//!                   │ sessions: HashMap<Id,    │
//!                   │   SessionEntry {         │
//!                   │     control, counters,   │
//!                   │     notice_tx: mpsc::Tx, │
//!                   │   }                      │
//!                   │ >                        │
//!                   └────────────┬─────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!   [accept path]          [Session A]             [Session B]
//!   register()             notice_rx ─► SendLoop   notice_rx ─► SendLoop
//!                          close() ─► deregister() close() ─► deregister()
//! ```
//!
//! Registration happens on the accept path while other sessions deregister
//! from their own tasks; the map is behind a `tokio::sync::RwLock` so both
//! can proceed concurrently.

pub mod config;
pub mod entry;
pub mod error;
pub mod store;

pub use config::RegistryConfig;
pub use entry::SessionEntry;
pub use error::RegistryError;
pub use store::SessionRegistry;
