//! Registry entry
//!
//! This module defines the per-session record stored in the registry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::session::lifecycle::SessionControl;
use crate::stats::{SessionCounters, SessionStats};

/// Entry for a single live session
#[derive(Debug)]
pub struct SessionEntry {
    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// When the session registered
    pub connected_at: Instant,

    /// Lifecycle handle, used to close the session from outside
    pub control: Arc<SessionControl>,

    /// Live counters
    pub counters: Arc<SessionCounters>,

    /// Sender for broadcast notices, drained by the session's send loop
    pub(super) notice_tx: mpsc::Sender<String>,
}

impl SessionEntry {
    pub(super) fn new(
        peer_addr: SocketAddr,
        control: Arc<SessionControl>,
        counters: Arc<SessionCounters>,
        notice_tx: mpsc::Sender<String>,
    ) -> Self {
        Self {
            peer_addr,
            connected_at: Instant::now(),
            control,
            counters,
            notice_tx,
        }
    }

    /// Snapshot of this session's counters
    pub fn stats(&self) -> SessionStats {
        self.counters.snapshot(self.connected_at.elapsed())
    }

    /// Queue a notice without waiting
    ///
    /// Returns false if the session's queue is full or its send loop is gone.
    pub(super) fn notify(&self, text: &str) -> bool {
        self.notice_tx.try_send(text.to_owned()).is_ok()
    }
}
