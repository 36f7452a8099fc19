//! Session lifecycle
//!
//! ```text
//! Connecting ──► Active ──► Closing ──► Closed
//!      │                       ▲
//!      └───────────────────────┘
//! ```
//!
//! The phase lives in a `tokio::sync::watch` channel: async loops await the
//! transition to `Closing`, and the processing worker thread polls it between
//! cycles. Transitions are compare-and-set under the channel's lock, so when
//! the receive path and a supervisor race to close, exactly one wins.

use std::fmt;
use std::sync::OnceLock;

use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Error as WsError;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connection accepted, worker started, loops not yet running
    Connecting,
    /// Receive and send loops running
    Active,
    /// Teardown in progress
    Closing,
    /// All resources released
    Closed,
}

impl SessionPhase {
    /// True once teardown has begun
    pub fn is_stopping(self) -> bool {
        matches!(self, SessionPhase::Closing | SessionPhase::Closed)
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent the `close` control message
    ClientClose,
    /// Transport closed by the peer
    Disconnected,
    /// Read or write failed
    TransportError,
    /// Server is shutting down
    Shutdown,
}

impl CloseReason {
    /// Classify a transport error: an orderly close is a disconnect
    pub fn from_transport_error(error: &WsError) -> Self {
        match error {
            WsError::ConnectionClosed | WsError::AlreadyClosed => CloseReason::Disconnected,
            _ => CloseReason::TransportError,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::ClientClose => "client close",
            CloseReason::Disconnected => "disconnected",
            CloseReason::TransportError => "transport error",
            CloseReason::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

/// Shared lifecycle handle for one session
#[derive(Debug)]
pub struct SessionControl {
    id: u64,
    phase: watch::Sender<SessionPhase>,
    reason: OnceLock<CloseReason>,
}

impl SessionControl {
    pub fn new(id: u64) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Connecting);
        Self {
            id,
            phase,
            reason: OnceLock::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// True once teardown has begun
    pub fn is_stopping(&self) -> bool {
        self.phase().is_stopping()
    }

    /// Reason recorded by the close that won
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.reason.get().copied()
    }

    /// `Connecting → Active`; false from any other phase
    pub fn activate(&self) -> bool {
        self.phase.send_if_modified(|phase| {
            if *phase == SessionPhase::Connecting {
                *phase = SessionPhase::Active;
                true
            } else {
                false
            }
        })
    }

    /// Enter `Closing`
    ///
    /// Returns true for exactly one caller; every later call is a no-op.
    pub fn begin_close(&self, reason: CloseReason) -> bool {
        let won = self.phase.send_if_modified(|phase| {
            if phase.is_stopping() {
                false
            } else {
                *phase = SessionPhase::Closing;
                true
            }
        });

        if won {
            let _ = self.reason.set(reason);
        }
        won
    }

    /// Enter `Closed`; false if already closed
    pub fn finish(&self) -> bool {
        self.phase.send_if_modified(|phase| {
            if *phase == SessionPhase::Closed {
                false
            } else {
                *phase = SessionPhase::Closed;
                true
            }
        })
    }

    /// Resolve once teardown has begun
    pub async fn stopped(&self) {
        let mut rx = self.phase.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|phase| phase.is_stopping()).await;
    }
}
