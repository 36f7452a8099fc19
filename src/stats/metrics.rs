//! Statistics for frame sessions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live per-session counters
///
/// Updated from the receive and send tasks and the worker thread without
/// locking; read as a [`SessionStats`] snapshot.
#[derive(Debug, Default)]
pub struct SessionCounters {
    frames_received: AtomicU64,
    frames_discarded: AtomicU64,
    malformed_messages: AtomicU64,
    frames_processed: AtomicU64,
    processing_failures: AtomicU64,
    frames_sent: AtomicU64,
    notices_sent: AtomicU64,
    bytes_sent: AtomicU64,
}

impl SessionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_discarded(&self) {
        self.frames_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn malformed_message(&self) {
        self.malformed_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_processed(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processing_failed(&self) {
        self.processing_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_sent(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn notice_sent(&self, bytes: usize) {
        self.notices_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Take a snapshot
    pub fn snapshot(&self, duration: Duration) -> SessionStats {
        SessionStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
            malformed_messages: self.malformed_messages.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            processing_failures: self.processing_failures.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            notices_sent: self.notices_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            duration,
        }
    }
}

/// Session-level statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    /// Frames decoded and committed
    pub frames_received: u64,
    /// All-zero frames dropped on receipt
    pub frames_discarded: u64,
    /// Messages skipped because they could not be parsed or decoded
    pub malformed_messages: u64,
    /// Successful processing cycles
    pub frames_processed: u64,
    /// Processing cycles that produced no output
    pub processing_failures: u64,
    /// Frame messages written to the client
    pub frames_sent: u64,
    /// Broadcast notices written to the client
    pub notices_sent: u64,
    /// Total payload bytes written
    pub bytes_sent: u64,
    /// Session age at snapshot time
    pub duration: Duration,
}

impl SessionStats {
    /// Outbound frames per second over the session lifetime
    pub fn send_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.frames_sent as f64 / secs
        } else {
            0.0
        }
    }

    /// Outbound bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration.as_secs();
        if secs > 0 {
            (self.bytes_sent * 8) / secs
        } else {
            0
        }
    }
}

/// Server-wide statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerStats {
    /// Sessions accepted since start
    pub total_sessions: u64,
    /// Sessions currently registered
    pub active_sessions: u64,
    /// Frames received across live sessions
    pub frames_received: u64,
    /// Frames sent across live sessions
    pub frames_sent: u64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a session snapshot into the totals
    pub fn add_session(&mut self, stats: &SessionStats) {
        self.active_sessions += 1;
        self.frames_received += stats.frames_received;
        self.frames_sent += stats.frames_sent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_counters_new() {
        let stats = SessionCounters::new().snapshot(Duration::ZERO);
        assert_eq!(stats, SessionStats::default());
    }

    #[test]
    fn test_counters_accumulate() {
        let counters = SessionCounters::new();
        counters.frame_received();
        counters.frame_received();
        counters.frame_discarded();
        counters.malformed_message();
        counters.frame_processed();
        counters.processing_failed();
        counters.frame_sent(100);
        counters.notice_sent(20);

        let stats = counters.snapshot(Duration::from_secs(2));
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.frames_discarded, 1);
        assert_eq!(stats.malformed_messages, 1);
        assert_eq!(stats.frames_processed, 1);
        assert_eq!(stats.processing_failures, 1);
        assert_eq!(stats.frames_sent, 1);
        assert_eq!(stats.notices_sent, 1);
        assert_eq!(stats.bytes_sent, 120);
    }

    #[test]
    fn test_session_stats_bitrate() {
        let stats = SessionStats {
            bytes_sent: 1_000_000,
            duration: Duration::from_secs(10),
            ..Default::default()
        };

        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(stats.bitrate(), 800_000);
    }

    #[test]
    fn test_session_stats_zero_duration() {
        let stats = SessionStats {
            bytes_sent: 1_000_000,
            frames_sent: 10,
            ..Default::default()
        };

        assert_eq!(stats.bitrate(), 0);
        assert_eq!(stats.send_rate(), 0.0);
    }

    #[test]
    fn test_send_rate() {
        let stats = SessionStats {
            frames_sent: 30,
            duration: Duration::from_secs(3),
            ..Default::default()
        };
        assert!((stats.send_rate() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_server_stats_fold() {
        let mut server = ServerStats::new();
        let session = SessionStats {
            frames_received: 5,
            frames_sent: 3,
            ..Default::default()
        };

        server.add_session(&session);
        server.add_session(&session);

        assert_eq!(server.active_sessions, 2);
        assert_eq!(server.frames_received, 10);
        assert_eq!(server.frames_sent, 6);
    }
}
