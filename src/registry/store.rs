//! Session registry implementation

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use super::config::RegistryConfig;
use super::entry::SessionEntry;
use super::error::RegistryError;
use crate::session::lifecycle::{CloseReason, SessionControl};
use crate::stats::{ServerStats, SessionCounters, SessionStats};

/// Process-wide registry of live sessions
///
/// Thread-safe via `RwLock`. Only insert and remove take the write lock;
/// stats and broadcast share read access.
pub struct SessionRegistry {
    /// Map of session ID to entry
    sessions: RwLock<HashMap<u64, SessionEntry>>,

    /// Sessions registered since creation
    total_sessions: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl SessionRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            total_sessions: AtomicU64::new(0),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a session
    ///
    /// Returns the receiver for broadcast notices addressed to it.
    pub async fn register(
        &self,
        peer_addr: SocketAddr,
        control: Arc<SessionControl>,
        counters: Arc<SessionCounters>,
    ) -> Result<mpsc::Receiver<String>, RegistryError> {
        let id = control.id();
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(&id) {
            return Err(RegistryError::DuplicateSession(id));
        }

        // `mpsc::channel` panics on a zero capacity
        let (tx, rx) = mpsc::channel(self.config.notice_capacity.max(1));
        sessions.insert(id, SessionEntry::new(peer_addr, control, counters, tx));
        self.total_sessions.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            session_id = id,
            peer = %peer_addr,
            sessions = sessions.len(),
            "Session registered"
        );

        Ok(rx)
    }

    /// Remove a session; false if it was not registered
    pub async fn deregister(&self, id: u64) -> bool {
        let mut sessions = self.sessions.write().await;

        match sessions.remove(&id) {
            Some(entry) => {
                tracing::info!(
                    session_id = id,
                    peer = %entry.peer_addr,
                    sessions = sessions.len(),
                    "Session deregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Begin closing a session and deregister it
    ///
    /// Safe to call from the session itself and from a supervisor at the same
    /// time: only the caller that moves the session into `Closing` runs the
    /// deregistration, every other call returns false.
    pub async fn close(&self, control: &SessionControl, reason: CloseReason) -> bool {
        if !control.begin_close(reason) {
            return false;
        }

        tracing::debug!(session_id = control.id(), reason = %reason, "Session closing");
        self.deregister(control.id()).await;
        true
    }

    /// Close every registered session
    ///
    /// Returns the number of sessions this call closed.
    pub async fn close_all(&self, reason: CloseReason) -> usize {
        // Collect first; `close` takes the write lock
        let controls: Vec<Arc<SessionControl>> = {
            let sessions = self.sessions.read().await;
            sessions.values().map(|e| Arc::clone(&e.control)).collect()
        };

        let mut closed = 0;
        for control in controls {
            if self.close(&control, reason).await {
                closed += 1;
            }
        }
        closed
    }

    /// Send a text notice to every session
    ///
    /// Never waits: a session whose notice queue is full misses this one.
    /// Returns the number of sessions the notice was queued for.
    pub async fn broadcast(&self, text: &str) -> usize {
        let sessions = self.sessions.read().await;

        let delivered = sessions.values().filter(|e| e.notify(text)).count();
        if delivered < sessions.len() {
            tracing::debug!(
                delivered = delivered,
                sessions = sessions.len(),
                "Broadcast notice dropped for some sessions"
            );
        }
        delivered
    }

    /// Check if a session is registered
    pub async fn contains(&self, id: u64) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Number of registered sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// IDs of registered sessions, ascending
    pub async fn session_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.sessions.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Statistics for one session
    pub async fn session_stats(&self, id: u64) -> Option<SessionStats> {
        self.sessions.read().await.get(&id).map(SessionEntry::stats)
    }

    /// Aggregate statistics over live sessions
    pub async fn server_stats(&self) -> ServerStats {
        let sessions = self.sessions.read().await;

        let mut stats = ServerStats::new();
        for entry in sessions.values() {
            stats.add_session(&entry.stats());
        }
        stats.total_sessions = self.total_sessions.load(Ordering::Relaxed);
        stats
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio_test::assert_ok;

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 50000)
    }

    async fn register(
        registry: &SessionRegistry,
        id: u64,
    ) -> (Arc<SessionControl>, mpsc::Receiver<String>) {
        let control = Arc::new(SessionControl::new(id));
        let rx = registry
            .register(addr(), Arc::clone(&control), Arc::new(SessionCounters::new()))
            .await
            .unwrap();
        (control, rx)
    }

    #[tokio::test]
    async fn test_register_deregister() {
        let registry = SessionRegistry::new();
        let (_control, _rx) = register(&registry, 1).await;

        assert!(registry.contains(1).await);
        assert_eq!(registry.session_count().await, 1);

        assert!(registry.deregister(1).await);
        assert!(!registry.deregister(1).await);
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_register() {
        let registry = SessionRegistry::new();
        let (_control, _rx) = register(&registry, 1).await;

        let result = registry
            .register(
                addr(),
                Arc::new(SessionControl::new(1)),
                Arc::new(SessionCounters::new()),
            )
            .await;
        assert_eq!(result.unwrap_err(), RegistryError::DuplicateSession(1));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let registry = SessionRegistry::new();
        let (control, _rx) = register(&registry, 3).await;
        control.activate();

        assert!(registry.close(&control, CloseReason::ClientClose).await);
        assert!(!registry.close(&control, CloseReason::TransportError).await);

        assert_eq!(registry.session_count().await, 0);
        assert_eq!(control.close_reason(), Some(CloseReason::ClientClose));
    }

    #[tokio::test]
    async fn test_racing_closes_deregister_once() {
        let registry = Arc::new(SessionRegistry::new());
        let (control, _rx) = register(&registry, 9).await;
        let (_other, _other_rx) = register(&registry, 10).await;

        let tasks: Vec<_> = [CloseReason::ClientClose, CloseReason::TransportError]
            .into_iter()
            .map(|reason| {
                let registry = Arc::clone(&registry);
                let control = Arc::clone(&control);
                tokio::spawn(async move { registry.close(&control, reason).await })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            if assert_ok!(task.await) {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(registry.session_ids().await, vec![10]);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all() {
        let registry = SessionRegistry::new();
        let (_c1, mut rx1) = register(&registry, 1).await;
        let (_c2, mut rx2) = register(&registry, 2).await;

        assert_eq!(registry.broadcast("hello").await, 2);
        assert_eq!(rx1.recv().await.as_deref(), Some("hello"));
        assert_eq!(rx2.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_broadcast_drops_when_queue_full() {
        let registry = SessionRegistry::with_config(RegistryConfig::default().notice_capacity(1));
        let (_c1, mut rx1) = register(&registry, 1).await;

        assert_eq!(registry.broadcast("first").await, 1);
        assert_eq!(registry.broadcast("second").await, 0);
        assert_eq!(rx1.recv().await.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_zero_notice_capacity_still_registers() {
        let registry = SessionRegistry::with_config(RegistryConfig { notice_capacity: 0 });
        let (_c1, mut rx1) = register(&registry, 1).await;

        assert_eq!(registry.broadcast("only").await, 1);
        assert_eq!(rx1.recv().await.as_deref(), Some("only"));
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = SessionRegistry::new();
        let (c1, _rx1) = register(&registry, 1).await;
        let (c2, _rx2) = register(&registry, 2).await;

        assert_eq!(registry.close_all(CloseReason::Shutdown).await, 2);
        assert_eq!(registry.session_count().await, 0);
        assert!(c1.is_stopping());
        assert!(c2.is_stopping());
    }

    #[tokio::test]
    async fn test_stats() {
        let registry = SessionRegistry::new();
        let control = Arc::new(SessionControl::new(5));
        let counters = Arc::new(SessionCounters::new());
        let _rx = registry
            .register(addr(), control, Arc::clone(&counters))
            .await
            .unwrap();

        counters.frame_received();
        counters.frame_sent(10);

        let stats = registry.session_stats(5).await.unwrap();
        assert_eq!(stats.frames_received, 1);
        assert_eq!(stats.frames_sent, 1);
        assert!(registry.session_stats(6).await.is_none());

        registry.deregister(5).await;
        let server = registry.server_stats().await;
        assert_eq!(server.total_sessions, 1);
        assert_eq!(server.active_sessions, 0);
    }
}
