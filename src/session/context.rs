//! Per-connection session
//!
//! A [`Session`] owns one connection's shared frame state, its processing
//! worker and its receive and send loops.
//!
//! Startup: register with the registry, start the worker (the session is
//! still `Connecting`), split the socket, enter `Active` and run both loops.
//!
//! Teardown runs once, whichever side triggers it: the first loop to finish,
//! or a supervisor closing the session through the registry. The session
//! moves to `Closing` and deregisters, the other loop is dropped, the
//! socket is closed, the worker is joined and the session ends `Closed`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;

use super::lifecycle::{CloseReason, SessionControl};
use super::receive::ReceiveLoop;
use super::send::{SendConfig, SendLoop};
use super::shared::SharedFrameState;
use super::worker::{ProcessingWorker, WorkerConfig, WorkerHandle};
use crate::error::Result;
use crate::processor::FrameProcessor;
use crate::registry::SessionRegistry;
use crate::stats::{SessionCounters, SessionStats};

/// Upper bound on the closing handshake with the client
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-session options
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub worker: WorkerConfig,
    pub send: SendConfig,
}

/// One client connection
pub struct Session {
    peer_addr: SocketAddr,
    config: SessionConfig,
    control: Arc<SessionControl>,
    state: Arc<SharedFrameState>,
    counters: Arc<SessionCounters>,
    registry: Arc<SessionRegistry>,
    processor: Arc<dyn FrameProcessor>,
    started_at: Instant,
}

impl Session {
    pub fn new(
        id: u64,
        peer_addr: SocketAddr,
        config: SessionConfig,
        registry: Arc<SessionRegistry>,
        processor: Arc<dyn FrameProcessor>,
    ) -> Self {
        Self {
            peer_addr,
            config,
            control: Arc::new(SessionControl::new(id)),
            state: Arc::new(SharedFrameState::new()),
            counters: Arc::new(SessionCounters::new()),
            registry,
            processor,
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.control.id()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Lifecycle handle; closing through it stops the session
    pub fn control(&self) -> &Arc<SessionControl> {
        &self.control
    }

    pub fn state(&self) -> &Arc<SharedFrameState> {
        &self.state
    }

    /// Current counters
    pub fn stats(&self) -> SessionStats {
        self.counters.snapshot(self.started_at.elapsed())
    }

    /// Run the session to completion
    ///
    /// Returns why it ended. Errors are limited to startup failures;
    /// everything after the loops start ends in an orderly teardown.
    pub async fn run<S>(self, ws: WebSocketStream<S>) -> Result<CloseReason>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let id = self.id();

        let notices = self
            .registry
            .register(
                self.peer_addr,
                Arc::clone(&self.control),
                Arc::clone(&self.counters),
            )
            .await?;

        let worker = ProcessingWorker::new(
            Arc::clone(&self.control),
            Arc::clone(&self.state),
            Arc::clone(&self.processor),
            Arc::clone(&self.counters),
            self.config.worker.clone(),
        );
        let worker = match worker.spawn() {
            Ok(handle) => handle,
            Err(e) => {
                self.registry.close(&self.control, CloseReason::TransportError).await;
                self.control.finish();
                return Err(e.into());
            }
        };

        let (mut sink, mut stream) = ws.split();
        let receiver = ReceiveLoop::new(id, Arc::clone(&self.state), Arc::clone(&self.counters));
        let sender = SendLoop::new(
            id,
            Arc::clone(&self.state),
            Arc::clone(&self.counters),
            self.config.send.clone(),
        );

        if self.control.activate() {
            tracing::debug!(session_id = id, peer = %self.peer_addr, "Session active");
        }

        let reason = tokio::select! {
            reason = receiver.run(&mut stream) => reason,
            reason = sender.run(&mut sink, notices) => reason,
            _ = self.control.stopped() => {
                self.control.close_reason().unwrap_or(CloseReason::Shutdown)
            }
        };

        // A supervisor may have closed us first, possibly before we registered
        if !self.registry.close(&self.control, reason).await {
            self.registry.deregister(id).await;
        }
        let reason = self.control.close_reason().unwrap_or(reason);

        if reason != CloseReason::TransportError {
            match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::trace!(session_id = id, error = %e, "Close handshake failed"),
                Err(_) => tracing::debug!(session_id = id, "Close handshake timed out"),
            }
        }

        Ok(self.finish(worker, reason).await)
    }

    async fn finish(&self, worker: WorkerHandle, reason: CloseReason) -> CloseReason {
        worker.join().await;
        self.control.finish();

        let stats = self.stats();
        tracing::info!(
            session_id = self.id(),
            peer = %self.peer_addr,
            reason = %reason,
            frames_received = stats.frames_received,
            frames_processed = stats.frames_processed,
            frames_sent = stats.frames_sent,
            duration_ms = stats.duration.as_millis() as u64,
            "Session closed"
        );
        reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::PassthroughProcessor;
    use crate::session::lifecycle::SessionPhase;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio_tungstenite::tungstenite::protocol::Role;
    use tokio_tungstenite::tungstenite::Message;

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000)
    }

    async fn pair() -> (
        WebSocketStream<tokio::io::DuplexStream>,
        WebSocketStream<tokio::io::DuplexStream>,
    ) {
        let (server, client) = tokio::io::duplex(1 << 20);
        let server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(client, Role::Client, None).await;
        (server, client)
    }

    #[tokio::test]
    async fn test_close_message_ends_session() {
        let registry = Arc::new(SessionRegistry::new());
        let session = Session::new(
            1,
            addr(),
            SessionConfig::default(),
            Arc::clone(&registry),
            Arc::new(PassthroughProcessor),
        );
        let control = Arc::clone(session.control());
        let (server, mut client) = pair().await;

        let task = tokio::spawn(session.run(server));
        client.send(Message::Text("close".into())).await.unwrap();

        let reason = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("session ends")
            .unwrap()
            .unwrap();

        assert_eq!(reason, CloseReason::ClientClose);
        assert_eq!(control.phase(), SessionPhase::Closed);
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_supervisor_close_stops_session() {
        let registry = Arc::new(SessionRegistry::new());
        let session = Session::new(
            2,
            addr(),
            SessionConfig::default(),
            Arc::clone(&registry),
            Arc::new(PassthroughProcessor),
        );
        let (server, _client) = pair().await;

        let task = tokio::spawn(session.run(server));
        while !registry.contains(2).await {
            tokio::task::yield_now().await;
        }

        assert_eq!(registry.close_all(CloseReason::Shutdown).await, 1);
        let reason = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("session ends")
            .unwrap()
            .unwrap();

        assert_eq!(reason, CloseReason::Shutdown);
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_closed_before_start_leaves_registry_empty() {
        let registry = Arc::new(SessionRegistry::new());
        let session = Session::new(
            4,
            addr(),
            SessionConfig::default(),
            Arc::clone(&registry),
            Arc::new(PassthroughProcessor),
        );
        let control = Arc::clone(session.control());
        let (server, _client) = pair().await;

        // Nothing is registered yet, so this only flips the phase
        assert!(registry.close(&control, CloseReason::Shutdown).await);

        let reason = tokio::time::timeout(Duration::from_secs(2), session.run(server))
            .await
            .expect("session ends")
            .unwrap();

        assert_eq!(reason, CloseReason::Shutdown);
        assert_eq!(control.phase(), SessionPhase::Closed);
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let registry = Arc::new(SessionRegistry::new());
        let _rx = registry
            .register(
                addr(),
                Arc::new(SessionControl::new(3)),
                Arc::new(SessionCounters::new()),
            )
            .await
            .unwrap();

        let session = Session::new(
            3,
            addr(),
            SessionConfig::default(),
            Arc::clone(&registry),
            Arc::new(PassthroughProcessor),
        );
        let (server, _client) = pair().await;

        assert!(session.run(server).await.is_err());
        assert_eq!(registry.session_count().await, 1);
    }
}
