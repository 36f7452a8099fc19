//! Frame server listener
//!
//! Handles the TCP accept loop, the WebSocket upgrade, and spawns one
//! session per connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

use crate::error::Result;
use crate::media::overlay::Overlay;
use crate::processor::FrameProcessor;
use crate::registry::SessionRegistry;
use crate::server::config::ServerConfig;
use crate::session::{CloseReason, Session, SessionConfig};

/// The WebSocket handshake must complete within this time
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Frame streaming server
pub struct FrameServer {
    config: ServerConfig,
    session_config: SessionConfig,
    processor: Arc<dyn FrameProcessor>,
    registry: Arc<SessionRegistry>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    /// Set once shutdown starts; connections still upgrading watch it
    shutdown: watch::Sender<bool>,
    /// One task per accepted connection
    connections: Mutex<JoinSet<()>>,
}

impl FrameServer {
    /// Create a new server with the given configuration and processor
    ///
    /// A configured font that fails to load is logged and text overlays are
    /// disabled.
    pub fn new<P>(config: ServerConfig, processor: P) -> Self
    where
        P: FrameProcessor + 'static,
    {
        Self::with_shared_processor(config, Arc::new(processor))
    }

    /// Create a new server around an already shared processor
    pub fn with_shared_processor(config: ServerConfig, processor: Arc<dyn FrameProcessor>) -> Self {
        let overlay = match &config.font_path {
            Some(path) => Overlay::load_font(path).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load font, text overlays disabled");
                Overlay::new()
            }),
            None => Overlay::new(),
        };

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            session_config: config.session_config(overlay),
            registry: Arc::new(SessionRegistry::with_config(config.registry_config())),
            config,
            processor,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            shutdown: watch::Sender::new(false),
            connections: Mutex::new(JoinSet::new()),
        }
    }

    fn connections(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a reference to the session registry
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server until the process exits
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// Returns once every connection task has ended, including connections
    /// that were still upgrading when shutdown began.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, path = %self.config.path, "Frame server listening");

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        // Flag first so a session registering after `close_all` still stops
        self.shutdown.send_replace(true);
        let closed = self.registry.close_all(CloseReason::Shutdown).await;
        if closed > 0 {
            tracing::info!(sessions = closed, "Closed live sessions");
        }

        let mut connections = std::mem::take(&mut *self.connections());
        while connections.join_next().await.is_some() {}
        tracing::debug!("All connections finished");

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = match &self.connection_semaphore {
            Some(sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            },
            None => None,
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = socket.set_nodelay(true) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let path = self.config.path.clone();
        let session_config = self.session_config.clone();
        let registry = Arc::clone(&self.registry);
        let processor = Arc::clone(&self.processor);
        let mut shutdown = self.shutdown.subscribe();

        let mut connections = self.connections();
        // Reap finished connections
        while connections.try_join_next().is_some() {}

        connections.spawn(async move {
            let _permit = permit;

            let upgrade = accept_hdr_async(socket, move |request: &Request, response: Response| {
                check_path(&path, request, response)
            });
            let ws = tokio::select! {
                upgraded = tokio::time::timeout(HANDSHAKE_TIMEOUT, upgrade) => match upgraded {
                    Ok(Ok(ws)) => ws,
                    Ok(Err(e)) => {
                        tracing::debug!(session_id = session_id, error = %e, "WebSocket handshake failed");
                        return;
                    }
                    Err(_) => {
                        tracing::debug!(session_id = session_id, "WebSocket handshake timed out");
                        return;
                    }
                },
                _ = shutdown_started(&mut shutdown) => {
                    tracing::debug!(session_id = session_id, "Handshake abandoned on shutdown");
                    return;
                }
            };

            let session = Session::new(session_id, peer_addr, session_config, Arc::clone(&registry), processor);
            let control = Arc::clone(session.control());
            let run = session.run(ws);
            tokio::pin!(run);

            // Shutdown may have begun before this session registered
            let result = tokio::select! {
                result = &mut run => result,
                _ = shutdown_started(&mut shutdown) => {
                    registry.close(&control, CloseReason::Shutdown).await;
                    run.await
                }
            };

            match result {
                Ok(reason) => {
                    tracing::debug!(session_id = session_id, reason = %reason, "Connection closed");
                }
                Err(e) => {
                    tracing::debug!(session_id = session_id, error = %e, "Connection error");
                }
            }
        });
    }
}

async fn shutdown_started(shutdown: &mut watch::Receiver<bool>) {
    // The sender lives in the server, which outlives every connection task
    let _ = shutdown.wait_for(|stopping| *stopping).await;
}

/// Accept the upgrade only on the configured endpoint
fn check_path(expected: &str, request: &Request, response: Response) -> std::result::Result<Response, ErrorResponse> {
    let path = request.uri().path();
    if path == expected {
        return Ok(response);
    }

    tracing::debug!(path = %path, "Rejecting upgrade for unknown path");
    let mut error = ErrorResponse::new(Some(format!("No endpoint at {}", path)));
    *error.status_mut() = StatusCode::NOT_FOUND;
    Err(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::PassthroughProcessor;

    fn request(path: &str) -> Request {
        Request::builder().uri(path).body(()).unwrap()
    }

    #[test]
    fn test_check_path_accepts_endpoint() {
        let result = check_path("/image_process", &request("/image_process"), Response::new(()));
        assert!(result.is_ok());
    }

    #[test]
    fn test_check_path_rejects_other_paths() {
        let error = check_path("/image_process", &request("/other"), Response::new(())).unwrap_err();
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_missing_font_disables_text() {
        let config = ServerConfig::default().font_path("/nonexistent/font.ttf");
        let server = FrameServer::new(config, PassthroughProcessor);

        assert!(!server.session_config.send.overlay.has_font());
        assert!(!server.session_config.worker.overlay.has_font());
    }

    #[tokio::test]
    async fn test_shutdown_stops_serving() {
        let server = FrameServer::new(ServerConfig::default(), PassthroughProcessor);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            server.serve_until(listener, async {}),
        )
        .await
        .expect("returns on shutdown");
        assert!(result.is_ok());
    }
}
