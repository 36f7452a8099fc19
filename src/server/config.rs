//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::media::overlay::Overlay;
use crate::processor::ProcessParams;
use crate::registry::RegistryConfig;
use crate::session::{SendConfig, SessionConfig, WorkerConfig};

/// Default listening port
pub const DEFAULT_PORT: u16 = 8000;

/// Default WebSocket endpoint path
pub const DEFAULT_PATH: &str = "/image_process";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// WebSocket endpoint; other request paths get a 404
    pub path: String,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Send cadence after a frame went out
    pub send_interval: Duration,

    /// Send cadence while there is nothing to send
    pub idle_poll_interval: Duration,

    /// Worker poll interval while idle; also bounds how long a stop takes
    /// to be observed
    pub worker_idle_interval: Duration,

    /// Attach the segmentation mask to outbound messages
    pub attach_mask: bool,

    /// Stamp render times onto outbound images
    pub stamp_timestamp: bool,

    /// Font for labels and timestamps; text is skipped without one
    pub font_path: Option<PathBuf>,

    /// Per-session broadcast queue depth
    pub notice_capacity: usize,

    /// Parameters handed to every processor call
    pub process_params: ProcessParams,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            path: DEFAULT_PATH.to_string(),
            max_connections: 0, // Unlimited
            send_interval: Duration::from_millis(150),
            idle_poll_interval: Duration::from_millis(100),
            worker_idle_interval: Duration::from_millis(50),
            attach_mask: true,
            stamp_timestamp: true,
            font_path: None,
            notice_capacity: 32,
            process_params: ProcessParams::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the endpoint path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the send cadence with and without a frame to send
    pub fn send_intervals(mut self, send: Duration, idle_poll: Duration) -> Self {
        self.send_interval = send;
        self.idle_poll_interval = idle_poll;
        self
    }

    /// Set the worker idle poll interval
    pub fn worker_idle_interval(mut self, interval: Duration) -> Self {
        self.worker_idle_interval = interval;
        self
    }

    /// Do not attach the segmentation mask
    pub fn disable_mask(mut self) -> Self {
        self.attach_mask = false;
        self
    }

    /// Do not stamp render times
    pub fn disable_timestamp(mut self) -> Self {
        self.stamp_timestamp = false;
        self
    }

    /// Set the overlay font
    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_path = Some(path.into());
        self
    }

    /// Set the broadcast queue depth (minimum 1)
    pub fn notice_capacity(mut self, capacity: usize) -> Self {
        self.notice_capacity = capacity.max(1);
        self
    }

    /// Set processor parameters
    pub fn process_params(mut self, params: ProcessParams) -> Self {
        self.process_params = params;
        self
    }

    /// Registry options derived from this config
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::default().notice_capacity(self.notice_capacity)
    }

    /// Per-session options, rendering text with `overlay`
    pub fn session_config(&self, overlay: Overlay) -> SessionConfig {
        SessionConfig {
            worker: WorkerConfig {
                idle_interval: self.worker_idle_interval,
                params: self.process_params.clone(),
                overlay: overlay.clone(),
                stamp_timestamp: self.stamp_timestamp,
            },
            send: SendConfig {
                send_interval: self.send_interval,
                idle_poll_interval: self.idle_poll_interval,
                attach_mask: self.attach_mask,
                stamp_timestamp: self.stamp_timestamp,
                overlay,
            },
        }
    }
}
