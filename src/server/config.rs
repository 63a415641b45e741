//! Server and session configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::codec::LiveLayout;

/// What the session sends to the client for each broker message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForwardMode {
    /// Base64 of the payload, decoded by the client
    #[default]
    Raw,
    /// Frames decoded in the relay
    Decoded(LiveLayout),
}

/// Per-session options
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interval between stream token republications
    pub refresh_interval: Duration,

    /// Bound on opening the broker connection
    pub connect_timeout: Duration,

    /// Bound on the broker acknowledging the subscription
    pub subscribe_timeout: Duration,

    /// Broker messages buffered for a slow client before the oldest are dropped
    pub forward_capacity: usize,

    /// Envelope produced for each broker message
    pub forward_mode: ForwardMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(45),
            connect_timeout: Duration::from_secs(10),
            subscribe_timeout: Duration::from_secs(10),
            forward_capacity: 256,
            forward_mode: ForwardMode::Raw,
        }
    }
}

impl SessionConfig {
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn subscribe_timeout(mut self, timeout: Duration) -> Self {
        self.subscribe_timeout = timeout;
        self
    }

    /// Set the forwarding queue size (at least 1)
    pub fn forward_capacity(mut self, capacity: usize) -> Self {
        self.forward_capacity = capacity.max(1);
        self
    }

    pub fn forward_mode(mut self, mode: ForwardMode) -> Self {
        self.forward_mode = mode;
        self
    }
}

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Path of the WebSocket endpoint
    pub ws_path: String,

    /// Maximum concurrent client connections (0 = unlimited)
    pub max_connections: usize,

    /// Outbound envelopes queued per client
    pub client_buffer: usize,

    /// Options applied to every session
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            ws_path: "/ws/skeleton".to_string(),
            max_connections: 0, // Unlimited
            client_buffer: 64,
            session: SessionConfig::default(),
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

    pub fn ws_path(mut self, path: impl Into<String>) -> Self {
        self.ws_path = path.into();
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn client_buffer(mut self, size: usize) -> Self {
        self.client_buffer = size.max(1);
        self
    }

    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}
