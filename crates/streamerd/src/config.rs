//! Configuration for the registry and the HTTP server.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use crate::auth::Authenticator;

/// Default per-connection outbox capacity.
pub const DEFAULT_QUEUE_DEPTH: usize = 100;

/// Default listen port for the daemon.
pub const DEFAULT_PORT: u16 = 8080;

/// Default listen address for the daemon.
pub const DEFAULT_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT));

/// Options for a [`Streamer`](crate::registry::Streamer).
#[derive(Clone)]
pub struct StreamerOptions {
    /// Send `X-Accel-Buffering: no` with every stream response.
    pub disable_proxy_buffering: bool,

    /// Capacity of each connection's outbox. A full outbox blocks the sender.
    pub queue_depth: usize,

    /// Maps a request to a user key. `None` puts everyone under the empty key.
    pub authenticator: Option<Arc<dyn Authenticator>>,
}

impl StreamerOptions {
    /// Sets whether the anti-buffering header is sent.
    pub fn with_proxy_buffering_disabled(mut self, disabled: bool) -> Self {
        self.disable_proxy_buffering = disabled;
        self
    }

    /// Sets the outbox capacity. Zero is raised to one.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// Installs an authenticator.
    pub fn with_authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Some(Arc::new(authenticator));
        self
    }

    /// The outbox capacity actually used for new connections.
    pub(crate) fn effective_queue_depth(&self) -> usize {
        self.queue_depth.max(1)
    }
}

impl Default for StreamerOptions {
    fn default() -> Self {
        Self {
            disable_proxy_buffering: true,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            authenticator: None,
        }
    }
}

impl fmt::Debug for StreamerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamerOptions")
            .field("disable_proxy_buffering", &self.disable_proxy_buffering)
            .field("queue_depth", &self.queue_depth)
            .field("authenticator", &self.authenticator.is_some())
            .finish()
    }
}

/// Configuration for the [`StreamServer`](crate::server::StreamServer).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub addr: SocketAddr,

    /// Options for the server's streamer.
    pub options: StreamerOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR,
            options: StreamerOptions::default(),
        }
    }
}
