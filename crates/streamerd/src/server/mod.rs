//! HTTP server for the streamer daemon.
//!
//! The server:
//! - Serves event streams on `GET /events`
//! - Accepts producer messages on `POST /publish`
//! - Reports liveness on `GET /health`
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  StreamServer   │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ axum router
//!         ├──────────────────────┐
//!         ▼                      ▼
//! ┌─────────────────┐   ┌─────────────────┐
//! │ stream_handler  │   │ publish_handler │
//! │ (per client)    │   │ (producers)     │
//! └───────┬─────────┘   └───────┬─────────┘
//!         │ register            │ broadcast / multicast / unicast
//!         ▼                     ▼
//! ┌───────────────────────────────────────┐
//! │               Streamer                │
//! └───────────────────────────────────────┘
//! ```
//!
//! On shutdown the streamer is stopped first, which ends every open
//! stream, so the graceful drain of HTTP connections can complete.

mod publish;
mod stream;

pub use publish::{health_handler, publish_handler, HealthResponse, PublishRequest, PublishResponse};
pub use stream::stream_handler;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{ServerConfig, StreamerOptions};
use crate::registry::Streamer;

/// Path of the event-stream endpoint.
pub const EVENTS_PATH: &str = "/events";

/// Path of the publish endpoint.
pub const PUBLISH_PATH: &str = "/publish";

/// Path of the health endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Builds the router for a streamer.
pub fn router(streamer: Arc<Streamer>) -> Router {
    Router::new()
        .route(EVENTS_PATH, get(stream_handler))
        .route(PUBLISH_PATH, post(publish_handler))
        .route(HEALTH_PATH, get(health_handler))
        .with_state(streamer)
}

/// HTTP server owning one streamer.
pub struct StreamServer {
    /// Address to bind when started with [`run`](Self::run)
    addr: SocketAddr,

    /// The broadcaster behind every route
    streamer: Arc<Streamer>,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,
}

impl StreamServer {
    /// Creates a new server.
    ///
    /// # Arguments
    ///
    /// * `config` - Listen address and streamer options
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(config: ServerConfig, cancel_token: CancellationToken) -> Self {
        Self {
            addr: config.addr,
            streamer: Arc::new(Streamer::new(config.options)),
            cancel_token,
        }
    }

    /// Creates a server with default address and the given options.
    pub fn with_options(options: StreamerOptions, cancel_token: CancellationToken) -> Self {
        Self::new(
            ServerConfig {
                options,
                ..ServerConfig::default()
            },
            cancel_token,
        )
    }

    /// The streamer, for in-process producers.
    pub fn streamer(&self) -> Arc<Streamer> {
        Arc::clone(&self.streamer)
    }

    /// Binds the configured address and serves until cancelled.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: self.addr,
                error: e.to_string(),
            })?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener until cancelled.
    ///
    /// Starts the streamer before accepting and stops it when the
    /// cancellation token fires.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener.local_addr().map_err(|e| ServerError::Bind {
            addr: self.addr,
            error: e.to_string(),
        })?;

        self.streamer.start().await;
        info!(addr = %local_addr, "Stream server listening");

        let streamer = Arc::clone(&self.streamer);
        let cancel_token = self.cancel_token.clone();
        let shutdown = async move {
            cancel_token.cancelled().await;
            info!("Server shutdown requested");
            streamer.stop().await;
        };

        axum::serve(listener, router(Arc::clone(&self.streamer)))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        info!("Server cleanup complete");
        Ok(())
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("Server error: {0}")]
    Serve(String),
}
