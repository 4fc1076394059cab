//! Streamer Daemon - Server-sent events broadcaster
//!
//! Serves long-lived event streams and fans out messages published over
//! HTTP to every client, to a set of users, or to one connection.
//!
//! # Usage
//!
//! ```bash
//! # Start on the default address (127.0.0.1:8080)
//! streamerd
//!
//! # Custom address and queue depth
//! streamerd --addr 0.0.0.0:9000 --queue-depth 256
//!
//! # Group connections by a header set by an authenticating proxy
//! STREAMER_USER_HEADER=x-user-key streamerd
//!
//! # Enable debug logging
//! RUST_LOG=streamerd=debug streamerd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown (all streams are closed first)

use std::net::SocketAddr;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use streamerd::auth::HeaderAuthenticator;
use streamerd::config::{ServerConfig, StreamerOptions, DEFAULT_ADDR, DEFAULT_QUEUE_DEPTH};
use streamerd::server::StreamServer;

/// Streamer daemon - server-sent events broadcaster
#[derive(Parser, Debug)]
#[command(name = "streamerd", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "STREAMER_ADDR", default_value_t = DEFAULT_ADDR)]
    addr: SocketAddr,

    /// Per-connection outbox capacity
    #[arg(long, env = "STREAMER_QUEUE_DEPTH", default_value_t = DEFAULT_QUEUE_DEPTH)]
    queue_depth: usize,

    /// Allow proxies to buffer responses (omits `X-Accel-Buffering: no`)
    #[arg(long, env = "STREAMER_PROXY_BUFFERING")]
    proxy_buffering: bool,

    /// Read each stream's user key from this request header; streams
    /// without it are rejected
    #[arg(long, env = "STREAMER_USER_HEADER")]
    user_header: Option<String>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let mut options = StreamerOptions::default()
            .with_queue_depth(self.queue_depth)
            .with_proxy_buffering_disabled(!self.proxy_buffering);
        if let Some(header) = self.user_header {
            options = options.with_authenticator(HeaderAuthenticator::new(header));
        }
        ServerConfig {
            addr: self.addr,
            options,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("streamerd=info".parse()?)
                .add_directive("streamer_core=info".parse()?)
                .add_directive("streamer_protocol=info".parse()?),
        )
        .init();

    let config = args.into_config();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        addr = %config.addr,
        queue_depth = config.options.queue_depth,
        authenticated = config.options.authenticator.is_some(),
        "Streamer daemon starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let addr = config.addr;
    StreamServer::new(config, cancel_token)
        .run()
        .await
        .with_context(|| format!("Stream server on {addr} failed"))?;

    info!("Streamer daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Args::parse_from(["streamerd"]).into_config();
        assert_eq!(config.addr, DEFAULT_ADDR);
        assert_eq!(config.options.queue_depth, DEFAULT_QUEUE_DEPTH);
        assert!(config.options.disable_proxy_buffering);
        assert!(config.options.authenticator.is_none());
    }

    #[test]
    fn test_flags() {
        let config = Args::parse_from([
            "streamerd",
            "--addr",
            "0.0.0.0:9000",
            "--queue-depth",
            "8",
            "--proxy-buffering",
            "--user-header",
            "x-team",
        ])
        .into_config();
        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.options.queue_depth, 8);
        assert!(!config.options.disable_proxy_buffering);
        assert!(config.options.authenticator.is_some());
    }
}
