//! Per-connection dispatch loop.
//!
//! Each accepted stream gets one [`Dispatcher`] that:
//! - Drains the connection's outbox, encoding and flushing each message
//! - Writes a keep-alive comment every [`HEARTBEAT_INTERVAL`]
//! - Deregisters the connection when the transport disconnects
//!
//! A failed or timed-out write cancels the disconnect token, so the next
//! iteration handles it exactly like a peer disconnect.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Write errors are logged and end the loop gracefully

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use streamer_protocol::{encode, HEARTBEAT_FRAME};

use crate::registry::{Connection, Streamer};

/// Keep-alive period, chosen to stay under common proxy idle timeouts.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Upper bound on a single frame write plus flush.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a dispatch loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchExit {
    /// The transport went away (or a write failed); the connection was
    /// deregistered and its queue drained.
    Disconnected,

    /// The outbox closed because the streamer stopped.
    StreamerStopped,
}

/// Dispatch loop bound to one connection and one transport writer.
pub struct Dispatcher<W> {
    streamer: Arc<Streamer>,
    connection: Connection,
    writer: W,
    disconnect: CancellationToken,
}

impl<W> Dispatcher<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a dispatcher.
    ///
    /// # Arguments
    ///
    /// * `streamer` - The registry the connection belongs to
    /// * `connection` - The registered connection whose outbox is drained
    /// * `writer` - The transport; this loop is its only writer
    /// * `disconnect` - Cancelled by the transport when the peer goes away
    pub fn new(
        streamer: Arc<Streamer>,
        connection: Connection,
        writer: W,
        disconnect: CancellationToken,
    ) -> Self {
        Self {
            streamer,
            connection,
            writer,
            disconnect,
        }
    }

    /// Runs until disconnect or until the streamer stops.
    pub async fn run(mut self) -> DispatchExit {
        let id = self.connection.id();
        debug!(connection_id = %id, user_key = %self.connection.user_key(), "Dispatch loop started");

        let mut heartbeat = interval_at(Instant::now() + HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.disconnect.cancelled() => {
                    self.streamer.deregister(&self.connection).await;
                    let discarded = self.connection.drain();
                    debug!(connection_id = %id, discarded, "Client disconnected");
                    return DispatchExit::Disconnected;
                }

                received = self.connection.recv() => {
                    match received {
                        Some(message) => {
                            let frame = encode(&message);
                            self.write_frame(frame.as_bytes()).await;
                        }
                        None => {
                            debug!(connection_id = %id, "Outbox closed, streamer stopped");
                            return DispatchExit::StreamerStopped;
                        }
                    }
                }

                _ = heartbeat.tick() => {
                    self.write_frame(HEARTBEAT_FRAME.as_bytes()).await;
                }
            }
        }
    }

    /// Writes and flushes one frame; any failure becomes a disconnect.
    async fn write_frame(&mut self, frame: &[u8]) {
        let writer = &mut self.writer;
        let result = timeout(WRITE_TIMEOUT, async {
            writer.write_all(frame).await?;
            writer.flush().await
        })
        .await;

        let error = match result {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(_) => "write timed out".to_string(),
        };

        warn!(
            connection_id = %self.connection.id(),
            error = %error,
            "Failed to write frame, dropping connection"
        );
        self.disconnect.cancel();
    }
}
