//! A registered streaming connection.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TryRecvError};

use streamer_core::{ConnectionId, Message};

/// Sending side of an outbox, held by the registry indices.
pub(crate) type OutboxSender = mpsc::Sender<Arc<Message>>;

/// One live client stream as seen by its dispatch loop.
///
/// Holds the receiving side of the connection's outbox. The registry
/// holds the sending side; once the registry drops it (on `stop`, or
/// after the connection is deregistered and no fan-out still holds a
/// snapshot) the outbox reports end-of-stream.
#[derive(Debug)]
pub struct Connection {
    user_key: String,
    id: ConnectionId,
    outbox: mpsc::Receiver<Arc<Message>>,
}

impl Connection {
    pub(crate) fn new(
        user_key: String,
        id: ConnectionId,
        outbox: mpsc::Receiver<Arc<Message>>,
    ) -> Self {
        Self {
            user_key,
            id,
            outbox,
        }
    }

    /// The user key the connection was registered under.
    pub fn user_key(&self) -> &str {
        &self.user_key
    }

    /// The connection's identifier, usable as a unicast target.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Waits for the next queued message.
    ///
    /// Returns `None` once the outbox is closed and empty.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.outbox.recv().await
    }

    /// Takes a queued message without waiting.
    pub fn try_recv(&mut self) -> Result<Arc<Message>, TryRecvError> {
        self.outbox.try_recv()
    }

    /// Discards every message currently queued without waiting.
    ///
    /// Returns the number of discarded messages.
    pub fn drain(&mut self) -> usize {
        let mut discarded = 0;
        while self.outbox.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}
