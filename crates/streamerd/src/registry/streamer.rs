//! The connection registry and its fan-out operations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use streamer_core::{ConnectionId, IdError, Message};

use super::connection::{Connection, OutboxSender};
use super::error::StreamerError;
use super::gate::InFlightGate;
use crate::config::StreamerOptions;

/// Fresh ids tried before registration gives up on a collision.
const MAX_ID_ATTEMPTS: usize = 3;

/// A resolved fan-out target.
type Target = (ConnectionId, OutboxSender);

/// Index state guarded by the registry lock.
///
/// A connection is in both indices or in neither.
#[derive(Debug, Default)]
struct Registry {
    by_user: HashMap<String, HashMap<ConnectionId, OutboxSender>>,
    by_id: HashMap<ConnectionId, OutboxSender>,
    running: bool,
}

impl Registry {
    fn fresh_id(&self) -> Result<ConnectionId, StreamerError> {
        self.fresh_id_with(ConnectionId::generate)
    }

    /// Draws ids from `source` until one is not registered.
    fn fresh_id_with<F>(&self, mut source: F) -> Result<ConnectionId, StreamerError>
    where
        F: FnMut() -> Result<ConnectionId, IdError>,
    {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = source()?;
            if !self.by_id.contains_key(&id) {
                return Ok(id);
            }
            warn!(connection_id = %id, "Generated connection id already registered, retrying");
        }
        Err(StreamerError::RegistrationFailed(
            "could not allocate a unique connection id".to_string(),
        ))
    }

    fn all_targets(&self) -> Vec<Target> {
        self.by_id
            .iter()
            .map(|(id, outbox)| (*id, outbox.clone()))
            .collect()
    }

    fn user_targets<S: AsRef<str>>(&self, users: &[S]) -> Vec<Target> {
        let mut seen = HashSet::with_capacity(users.len());
        let mut targets = Vec::new();
        for user in users.iter().map(AsRef::as_ref) {
            if !seen.insert(user) {
                continue;
            }
            if let Some(group) = self.by_user.get(user) {
                targets.extend(group.iter().map(|(id, outbox)| (*id, outbox.clone())));
            }
        }
        targets
    }

    fn connection_target(&self, id: ConnectionId) -> Vec<Target> {
        self.by_id
            .get(&id)
            .map(|outbox| vec![(id, outbox.clone())])
            .unwrap_or_default()
    }
}

/// Server-push broadcaster.
///
/// Owns the registry of live connections and delivers messages to all of
/// them, to every connection of a set of users, or to one connection.
/// A streamer starts stopped; call [`start`](Self::start) before
/// registering connections. Independent instances share nothing.
///
/// # Locking
///
/// Addressing calls snapshot their targets under the read lock and release
/// it before enqueuing, since an enqueue waits whenever a target's outbox
/// is full. Registration, deregistration and the running flag take the
/// write lock.
#[derive(Debug)]
pub struct Streamer {
    registry: RwLock<Registry>,
    gate: InFlightGate,
    options: StreamerOptions,
}

impl Streamer {
    /// Creates a stopped streamer.
    pub fn new(options: StreamerOptions) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            gate: InFlightGate::new(),
            options,
        }
    }

    /// The options this streamer was built with.
    pub fn options(&self) -> &StreamerOptions {
        &self.options
    }

    /// Marks the streamer running. Idempotent.
    pub async fn start(&self) {
        let mut registry = self.registry.write().await;
        if !registry.running {
            registry.running = true;
            info!("Streamer started");
        }
    }

    /// Stops the streamer and closes every connection.
    ///
    /// Subsequent registration and addressing calls fail with
    /// `StreamerStopped`. Waits for fan-out calls already past their
    /// running check to finish enqueuing, then drops every outbox sender so
    /// each dispatch loop observes end-of-stream. When this returns the
    /// registry is empty.
    pub async fn stop(&self) {
        self.registry.write().await.running = false;

        self.gate.wait_idle().await;

        let closed = {
            let mut registry = self.registry.write().await;
            let closed = registry.by_id.len();
            registry.by_user.clear();
            registry.by_id.clear();
            closed
        };

        info!(connections = closed, "Streamer stopped");
    }

    /// Whether the streamer accepts registrations and addressing calls.
    pub async fn is_running(&self) -> bool {
        self.registry.read().await.running
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.by_id.len()
    }

    /// Number of registered connections under `user_key`.
    pub async fn user_connection_count(&self, user_key: &str) -> usize {
        self.registry
            .read()
            .await
            .by_user
            .get(user_key)
            .map_or(0, HashMap::len)
    }

    /// Registers a new connection under `user_key`.
    ///
    /// # Errors
    ///
    /// - `StreamerError::StreamerStopped` if the streamer is not running
    /// - `StreamerError::IdGeneration` if the random source failed
    /// - `StreamerError::RegistrationFailed` if no unique id could be found
    pub async fn register(&self, user_key: impl Into<String>) -> Result<Connection, StreamerError> {
        let user_key = user_key.into();

        let mut registry = self.registry.write().await;
        if !registry.running {
            return Err(StreamerError::StreamerStopped);
        }

        let id = registry.fresh_id()?;
        let (outbox, receiver) = mpsc::channel(self.options.effective_queue_depth());

        registry
            .by_user
            .entry(user_key.clone())
            .or_default()
            .insert(id, outbox.clone());
        registry.by_id.insert(id, outbox);
        drop(registry);

        debug!(connection_id = %id, user_key = %user_key, "Connection registered");
        Ok(Connection::new(user_key, id, receiver))
    }

    /// Removes a connection from both indices.
    ///
    /// Idempotent; returns whether the connection was registered. Does not
    /// close the outbox itself: the sender goes away with the index entry
    /// and with any fan-out snapshot still holding it.
    pub async fn deregister(&self, connection: &Connection) -> bool {
        let id = connection.id();
        let mut guard = self.registry.write().await;
        let registry = &mut *guard;

        let removed = registry.by_id.remove(&id).is_some();
        let group_empty = match registry.by_user.get_mut(connection.user_key()) {
            Some(group) => {
                group.remove(&id);
                group.is_empty()
            }
            None => false,
        };
        if group_empty {
            registry.by_user.remove(connection.user_key());
        }
        drop(guard);

        if removed {
            debug!(connection_id = %id, user_key = %connection.user_key(), "Connection deregistered");
        }
        removed
    }

    /// Sends to every connection registered at call time.
    ///
    /// Returns the number of outboxes the message was enqueued to.
    ///
    /// # Errors
    ///
    /// Returns `StreamerError::StreamerStopped` if the streamer is not running.
    pub async fn broadcast(&self, event: &str, data: &str) -> Result<usize, StreamerError> {
        self.fan_out(Message::new(event, data), Registry::all_targets)
            .await
    }

    /// Sends to every connection of the given users.
    ///
    /// Repeated user keys are looked up once, so each connection receives
    /// one copy.
    ///
    /// # Errors
    ///
    /// Returns `StreamerError::StreamerStopped` if the streamer is not running.
    pub async fn multicast<S: AsRef<str>>(
        &self,
        event: &str,
        data: &str,
        users: &[S],
    ) -> Result<usize, StreamerError> {
        self.fan_out(Message::new(event, data), |registry| {
            registry.user_targets(users)
        })
        .await
    }

    /// Sends to a single connection. An unknown id is a no-op, not an error.
    ///
    /// # Errors
    ///
    /// Returns `StreamerError::StreamerStopped` if the streamer is not running.
    pub async fn unicast(
        &self,
        event: &str,
        data: &str,
        connection_id: ConnectionId,
    ) -> Result<usize, StreamerError> {
        self.fan_out(Message::new(event, data), |registry| {
            registry.connection_target(connection_id)
        })
        .await
    }

    /// Serializes `value` to JSON and broadcasts it.
    ///
    /// # Errors
    ///
    /// - `StreamerError::SerializationFailed` if `value` cannot be encoded;
    ///   nothing is sent
    /// - `StreamerError::StreamerStopped` if the streamer is not running
    pub async fn broadcast_json<T: Serialize + ?Sized>(
        &self,
        event: &str,
        value: &T,
    ) -> Result<usize, StreamerError> {
        let data = serde_json::to_string(value)?;
        self.broadcast(event, &data).await
    }

    /// Serializes `value` to JSON and multicasts it.
    ///
    /// # Errors
    ///
    /// See [`broadcast_json`](Self::broadcast_json).
    pub async fn multicast_json<T: Serialize + ?Sized, S: AsRef<str>>(
        &self,
        event: &str,
        value: &T,
        users: &[S],
    ) -> Result<usize, StreamerError> {
        let data = serde_json::to_string(value)?;
        self.multicast(event, &data, users).await
    }

    /// Serializes `value` to JSON and unicasts it.
    ///
    /// # Errors
    ///
    /// See [`broadcast_json`](Self::broadcast_json).
    pub async fn unicast_json<T: Serialize + ?Sized>(
        &self,
        event: &str,
        value: &T,
        connection_id: ConnectionId,
    ) -> Result<usize, StreamerError> {
        let data = serde_json::to_string(value)?;
        self.unicast(event, &data, connection_id).await
    }

    /// Resolves targets under the read lock, then enqueues without it.
    ///
    /// The gate pass is taken while the read lock is still held: `stop`
    /// cannot flip the running flag in between, so it either sees this call
    /// in flight or this call sees the streamer stopped.
    async fn fan_out<F>(&self, message: Message, select: F) -> Result<usize, StreamerError>
    where
        F: FnOnce(&Registry) -> Vec<Target>,
    {
        let registry = self.registry.read().await;
        if !registry.running {
            return Err(StreamerError::StreamerStopped);
        }
        let targets = select(&*registry);
        let pass = self.gate.enter();
        drop(registry);

        let delivered = deliver(&targets, Arc::new(message)).await;

        // Snapshot senders must be gone before stop may close the outboxes.
        drop(targets);
        drop(pass);
        Ok(delivered)
    }
}

/// Enqueues one shared message onto every target's outbox.
async fn deliver(targets: &[Target], message: Arc<Message>) -> usize {
    let sends = targets.iter().map(|(id, outbox)| {
        let message = Arc::clone(&message);
        async move {
            match outbox.send(message).await {
                Ok(()) => true,
                Err(_) => {
                    debug!(connection_id = %id, "Outbox closed, connection already gone");
                    false
                }
            }
        }
    });

    let delivered = join_all(sends).await.into_iter().filter(|sent| *sent).count();
    debug!(targets = targets.len(), delivered, "Fan-out complete");
    delivered
}
