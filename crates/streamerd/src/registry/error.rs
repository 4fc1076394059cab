//! Registry and fan-out errors.

use streamer_core::IdError;
use thiserror::Error;

/// Errors returned synchronously by registration and addressing calls.
///
/// Delivery itself never fails synchronously: once a message is enqueued
/// it is best-effort, and transport failures surface only as a
/// terminated stream.
#[derive(Debug, Error)]
pub enum StreamerError {
    /// The streamer is not running (never started, or stopped).
    #[error("Streamer stopped")]
    StreamerStopped,

    /// The transport cannot carry an incrementally flushed stream.
    #[error("Transport does not support streaming")]
    UnsupportedTransport,

    /// Registration was refused, e.g. because the streamer stopped.
    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    /// The authenticator rejected the request.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A JSON convenience call could not serialize its payload.
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// No identifier could be produced for a new connection.
    #[error("Connection id generation failed: {0}")]
    IdGeneration(#[from] IdError),
}
