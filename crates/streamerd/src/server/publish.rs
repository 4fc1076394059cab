//! Producer-facing endpoints: publish and health.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use streamer_core::ConnectionId;

use crate::registry::{Streamer, StreamerError};

/// Body of `POST /publish`.
///
/// Without `users` or `connection` the message is broadcast. A string
/// `data` is sent as-is (split on line breaks); any other JSON value is
/// sent as its compact JSON text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    /// Event name; empty for the default event.
    #[serde(default)]
    pub event: String,

    /// Payload.
    pub data: Value,

    /// Multicast to every connection of these users.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,

    /// Unicast to this connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionId>,
}

/// Body returned by `POST /publish`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishResponse {
    /// Number of connections the message was enqueued to.
    pub delivered: usize,
}

/// Body returned by `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub running: bool,
    pub connections: usize,
}

/// `POST` handler that fans a message out to its targets.
pub async fn publish_handler(
    State(streamer): State<Arc<Streamer>>,
    Json(request): Json<PublishRequest>,
) -> Response {
    let PublishRequest {
        event,
        data,
        users,
        connection,
    } = request;

    let result = match (users, connection) {
        (Some(_), Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                "publish targets either users or a connection, not both",
            )
                .into_response();
        }
        (Some(users), None) => match &data {
            Value::String(text) => streamer.multicast(&event, text, &users).await,
            other => streamer.multicast_json(&event, other, &users).await,
        },
        (None, Some(id)) => match &data {
            Value::String(text) => streamer.unicast(&event, text, id).await,
            other => streamer.unicast_json(&event, other, id).await,
        },
        (None, None) => match &data {
            Value::String(text) => streamer.broadcast(&event, text).await,
            other => streamer.broadcast_json(&event, other).await,
        },
    };

    match result {
        Ok(delivered) => {
            debug!(event = %event, delivered, "Published");
            Json(PublishResponse { delivered }).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// `GET` handler reporting the running flag and connection count.
pub async fn health_handler(State(streamer): State<Arc<Streamer>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        running: streamer.is_running().await,
        connections: streamer.connection_count().await,
    })
}

/// Convenience so handlers can return `StreamerError` directly.
impl IntoResponse for StreamerError {
    fn into_response(self) -> Response {
        let status = match &self {
            StreamerError::UnsupportedTransport => StatusCode::NOT_IMPLEMENTED,
            StreamerError::StreamerStopped | StreamerError::RegistrationFailed(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            StreamerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            StreamerError::SerializationFailed(_) | StreamerError::IdGeneration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}
