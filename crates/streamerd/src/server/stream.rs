//! The event-stream endpoint.
//!
//! Each request is authenticated, registered, answered with the stream
//! headers, and handed to a spawned [`Dispatcher`]. The connection id goes
//! back in `x-connection-id` so the client can be unicast to later.
//!
//! The dispatcher writes into one end of an in-memory pipe; the other end
//! is the response body. When the body is dropped (peer gone, connection
//! reset) the connection's disconnect token is cancelled.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{StatusCode, Version};
use axum::response::{IntoResponse, Response};
use futures_util::Stream;
use tokio::io::DuplexStream;
use tokio_util::io::ReaderStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, warn};

use streamer_protocol::{response_headers, CONNECTION_ID_HEADER};

use crate::dispatch::Dispatcher;
use crate::registry::{Streamer, StreamerError};

/// Bytes buffered between the dispatch loop and the response body.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Response body that signals disconnect when dropped.
struct EventBody {
    frames: ReaderStream<DuplexStream>,
    _disconnect: DropGuard,
}

impl Stream for EventBody {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.frames).poll_next(cx)
    }
}

/// `GET` handler that opens an event stream.
///
/// # Rejections
///
/// - `501 Not Implemented` for HTTP/1.0 and older, which cannot carry a
///   chunked, incrementally flushed body
/// - `401 Unauthorized` when the authenticator fails
/// - `503 Service Unavailable` when registration fails (streamer stopped)
pub async fn stream_handler(
    State(streamer): State<Arc<Streamer>>,
    request: Request,
) -> Result<Response, StreamerError> {
    let (parts, _body) = request.into_parts();

    if parts.version < Version::HTTP_11 {
        debug!(version = ?parts.version, "Rejecting stream over non-streaming transport");
        return Err(StreamerError::UnsupportedTransport);
    }

    let user_key = match &streamer.options().authenticator {
        Some(authenticator) => authenticator.authenticate(&parts).await.map_err(|e| {
            warn!(error = %e, uri = %parts.uri, "Stream authentication failed");
            StreamerError::Unauthorized(e.to_string())
        })?,
        None => String::new(),
    };

    let connection = streamer
        .register(user_key)
        .await
        .map_err(|e| StreamerError::RegistrationFailed(e.to_string()))?;
    let connection_id = connection.id();

    let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
    let disconnect = CancellationToken::new();
    let body = EventBody {
        frames: ReaderStream::new(reader),
        _disconnect: disconnect.clone().drop_guard(),
    };

    let mut builder = axum::http::Response::builder().status(StatusCode::OK);
    let persistent = parts.version == Version::HTTP_11;
    for (name, value) in response_headers(streamer.options().disable_proxy_buffering, persistent) {
        builder = builder.header(name, value);
    }
    builder = builder.header(CONNECTION_ID_HEADER, connection_id.to_string());
    let response = match builder.body(Body::from_stream(body)) {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "Failed to build stream response");
            streamer.deregister(&connection).await;
            return Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response());
        }
    };

    let dispatcher = Dispatcher::new(Arc::clone(&streamer), connection, writer, disconnect);
    tokio::spawn(async move {
        let exit = dispatcher.run().await;
        debug!(connection_id = %connection_id, exit = ?exit, "Stream closed");
    });

    Ok(response)
}
