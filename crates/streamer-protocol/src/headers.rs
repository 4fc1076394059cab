//! Response metadata sent before the first frame.

/// Content type of an event stream.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Header asking nginx-style proxies not to buffer the response.
pub const PROXY_BUFFERING_HEADER: &str = "x-accel-buffering";

/// Header carrying the stream's connection id, for later unicast targeting.
pub const CONNECTION_ID_HEADER: &str = "x-connection-id";

/// Returns the `(name, value)` header pairs for a streaming response.
///
/// `persistent` adds `connection: keep-alive`; it must be false on HTTP/2,
/// where connection-specific headers are not allowed.
/// `disable_proxy_buffering` adds `x-accel-buffering: no`.
pub fn response_headers(
    disable_proxy_buffering: bool,
    persistent: bool,
) -> Vec<(&'static str, &'static str)> {
    let mut headers = vec![
        ("cache-control", "no-cache"),
        ("content-type", EVENT_STREAM_CONTENT_TYPE),
    ];
    if persistent {
        headers.push(("connection", "keep-alive"));
    }
    if disable_proxy_buffering {
        headers.push((PROXY_BUFFERING_HEADER, "no"));
    }
    headers
}
