//! Streamer Protocol - Event-stream wire format
//!
//! This crate turns messages into the line-based text frames written to
//! each streaming HTTP response, and lists the response metadata a client
//! and any intermediary proxies need to treat the response as a live stream.

pub mod frame;
pub mod headers;

pub use frame::{encode, encode_into, HEARTBEAT_FRAME};
pub use headers::{response_headers, CONNECTION_ID_HEADER, EVENT_STREAM_CONTENT_TYPE};
