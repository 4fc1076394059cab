//! Streamer Core - Shared types for the event broadcaster
//!
//! This crate provides the domain types shared between the wire
//! encoder (streamer-protocol) and the broadcaster (streamerd).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod id;
pub mod message;

// Re-exports for convenience
pub use error::IdError;
pub use id::ConnectionId;
pub use message::Message;
