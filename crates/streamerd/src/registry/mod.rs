//! Connection registry and fan-out.
//!
//! The [`Streamer`] is the shared state of the broadcaster: two indices
//! over the live connections (by user key and by connection id) plus a
//! running flag, all behind one reader/writer lock, and an in-flight gate
//! that lets `stop` quiesce before closing outboxes.
//!
//! # Architecture
//!
//! ```text
//!   producers                       Streamer                    dispatch loops
//! ┌────────────┐  read lock:  ┌──────────────────────┐
//! │ broadcast  │─ snapshot ──▶│ by_user: key → {id}  │
//! │ multicast  │              │ by_id:   id  → outbox│
//! │ unicast    │              │ running              │
//! └─────┬──────┘              └──────────────────────┘
//!       │ enqueue (lock released, gate pass held)
//!       ▼
//! ┌────────────┐   bounded mpsc   ┌────────────┐
//! │  outbox    │─────────────────▶│ Dispatcher │
//! └────────────┘                  └────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - A send to a closed outbox is reported, never a crash

mod connection;
mod error;
mod gate;
mod streamer;

pub use connection::Connection;
pub use error::StreamerError;
pub use streamer::Streamer;
