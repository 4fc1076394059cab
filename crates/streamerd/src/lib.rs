//! Streamer Daemon - Connection registry and event-stream server
//!
//! This crate provides the broadcaster itself:
//! - `registry` - Connection registry with broadcast / multicast / unicast fan-out
//! - `dispatch` - Per-connection loop that writes frames and keep-alives
//! - `server` - HTTP integration: the stream endpoint and a publish API
//! - `auth` - Authenticators that map a request to a user key
//! - `config` - Options for the registry and the server
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  register   ┌─────────────────────────────┐
//! │  stream_handler │────────────▶│          Streamer           │
//! │  (per request)  │             │  by_user / by_id / running  │
//! └────────┬────────┘             └──────────────┬──────────────┘
//!          │ spawn                               │ snapshot, then
//!          ▼                                     │ enqueue (no lock held)
//! ┌─────────────────┐   outbox (bounded mpsc)    │
//! │   Dispatcher    │◀───────────────────────────┘
//! │ (per connection)│──▶ frames + heartbeats ──▶ response body
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod registry;
pub mod server;
