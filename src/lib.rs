//! # Stream Sync Engine
//!
//! A client-side engine that keeps a local value, or an ordered collection
//! of values, continuously synchronized with a remote source over a
//! long-lived, server-push, text-framed stream.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        stream-sync-engine                        │
//! │                                                                  │
//! │  transport bytes ──► FrameReader ──► event apply ──► bounded     │
//! │                      (framing)       (value/list)    queue ──► consumer
//! │                                          │                       │
//! │                                          ▼                       │
//! │                          Backoff + reconnection supervisor       │
//! │                          (collection streams only)               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two stream kinds:
//!
//! - [`ValueStream`]: one decoded element, one-shot pipe, no reconnection.
//! - [`ListStream`]: an ordered collection, kept alive across transport
//!   failures by a supervisor with jittered exponential backoff. The server
//!   picks the wire sub-protocol (`full` snapshots or positional `diff`
//!   events) per connection attempt.
//!
//! The engine does not perform HTTP handshakes; callers supply the opened
//! byte stream (single values) or a [`ListConnector`] that performs one
//! exchange per connection attempt (collections).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stream_sync_engine::ValueStream;
//!
//! #[tokio::main]
//! async fn main() {
//!     // `body` is a response byte stream positioned at the start of the
//!     // event framing, e.g. from a GET with Accept: text/event-stream.
//!     let body = tokio::io::empty();
//!     let mut stream = ValueStream::<serde_json::Value>::start(body, None);
//!
//!     while let Some(value) = stream.recv().await {
//!         println!("synced: {value}");
//!     }
//! }
//! ```

pub mod backoff;
pub mod config;
pub mod connect;
pub mod error;
pub mod frame;
pub mod list;
pub mod metrics;
mod session;
pub mod value;

pub(crate) use session::cancelled;

// Re-exports for convenience
pub use backoff::Backoff;
pub use config::StreamConfig;
pub use connect::{BoxFuture, ListConnector, StreamBody, StreamFormat, StreamResponse};
pub use error::{Result, StreamError};
pub use frame::{Frame, FrameAssembler, FrameReader};
pub use list::{ListSnapshot, ListStream};
pub use value::ValueStream;
