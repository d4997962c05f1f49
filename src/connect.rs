// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Connector seam between the engine and the request-issuing collaborator.
//!
//! The engine never performs the HTTP handshake itself. For collection
//! streams it is handed a [`ListConnector`]: a callable that performs one
//! HTTP exchange (carrying the previous snapshot so the server can answer
//! `notModified`) and hands back the response metadata plus the raw byte
//! stream positioned at the start of the event framing.
//!
//! The sub-protocol is chosen by the server per attempt via the
//! `Stream-Format` response header; a stream may switch between `full` and
//! `diff` across reconnects.
//!
//! # Example
//!
//! ```rust,no_run
//! use stream_sync_engine::{BoxFuture, ListConnector, ListSnapshot, StreamResponse};
//!
//! struct ApiConnector { /* http client, url, auth */ }
//!
//! impl ListConnector<serde_json::Value> for ApiConnector {
//!     fn connect<'a>(
//!         &'a self,
//!         prev: Option<&'a ListSnapshot<serde_json::Value>>,
//!     ) -> BoxFuture<'a, StreamResponse> {
//!         Box::pin(async move {
//!             // issue GET with Accept: text/event-stream, set If-None-Match
//!             // from prev.and_then(|p| p.etag.as_deref()), return the body
//!             todo!()
//!         })
//!     }
//! }
//! ```

use crate::error::{Result, StreamError};
use crate::list::ListSnapshot;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use tokio::io::AsyncRead;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// The raw byte stream handed over by the connector.
pub type StreamBody = Box<dyn AsyncRead + Send + Unpin>;

/// Wire sub-protocol selected by the server for one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// Whole-snapshot `list` events.
    Full,
    /// Positional `add`/`remove`/`update` events with `sync` checkpoints.
    Diff,
}

impl FromStr for StreamFormat {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(Self::Full),
            "diff" => Ok(Self::Diff),
            other => Err(StreamError::InvalidFormat(other.to_string())),
        }
    }
}

/// Result of one successful HTTP exchange opening a collection stream.
pub struct StreamResponse {
    /// HTTP status of the exchange (informational; error statuses should be
    /// returned as [`StreamError::Http`] instead).
    pub status: u16,
    /// Raw `Stream-Format` header value (`full` or `diff`; anything else is
    /// a terminal [`StreamError::InvalidFormat`]).
    pub format: String,
    /// Response body positioned at the start of the event framing.
    pub body: StreamBody,
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// One HTTP exchange opening (or reopening) a collection stream.
///
/// Called once per connection attempt by the reconnection supervisor. The
/// `prev` snapshot is the last successfully delivered collection (or the
/// seed supplied at stream creation); implementations use its version tag
/// for conditional requests so the server can answer `notModified`.
///
/// In-flight connects are cancelled by dropping the returned future.
pub trait ListConnector<T>: Send + Sync {
    /// Perform one exchange and return the stream response, or an error.
    fn connect<'a>(
        &'a self,
        prev: Option<&'a ListSnapshot<T>>,
    ) -> BoxFuture<'a, StreamResponse>;
}

// Shared connectors can be handed to a stream while the caller keeps a
// handle for inspection.
impl<T, C: ListConnector<T> + ?Sized> ListConnector<T> for std::sync::Arc<C> {
    fn connect<'a>(
        &'a self,
        prev: Option<&'a ListSnapshot<T>>,
    ) -> BoxFuture<'a, StreamResponse> {
        (**self).connect(prev)
    }
}
