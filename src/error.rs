// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the stream sync engine.
//!
//! Errors are categorized by where they occur in the pipeline (transport,
//! framing, decoding, protocol) and carry enough context to log usefully.
//! Every variant owns plain `String` payloads so errors are `Clone` and can
//! be handed out through the last-error accessor while the engine keeps its
//! own copy.
//!
//! # Error Categories
//!
//! | Error Type | Terminal | Description |
//! |------------|----------|-------------|
//! | `Transport` | No | Read failure or unexpected end of stream |
//! | `Http` | If 4xx | Status returned by the connector on (re)connect |
//! | `Decode` | No | Payload or position param did not match the element shape |
//! | `InvalidEvent` | No | Event sequence violates the protocol model |
//! | `InvalidFormat` | Yes | Unrecognized `Stream-Format` sub-protocol indicator |
//!
//! # Retry Behavior
//!
//! The reconnection supervisor uses [`StreamError::is_terminal()`] to decide
//! whether to stop permanently or retry after backoff. Terminal means the
//! server has told us the request itself is wrong (a 4xx class status, or a
//! sub-protocol we do not speak); retrying would produce the same answer.
//! Everything else is treated as transient: network failures, 5xx responses,
//! and malformed payloads that a fresh snapshot may repair.

use thiserror::Error;

/// Result type alias for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors that can occur while consuming an event stream.
///
/// Use [`is_terminal()`](Self::is_terminal) to check whether the
/// reconnection supervisor should give up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Transport read failure or unexpected end of stream.
    ///
    /// Transient: the supervisor reconnects after backoff.
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP-style error reported by the connector when opening a stream.
    ///
    /// Terminal when the status is 4xx (the request is wrong and will stay
    /// wrong); transient otherwise (5xx, gateway timeouts).
    #[error("http error {status}: {message}")]
    Http {
        /// HTTP status code from the (re)connect attempt.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// Payload decode failure, or a missing/non-numeric/out-of-range
    /// position param on a diff-mode event.
    ///
    /// Fatal to the current attempt; a reconnect starts from a fresh
    /// snapshot, so the supervisor still retries.
    #[error("decode error: {0}")]
    Decode(String),

    /// Event sequence violates the protocol model, for example a
    /// `notModified` event when no previous value was supplied.
    #[error("invalid stream event: {0}")]
    InvalidEvent(String),

    /// Unrecognized `Stream-Format` sub-protocol indicator.
    ///
    /// Terminal: neither side will start speaking the other's protocol on
    /// a retry.
    #[error("invalid stream format: {0:?}")]
    InvalidFormat(String),
}

impl StreamError {
    /// Check whether this error should stop the reconnection supervisor
    /// permanently.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Http { status, .. } => status / 100 == 4,
            Self::InvalidFormat(_) => true,
            Self::Transport(_) => false,
            Self::Decode(_) => false,
            Self::InvalidEvent(_) => false,
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
