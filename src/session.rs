//! Shared per-stream session state.
//!
//! The liveness timestamp and last-error fields are the only state touched
//! from more than one task: the background sync task writes, the consumer
//! reads through accessors. Both sit behind `tokio::sync::RwLock`. The two
//! fields are independent and use separate locks.

use crate::error::StreamError;
use std::time::Instant;
use tokio::sync::{mpsc, watch, RwLock};

/// Liveness and error state for one open stream.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    /// Last time any event (including heartbeat) was processed.
    last_event_received: RwLock<Option<Instant>>,
    /// Most recent stream error (cleared once a reconnect succeeds).
    error: RwLock<Option<StreamError>>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Refresh the liveness timestamp.
    pub(crate) async fn touch(&self) {
        *self.last_event_received.write().await = Some(Instant::now());
    }

    pub(crate) async fn set_error(&self, err: StreamError) {
        *self.error.write().await = Some(err);
    }

    /// Clear the error once a fresh connection attempt has opened.
    pub(crate) async fn clear_error(&self) {
        *self.error.write().await = None;
    }

    pub(crate) async fn last_event_received(&self) -> Option<Instant> {
        *self.last_event_received.read().await
    }

    pub(crate) async fn last_error(&self) -> Option<StreamError> {
        self.error.read().await.clone()
    }
}

/// Resolve once cancellation is signalled (or the handle is gone).
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Stream handle dropped; treat as cancellation.
            return;
        }
    }
}

/// Push one delivery into the bounded queue.
///
/// Blocks when the queue is full (backpressure from a slow consumer) but
/// stays responsive to cancellation. Returns `false` if the stream was
/// cancelled or the consumer went away.
pub(crate) async fn deliver<T>(
    tx: &mpsc::Sender<T>,
    cancel: &mut watch::Receiver<bool>,
    value: T,
) -> bool {
    tokio::select! {
        res = tx.send(value) => res.is_ok(),
        _ = cancelled(cancel) => false,
    }
}
