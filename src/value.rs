// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Single-value synchronization.
//!
//! A [`ValueStream`] keeps one decoded element continuously updated from a
//! server-push event stream. It is a one-shot pipe: any fatal error (or the
//! server closing the stream) closes the delivery queue permanently, with
//! no automatic reconnection. Collection streams get reconnection; see
//! [`crate::list`].
//!
//! # Per-Frame Behavior
//!
//! | Event | Effect |
//! |-------|--------|
//! | `initial` / `update` | decode payload, deliver, refresh liveness |
//! | `notModified` | deliver the previously supplied value (error if none) |
//! | `heartbeat` | refresh liveness only |
//! | anything else | ignored (forward compatible) |
//!
//! End of stream closes the delivery queue without recording an error;
//! read and decode failures are recorded and then close the queue.

use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::frame::FrameReader;
use crate::metrics;
use crate::session::{self, SessionState};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// A continuously synchronized single value of type `T`.
///
/// Created from a byte stream already positioned at the start of the event
/// framing. Dropping the handle (or calling [`close()`](Self::close)) stops
/// the background task; no further deliveries occur afterwards.
pub struct ValueStream<T> {
    rx: mpsc::Receiver<T>,
    state: Arc<SessionState>,
    cancel: watch::Sender<bool>,
}

impl<T> ValueStream<T>
where
    T: DeserializeOwned + Clone + Send + 'static,
{
    /// Open a stream over `body` with the default configuration.
    ///
    /// `prev` is the previously cached value, if the initiating request
    /// declared one; it enables `notModified` handling.
    pub fn start<R>(body: R, prev: Option<T>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::with_config(body, prev, StreamConfig::default())
    }

    /// Open a stream over `body` with an explicit configuration.
    pub fn with_config<R>(body: R, prev: Option<T>, config: StreamConfig) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let state = Arc::new(SessionState::new());

        tokio::spawn(run(
            FrameReader::new(body),
            prev,
            tx,
            Arc::clone(&state),
            cancel_rx,
        ));

        Self {
            rx,
            state,
            cancel: cancel_tx,
        }
    }

    /// Receive the next delivered value.
    ///
    /// Returns `None` once the stream has closed (end of stream, fatal
    /// error, or cancellation). Check [`last_error()`](Self::last_error)
    /// to distinguish.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Last time any event (including heartbeat) was processed.
    pub async fn last_event_received(&self) -> Option<Instant> {
        self.state.last_event_received().await
    }

    /// The error that terminated the stream, if any.
    pub async fn last_error(&self) -> Option<StreamError> {
        self.state.last_error().await
    }

    /// Close the stream and release the underlying transport.
    pub fn close(&self) {
        let _ = self.cancel.send(true);
    }
}

async fn run<T, R>(
    mut reader: FrameReader<R>,
    prev: Option<T>,
    tx: mpsc::Sender<T>,
    state: Arc<SessionState>,
    mut cancel: watch::Receiver<bool>,
) where
    T: DeserializeOwned + Clone + Send,
    R: AsyncRead + Unpin,
{
    loop {
        let frame = tokio::select! {
            res = reader.next_frame() => res,
            _ = session::cancelled(&mut cancel) => return,
        };

        let frame = match frame {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                // Clean end of stream: close the queue, nothing to report.
                debug!("value stream ended");
                return;
            }
            Err(e) => {
                state.set_error(e).await;
                return;
            }
        };

        metrics::record_frame(&frame.event_type);

        match frame.event_type.as_str() {
            "initial" | "update" => {
                let value: T = match frame.decode_value() {
                    Ok(value) => value,
                    Err(e) => {
                        state.set_error(e).await;
                        return;
                    }
                };
                state.touch().await;
                metrics::record_delivery("value");
                if !session::deliver(&tx, &mut cancel, value).await {
                    return;
                }
            }
            // Clone out of `prev` up front: a borrow held across the awaits
            // below would demand `T: Sync` from the spawned future.
            "notModified" => match prev.clone() {
                Some(value) => {
                    state.touch().await;
                    metrics::record_delivery("value");
                    if !session::deliver(&tx, &mut cancel, value).await {
                        return;
                    }
                }
                None => {
                    state
                        .set_error(StreamError::InvalidEvent(
                            "notModified without a previous value".to_string(),
                        ))
                        .await;
                    return;
                }
            },
            "heartbeat" => state.touch().await,
            _ => {}
        }
    }
}
