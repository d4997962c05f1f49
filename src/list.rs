// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Collection synchronization with automatic reconnection.
//!
//! A [`ListStream`] keeps an ordered collection continuously updated from a
//! server-push event stream, wrapped in a retry loop:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      ListStream supervisor                     │
//! │                                                                │
//! │  ┌───────────┐   ┌─────────────┐   ┌─────────────────────────┐ │
//! │  │ Connector │──►│ FrameReader │──►│ full / diff event apply │ │
//! │  │ (1 HTTP   │   │ (framing)   │   │ dedup by version tag    │ │
//! │  │ exchange) │   └─────────────┘   └───────────┬─────────────┘ │
//! │  └─────▲─────┘                                 │               │
//! │        │            backoff on failure        ▼ deliveries    │
//! │        └──────────── (unless 4xx) ◄──── bounded queue ──► consumer
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each connection attempt re-selects the sub-protocol from the server's
//! `Stream-Format` header, so a stream may alternate between `full` and
//! `diff` across reconnects. The last successfully delivered snapshot is
//! carried into every reconnect so the server can answer `notModified`.
//!
//! # Sub-Protocols
//!
//! **Full mode** is a total overwrite: every `list` event replaces the
//! tracked collection with the decoded payload, tagged from the frame's
//! `id` param.
//!
//! **Diff mode** trades bandwidth for bookkeeping: `add`/`remove`/`update`
//! events mutate the tracked collection in place by index, and only a
//! `sync` checkpoint (or `notModified`) produces a consumer-visible, tagged
//! deep copy. Intermediate mutations are never observable.
//!
//! # Termination
//!
//! A failure classified as terminal (4xx status, unrecognized sub-protocol)
//! stops the supervisor and closes the delivery queue permanently. Any
//! other failure is surfaced through [`ListStream::last_error()`] and
//! retried after jittered backoff.

use crate::backoff::Backoff;
use crate::config::StreamConfig;
use crate::connect::{ListConnector, StreamBody, StreamFormat};
use crate::error::{Result, StreamError};
use crate::frame::{Frame, FrameReader};
use crate::metrics;
use crate::session::{self, SessionState};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn, Instrument};

/// An immutable, tagged copy of the tracked collection.
///
/// Handed to the consumer at synchronization checkpoints. The version tag
/// is an opaque string (the source system calls it an ETag); equality of
/// non-empty tags implies the content is unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSnapshot<T> {
    /// The decoded elements, in server order.
    pub items: Vec<T>,
    /// Version tag from the `id` param of the producing checkpoint, if any.
    pub etag: Option<String>,
}

impl<T> ListSnapshot<T> {
    /// Create a tagged snapshot.
    pub fn new(items: Vec<T>, etag: Option<String>) -> Self {
        Self { items, etag }
    }
}

impl<T> Default for ListSnapshot<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            etag: None,
        }
    }
}

/// A continuously synchronized, ordered collection of `T`.
///
/// Unlike [`ValueStream`](crate::ValueStream), collection streams span
/// multiple connection attempts: the supervisor reconnects after transient
/// failures with jittered backoff. Dropping the handle (or calling
/// [`close()`](Self::close)) cancels the in-flight read or backoff wait
/// promptly and stops the supervisor.
pub struct ListStream<T> {
    rx: mpsc::Receiver<ListSnapshot<T>>,
    state: Arc<SessionState>,
    cancel: watch::Sender<bool>,
}

impl<T> ListStream<T>
where
    T: DeserializeOwned + Clone + Send + 'static,
{
    /// Open a collection stream with the default configuration.
    ///
    /// `prev` seeds the previous snapshot for the first connect, enabling
    /// an immediate `notModified` answer from the server.
    pub fn start<C>(connector: C, prev: Option<ListSnapshot<T>>) -> Self
    where
        C: ListConnector<T> + 'static,
    {
        Self::with_config(connector, prev, StreamConfig::default())
    }

    /// Open a collection stream with an explicit configuration.
    pub fn with_config<C>(connector: C, prev: Option<ListSnapshot<T>>, config: StreamConfig) -> Self
    where
        C: ListConnector<T> + 'static,
    {
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let state = Arc::new(SessionState::new());

        tokio::spawn(run_supervisor(
            connector,
            tx,
            Arc::clone(&state),
            cancel_rx,
            prev,
            config,
        ));

        Self {
            rx,
            state,
            cancel: cancel_tx,
        }
    }

    /// Receive the next delivered snapshot.
    ///
    /// Returns `None` once the stream has closed (terminal error or
    /// cancellation). Check [`last_error()`](Self::last_error) to
    /// distinguish.
    pub async fn recv(&mut self) -> Option<ListSnapshot<T>> {
        self.rx.recv().await
    }

    /// Last time any event (including heartbeat) was processed.
    pub async fn last_event_received(&self) -> Option<Instant> {
        self.state.last_event_received().await
    }

    /// The most recent stream error.
    ///
    /// Transient errors show up here between retries; a terminal error
    /// stays here after the queue closes.
    pub async fn last_error(&self) -> Option<StreamError> {
        self.state.last_error().await
    }

    /// Close the stream and release the underlying transport.
    pub fn close(&self) {
        let _ = self.cancel.send(true);
    }
}

/// How one connection attempt ended.
enum Attempt {
    /// Cancelled, or the consumer went away. Stop without recording.
    Stopped,
    /// Failed; the supervisor classifies and maybe retries.
    Failed(StreamError),
}

/// Outcome of handing one snapshot to the delivery queue.
enum Delivered {
    Sent,
    /// Suppressed by version-tag deduplication.
    Suppressed,
    /// Cancelled or consumer gone.
    Stopped,
}

/// Mutable state threaded through attempts: the snapshot to offer on the
/// next connect and the last delivered version tag (kept across reconnects
/// so a post-reconnect duplicate is still suppressed).
struct Tracked<T> {
    prev: Option<ListSnapshot<T>>,
    last_etag: Option<String>,
}

async fn run_supervisor<T, C>(
    connector: C,
    tx: mpsc::Sender<ListSnapshot<T>>,
    state: Arc<SessionState>,
    mut cancel: watch::Receiver<bool>,
    prev: Option<ListSnapshot<T>>,
    config: StreamConfig,
) where
    T: DeserializeOwned + Clone + Send,
    C: ListConnector<T>,
{
    let mut backoff = Backoff::new(config.min_retry_delay(), config.max_retry_delay());
    let mut tracked = Tracked {
        prev,
        last_etag: None,
    };
    let mut attempt: u64 = 0;

    // The delivery queue closes exactly once: when this task drops `tx`.
    loop {
        if *cancel.borrow() {
            return;
        }

        attempt += 1;
        if attempt > 1 {
            metrics::record_reconnect();
        }

        let span = tracing::debug_span!("list_stream", attempt);
        let outcome = run_attempt(&connector, &tx, &state, &mut cancel, &mut tracked)
            .instrument(span)
            .await;

        let err = match outcome {
            Attempt::Stopped => return,
            Attempt::Failed(err) => err,
        };

        let terminal = err.is_terminal();
        warn!(error = %err, terminal, attempt, "stream attempt ended");
        state.set_error(err).await;

        if terminal {
            metrics::record_terminal_error();
            return;
        }

        if !backoff.failure(&mut cancel).await {
            return;
        }
    }
}

async fn run_attempt<T, C>(
    connector: &C,
    tx: &mpsc::Sender<ListSnapshot<T>>,
    state: &SessionState,
    cancel: &mut watch::Receiver<bool>,
    tracked: &mut Tracked<T>,
) -> Attempt
where
    T: DeserializeOwned + Clone + Send,
    C: ListConnector<T>,
{
    let response = {
        let connect = connector.connect(tracked.prev.as_ref());
        tokio::select! {
            res = connect => match res {
                Ok(response) => response,
                Err(e) => return Attempt::Failed(e),
            },
            _ = session::cancelled(cancel) => return Attempt::Stopped,
        }
    };

    // The stream is open again; a transient error from the previous attempt
    // is no longer current.
    state.clear_error().await;

    let format: StreamFormat = match response.format.parse() {
        Ok(format) => format,
        Err(e) => return Attempt::Failed(e),
    };
    debug!(status = response.status, ?format, "stream opened");

    let reader = FrameReader::new(response.body);
    match format {
        StreamFormat::Full => run_full(reader, tx, state, cancel, tracked).await,
        StreamFormat::Diff => run_diff(reader, tx, state, cancel, tracked).await,
    }
}

/// Full mode: every `list` event is a total overwrite of the collection.
async fn run_full<T>(
    mut reader: FrameReader<StreamBody>,
    tx: &mpsc::Sender<ListSnapshot<T>>,
    state: &SessionState,
    cancel: &mut watch::Receiver<bool>,
    tracked: &mut Tracked<T>,
) -> Attempt
where
    T: DeserializeOwned + Clone + Send,
{
    loop {
        let frame = match next_frame(&mut reader, cancel).await {
            Ok(frame) => frame,
            Err(outcome) => return outcome,
        };

        match frame.event_type.as_str() {
            "list" => {
                let items: Vec<T> = match frame.decode_list() {
                    Ok(items) => items,
                    Err(e) => return Attempt::Failed(e),
                };
                let snapshot = ListSnapshot::new(items, tag_of(&frame));
                match deliver(tx, state, cancel, tracked, snapshot).await {
                    Delivered::Stopped => return Attempt::Stopped,
                    Delivered::Sent | Delivered::Suppressed => {}
                }
            }
            "notModified" => {
                let snapshot = match &tracked.prev {
                    Some(prev) => prev.clone(),
                    None => return not_modified_without_prev(),
                };
                match deliver(tx, state, cancel, tracked, snapshot).await {
                    Delivered::Stopped => return Attempt::Stopped,
                    Delivered::Sent | Delivered::Suppressed => {}
                }
            }
            "heartbeat" => state.touch().await,
            _ => {}
        }
    }
}

/// Diff mode: positional mutations, visible only at `sync` checkpoints.
async fn run_diff<T>(
    mut reader: FrameReader<StreamBody>,
    tx: &mpsc::Sender<ListSnapshot<T>>,
    state: &SessionState,
    cancel: &mut watch::Receiver<bool>,
    tracked: &mut Tracked<T>,
) -> Attempt
where
    T: DeserializeOwned + Clone + Send,
{
    // The tracked collection for this attempt. Owned exclusively here;
    // consumers only ever see deep copies taken at checkpoints.
    let mut items: Vec<T> = Vec::new();

    loop {
        let frame = match next_frame(&mut reader, cancel).await {
            Ok(frame) => frame,
            Err(outcome) => return outcome,
        };

        match frame.event_type.as_str() {
            "add" => {
                if let Err(e) = apply_add(&mut items, &frame) {
                    return Attempt::Failed(e);
                }
            }
            "remove" => {
                if let Err(e) = apply_remove(&mut items, &frame) {
                    return Attempt::Failed(e);
                }
            }
            "update" => {
                // Remove from the old slot, then insert the new payload at
                // the new slot; covers content moves, position moves, or
                // both in a single frame.
                if let Err(e) = apply_remove(&mut items, &frame) {
                    return Attempt::Failed(e);
                }
                if let Err(e) = apply_add(&mut items, &frame) {
                    return Attempt::Failed(e);
                }
            }
            "sync" => {
                let snapshot = ListSnapshot::new(items.clone(), tag_of(&frame));
                match deliver(tx, state, cancel, tracked, snapshot).await {
                    Delivered::Stopped => return Attempt::Stopped,
                    Delivered::Sent | Delivered::Suppressed => {}
                }
            }
            "notModified" => {
                let snapshot = match &tracked.prev {
                    Some(prev) => prev.clone(),
                    None => return not_modified_without_prev(),
                };
                items = snapshot.items.clone();
                match deliver(tx, state, cancel, tracked, snapshot).await {
                    Delivered::Stopped => return Attempt::Stopped,
                    Delivered::Sent | Delivered::Suppressed => {}
                }
            }
            "heartbeat" => state.touch().await,
            _ => {}
        }
    }
}

async fn next_frame(
    reader: &mut FrameReader<StreamBody>,
    cancel: &mut watch::Receiver<bool>,
) -> std::result::Result<Frame, Attempt> {
    let frame = tokio::select! {
        res = reader.next_frame() => res,
        _ = session::cancelled(cancel) => return Err(Attempt::Stopped),
    };

    match frame {
        Ok(Some(frame)) => {
            metrics::record_frame(&frame.event_type);
            Ok(frame)
        }
        // For collections a server-side close is a transient failure; the
        // supervisor reconnects.
        Ok(None) => Err(Attempt::Failed(StreamError::Transport(
            "stream closed by server".to_string(),
        ))),
        Err(e) => Err(Attempt::Failed(e)),
    }
}

fn apply_add<T: DeserializeOwned>(items: &mut Vec<T>, frame: &Frame) -> Result<()> {
    let obj: T = frame.decode_value()?;
    let pos = frame.position("new-position")?;
    if pos > items.len() {
        return Err(StreamError::Decode(format!(
            "new-position {} out of range for length {}",
            pos,
            items.len()
        )));
    }
    items.insert(pos, obj);
    Ok(())
}

fn apply_remove<T>(items: &mut Vec<T>, frame: &Frame) -> Result<()> {
    let pos = frame.position("old-position")?;
    if pos >= items.len() {
        return Err(StreamError::Decode(format!(
            "old-position {} out of range for length {}",
            pos,
            items.len()
        )));
    }
    items.remove(pos);
    Ok(())
}

fn tag_of(frame: &Frame) -> Option<String> {
    frame.param("id").map(str::to_string)
}

fn not_modified_without_prev() -> Attempt {
    Attempt::Failed(StreamError::InvalidEvent(
        "notModified without a previous collection".to_string(),
    ))
}

/// Deliver a snapshot: refresh liveness, deduplicate by version tag, cache
/// it as the previous snapshot for the next reconnect, and enqueue a deep
/// copy for the consumer.
async fn deliver<T: Clone>(
    tx: &mpsc::Sender<ListSnapshot<T>>,
    state: &SessionState,
    cancel: &mut watch::Receiver<bool>,
    tracked: &mut Tracked<T>,
    snapshot: ListSnapshot<T>,
) -> Delivered {
    state.touch().await;

    if let (Some(tag), Some(last)) = (snapshot.etag.as_deref(), tracked.last_etag.as_deref()) {
        if !tag.is_empty() && tag == last {
            debug!(etag = tag, "suppressing duplicate delivery");
            metrics::record_delivery_suppressed();
            return Delivered::Suppressed;
        }
    }

    tracked.last_etag = snapshot.etag.clone();
    tracked.prev = Some(snapshot.clone());
    metrics::record_delivery("list");

    if session::deliver(tx, cancel, snapshot).await {
        Delivered::Sent
    } else {
        Delivered::Stopped
    }
}
