//! Shared test utilities for integration tests.
//!
//! This module provides:
//! - A scripted [`MockConnector`] recording every connect attempt
//! - Wire-format builders for event frames

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use stream_sync_engine::{
    BoxFuture, ListConnector, ListSnapshot, StreamError, StreamResponse,
};

/// One scripted outcome for a connect attempt.
pub enum ConnectStep {
    /// Successful exchange: the given format header and framed body.
    Stream {
        format: &'static str,
        body: Vec<u8>,
    },
    /// The exchange fails with this error.
    Fail(StreamError),
}

impl ConnectStep {
    pub fn full(body: Vec<u8>) -> Self {
        Self::Stream {
            format: "full",
            body,
        }
    }

    pub fn diff(body: Vec<u8>) -> Self {
        Self::Stream {
            format: "diff",
            body,
        }
    }

    pub fn http(status: u16) -> Self {
        Self::Fail(StreamError::Http {
            status,
            message: format!("status {}", status),
        })
    }
}

/// Scripted connector: plays back one [`ConnectStep`] per connect attempt
/// and records the previous snapshot offered by each attempt.
///
/// Once the script is exhausted, connect attempts hang until the stream is
/// closed, so tests see a deterministic quiescent state.
pub struct MockConnector<T> {
    steps: Mutex<VecDeque<ConnectStep>>,
    connects: AtomicUsize,
    prevs: Mutex<Vec<Option<ListSnapshot<T>>>>,
}

impl<T: Clone> MockConnector<T> {
    pub fn new(steps: Vec<ConnectStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            connects: AtomicUsize::new(0),
            prevs: Mutex::new(Vec::new()),
        }
    }

    /// Number of connect attempts made so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// The previous snapshots offered on each attempt, in order.
    pub fn offered_prevs(&self) -> Vec<Option<ListSnapshot<T>>> {
        self.prevs.lock().unwrap().clone()
    }
}

impl<T: Clone + Send> ListConnector<T> for MockConnector<T> {
    fn connect<'a>(
        &'a self,
        prev: Option<&'a ListSnapshot<T>>,
    ) -> BoxFuture<'a, StreamResponse> {
        // Clone before the async block: holding the borrow inside the
        // boxed future would demand `T: Sync`.
        let prev = prev.cloned();
        Box::pin(async move {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.prevs.lock().unwrap().push(prev);

            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(ConnectStep::Stream { format, body }) => Ok(StreamResponse {
                    status: 200,
                    format: format.to_string(),
                    body: Box::new(Cursor::new(body)),
                }),
                Some(ConnectStep::Fail(e)) => Err(e),
                None => {
                    // Script exhausted: stay pending until cancelled.
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        })
    }
}

// =============================================================================
// Wire-format builders
// =============================================================================

/// Build one framed block: `event:` line, params, data lines, terminator.
pub fn frame(event: &str, params: &[(&str, &str)], data: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("event: {}\n", event).as_bytes());
    for (key, value) in params {
        out.extend_from_slice(format!("{}: {}\n", key, value).as_bytes());
    }
    for line in data {
        out.extend_from_slice(format!("data: {}\n", line).as_bytes());
    }
    out.push(b'\n');
    out
}

pub fn initial(json: &str) -> Vec<u8> {
    frame("initial", &[], &[json])
}

pub fn update_value(json: &str) -> Vec<u8> {
    frame("update", &[], &[json])
}

pub fn not_modified() -> Vec<u8> {
    frame("notModified", &[], &[])
}

pub fn heartbeat() -> Vec<u8> {
    frame("heartbeat", &[], &[])
}

pub fn list(id: &str, json: &str) -> Vec<u8> {
    frame("list", &[("id", id)], &[json])
}

pub fn add(pos: usize, json: &str) -> Vec<u8> {
    let pos = pos.to_string();
    frame("add", &[("new-position", &pos)], &[json])
}

pub fn remove(pos: usize) -> Vec<u8> {
    let pos = pos.to_string();
    frame("remove", &[("old-position", &pos)], &[])
}

pub fn update_item(old: usize, new: usize, json: &str) -> Vec<u8> {
    let old = old.to_string();
    let new = new.to_string();
    frame(
        "update",
        &[("old-position", &old), ("new-position", &new)],
        &[json],
    )
}

pub fn sync(id: &str) -> Vec<u8> {
    frame("sync", &[("id", id)], &[])
}

/// Concatenate framed blocks into one body.
pub fn body(blocks: &[Vec<u8>]) -> Vec<u8> {
    blocks.concat()
}
