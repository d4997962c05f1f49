//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics through the `metrics` facade:
//! - Frames processed per event type
//! - Deliveries and deduplicated (suppressed) deliveries
//! - Reconnect attempts and terminal failures
//!
//! All metrics are prefixed with `stream_sync_`; counters end in `_total`.

use metrics::counter;

/// Record one processed frame.
pub fn record_frame(event_type: &str) {
    counter!("stream_sync_frames_total", "event_type" => event_type.to_string()).increment(1);
}

/// Record a delivery handed to the consumer queue.
pub fn record_delivery(kind: &'static str) {
    counter!("stream_sync_deliveries_total", "kind" => kind).increment(1);
}

/// Record a delivery suppressed by version-tag deduplication.
pub fn record_delivery_suppressed() {
    counter!("stream_sync_deliveries_suppressed_total").increment(1);
}

/// Record a reconnect attempt.
pub fn record_reconnect() {
    counter!("stream_sync_reconnects_total").increment(1);
}

/// Record a stream ending with a terminal (non-retried) error.
pub fn record_terminal_error() {
    counter!("stream_sync_terminal_errors_total").increment(1);
}
