//! Configuration for stream sync.
//!
//! A [`StreamConfig`] is passed when opening a stream and can be constructed
//! programmatically or deserialized from YAML/JSON.
//!
//! # YAML Example
//!
//! ```yaml
//! channel_capacity: 100
//! min_retry_delay_ms: 1000
//! max_retry_delay_ms: 60000
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for one stream instance.
///
/// The defaults match the reference system: a delivery queue of 100 pending
/// items and reconnect backoff bounded to `[1s, 60s]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Capacity of the bounded delivery queue. A slow consumer applies
    /// backpressure to the background task once this many deliveries are
    /// pending.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Minimum reconnect backoff ceiling, in milliseconds.
    #[serde(default = "default_min_retry_delay_ms")]
    pub min_retry_delay_ms: u64,

    /// Maximum reconnect backoff ceiling, in milliseconds.
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
}

fn default_channel_capacity() -> usize {
    100
}

fn default_min_retry_delay_ms() -> u64 {
    1_000
}

fn default_max_retry_delay_ms() -> u64 {
    60_000
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            min_retry_delay_ms: default_min_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

impl StreamConfig {
    /// Fast-retry config for tests.
    pub fn for_testing() -> Self {
        Self {
            channel_capacity: 16,
            min_retry_delay_ms: 1,
            max_retry_delay_ms: 20,
        }
    }

    /// Minimum backoff ceiling as a `Duration`.
    pub fn min_retry_delay(&self) -> Duration {
        Duration::from_millis(self.min_retry_delay_ms)
    }

    /// Maximum backoff ceiling as a `Duration`.
    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}
