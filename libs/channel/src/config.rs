//! Channel transport tuning.
//!
//! Environment overrides, read once at construction:
//! - `TRACEWIRE_LINGER_US` - post-flush coalescing window in microseconds
//! - `TRACEWIRE_ACQUIRE_TIMEOUT_MS` - hard ceiling on the producer's wait
//!   for a free exchange buffer
//! - `TRACEWIRE_PRODUCER_CEILING_BYTES` - producer buffer size that triggers
//!   backpressure in `acquire_writing_document`

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default post-flush linger: small against typical flush costs, large
/// enough to coalesce a burst of producer writes.
pub const DEFAULT_LINGER: Duration = Duration::from_micros(20);

pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(15);

pub const DEFAULT_PRODUCER_CEILING_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Window after a flush during which further producer writes coalesce
    /// into the next flush.
    pub linger: Duration,
    /// Hard ceiling on the producer-side wait for buffer space.
    pub acquire_timeout: Duration,
    /// Producer buffer size at which `acquire_writing_document` blocks.
    pub producer_ceiling_bytes: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            linger: DEFAULT_LINGER,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            producer_ceiling_bytes: DEFAULT_PRODUCER_CEILING_BYTES,
        }
    }
}

impl ChannelConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(micros) = env_u64("TRACEWIRE_LINGER_US") {
            config.linger = Duration::from_micros(micros);
        }
        if let Some(millis) = env_u64("TRACEWIRE_ACQUIRE_TIMEOUT_MS") {
            config.acquire_timeout = Duration::from_millis(millis);
        }
        if let Some(bytes) = env_u64("TRACEWIRE_PRODUCER_CEILING_BYTES") {
            config.producer_ceiling_bytes = bytes as usize;
        }
        config
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.trim().parse().ok()
}
