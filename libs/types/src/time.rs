//! Nanosecond time capture for history timing marks.
//!
//! Timing marks are signed 64-bit nanosecond counters with no epoch
//! adjustment beyond the clock chosen at capture time: the monotonic source
//! is anchored at first use within the process, the wall-clock source counts
//! from the Unix epoch.

use once_cell::sync::Lazy;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

static MONOTONIC_ANCHOR: Lazy<Instant> = Lazy::new(Instant::now);

/// Nanoseconds from the process-local monotonic anchor. Never goes backwards.
#[inline]
pub fn monotonic_nanos() -> i64 {
    MONOTONIC_ANCHOR.elapsed().as_nanos() as i64
}

/// Wall-clock nanoseconds since the Unix epoch.
#[inline]
pub fn wall_clock_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Which clock stamps a record's timing marks.
///
/// `Fixed` pins capture to a known instant so tests produce deterministic
/// bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    Monotonic,
    WallClock,
    Fixed(i64),
}

impl Default for TimeSource {
    fn default() -> Self {
        TimeSource::Monotonic
    }
}

impl TimeSource {
    #[inline]
    pub fn now_nanos(&self) -> i64 {
        match self {
            TimeSource::Monotonic => monotonic_nanos(),
            TimeSource::WallClock => wall_clock_nanos(),
            TimeSource::Fixed(nanos) => *nanos,
        }
    }
}
