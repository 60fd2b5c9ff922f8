//! Codec configuration toggles.
//!
//! All toggles default to off and can be overridden from the environment,
//! the same knobs operators flip in production without rebuilding:
//!
//! - `TRACEWIRE_HISTORY_AS_BYTES` - prefer the compact fixed-layout history
//!   encoding when the sink allows it
//! - `TRACEWIRE_HISTORY_WALL_CLOCK` - stamp timing marks from the wall clock
//!   instead of the monotonic clock
//! - `TRACEWIRE_HISTORY_AS_METHOD_ID` - tag embedded history records with
//!   the reserved numeric event id instead of the event name

use serde::{Deserialize, Serialize};
use tracing::debug;
use types::{MessageHistory, TimeSource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    pub compact_binary: bool,
    pub wall_clock_timings: bool,
    pub method_id_events: bool,
}

impl CodecConfig {
    pub fn from_env() -> Self {
        let config = Self {
            compact_binary: env_flag("TRACEWIRE_HISTORY_AS_BYTES"),
            wall_clock_timings: env_flag("TRACEWIRE_HISTORY_WALL_CLOCK"),
            method_id_events: env_flag("TRACEWIRE_HISTORY_AS_METHOD_ID"),
        };
        if config != Self::default() {
            debug!(?config, "history codec toggles overridden from environment");
        }
        config
    }

    /// The clock records created under this configuration capture from.
    pub fn time_source(&self) -> TimeSource {
        if self.wall_clock_timings {
            TimeSource::WallClock
        } else {
            TimeSource::Monotonic
        }
    }

    /// A fresh record wired to this configuration's time source.
    pub fn new_history(&self) -> MessageHistory {
        let mut record = MessageHistory::new();
        record.set_time_source(self.time_source());
        record
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| matches!(value.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(false)
}
