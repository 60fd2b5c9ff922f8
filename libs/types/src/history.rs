//! # Message History Record
//!
//! ## Purpose
//!
//! Array-backed, bounded log of the (source id, source index) hops a message
//! has traversed plus nanosecond timing marks. One record is attached to each
//! message for tracing and per-hop latency audit. Appending beyond capacity
//! is a hard, reported failure - never a silent truncation or wrap-around.
//!
//! Ownership is single-threaded: a record is either confined to the thread of
//! the message being processed or explicitly handed off through the current
//! history cell in libs/codec. Concurrent mutation from two threads is a
//! caller error.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::DateTime;

use crate::constants::{MAX_TIMINGS, MESSAGE_HISTORY_LENGTH};
use crate::error::HistoryError;
use crate::time::TimeSource;

/// Bounded history of message hops and timing marks.
///
/// Equality and hashing cover the live source and timing prefixes only;
/// behavioral flags and the transient dirty marker are excluded.
#[derive(Clone)]
pub struct MessageHistory {
    source_ids: [u32; MESSAGE_HISTORY_LENGTH],
    source_indexes: [u64; MESSAGE_HISTORY_LENGTH],
    timing_marks: [i64; MAX_TIMINGS],
    sources: usize,
    timings: usize,
    dirty: bool,
    add_source_details: bool,
    time_source: TimeSource,
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageHistory {
    pub fn new() -> Self {
        Self {
            source_ids: [0; MESSAGE_HISTORY_LENGTH],
            source_indexes: [0; MESSAGE_HISTORY_LENGTH],
            timing_marks: [0; MAX_TIMINGS],
            sources: 0,
            timings: 0,
            dirty: false,
            add_source_details: false,
            time_source: TimeSource::Monotonic,
        }
    }

    /// Whether a read should implicitly append the read context's source and
    /// a fresh timing mark. Set this `false` for utilities that expect to
    /// read a history without mutation.
    pub fn set_add_source_details(&mut self, add: bool) {
        self.add_source_details = add;
    }

    pub fn add_source_details(&self) -> bool {
        self.add_source_details
    }

    pub fn set_time_source(&mut self, time_source: TimeSource) {
        self.time_source = time_source;
    }

    pub fn time_source(&self) -> TimeSource {
        self.time_source
    }

    /// Clears both counts. Array contents are left in place.
    pub fn reset(&mut self) {
        self.sources = 0;
        self.timings = 0;
    }

    /// Reseeds the record with a single source hop and one timing mark
    /// capturing the decision instant.
    pub fn reseed(&mut self, source_id: u32, source_index: u64) {
        self.sources = 1;
        self.source_ids[0] = source_id;
        self.source_indexes[0] = source_index;
        self.timings = 1;
        self.timing_marks[0] = self.time_source.now_nanos();
    }

    /// Appends a source hop. Fails hard once the source lane is full.
    pub fn add_source(&mut self, id: u32, index: u64) -> Result<(), HistoryError> {
        if self.sources >= MESSAGE_HISTORY_LENGTH {
            return Err(HistoryError::source_capacity(
                MESSAGE_HISTORY_LENGTH,
                self.sources + 1,
            ));
        }
        self.source_ids[self.sources] = id;
        self.source_indexes[self.sources] = index;
        self.sources += 1;
        self.dirty = true;
        Ok(())
    }

    /// Appends a timing mark. Fails hard once the timing lane is full.
    pub fn add_timing(&mut self, nanos: i64) -> Result<(), HistoryError> {
        if self.timings >= MAX_TIMINGS {
            return Err(HistoryError::timing_capacity(MAX_TIMINGS, self.timings + 1));
        }
        self.timing_marks[self.timings] = nanos;
        self.timings += 1;
        Ok(())
    }

    /// Captures a timing mark from the record's time source.
    pub fn add_timing_now(&mut self) -> Result<(), HistoryError> {
        self.add_timing(self.time_source.now_nanos())
    }

    pub fn sources(&self) -> usize {
        self.sources
    }

    pub fn timings(&self) -> usize {
        self.timings
    }

    pub fn source_id(&self, n: usize) -> u32 {
        self.source_ids[..self.sources][n]
    }

    pub fn source_index(&self, n: usize) -> u64 {
        self.source_indexes[..self.sources][n]
    }

    pub fn timing(&self, n: usize) -> i64 {
        self.timing_marks[..self.timings][n]
    }

    pub fn last_source_id(&self) -> Option<u32> {
        self.sources.checked_sub(1).map(|n| self.source_ids[n])
    }

    pub fn last_source_index(&self) -> Option<u64> {
        self.sources.checked_sub(1).map(|n| self.source_indexes[n])
    }

    /// True iff the trailing `ids.len()` source ids equal `ids` positionally.
    pub fn source_ids_ends_with(&self, ids: &[u32]) -> bool {
        match self.sources.checked_sub(ids.len()) {
            Some(start) => self.source_ids[start..self.sources] == *ids,
            None => false,
        }
    }

    /// True when a mutation has not yet been serialized.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Called by the codec once the record has been written out.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn fmt_timings(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.time_source == TimeSource::WallClock {
            for n in 0..self.timings {
                if n > 0 {
                    f.write_str(",")?;
                }
                let instant = DateTime::from_timestamp_nanos(self.timing_marks[n]);
                write!(f, " {}", instant.naive_utc().format("%Y-%m-%dT%H:%M:%S%.f"))?;
            }
            if self.timings > 0 {
                f.write_str(" ")?;
            }
        } else {
            for n in 0..self.timings {
                if n > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}", self.timing_marks[n])?;
            }
        }
        Ok(())
    }
}

/// Sources render as `id=0xindex`, timings as decimal nanoseconds, or as
/// wall-clock instants when the record captures from the wall clock.
impl fmt::Display for MessageHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MessageHistory { sources: [")?;
        for n in 0..self.sources {
            if n > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}=0x{:x}", self.source_ids[n], self.source_indexes[n])?;
        }
        f.write_str("], timings: [")?;
        self.fmt_timings(f)?;
        write!(f, "], add_source_details={} }}", self.add_source_details)
    }
}

impl fmt::Debug for MessageHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl PartialEq for MessageHistory {
    fn eq(&self, other: &Self) -> bool {
        self.sources == other.sources
            && self.timings == other.timings
            && self.source_ids[..self.sources] == other.source_ids[..other.sources]
            && self.source_indexes[..self.sources] == other.source_indexes[..other.sources]
            && self.timing_marks[..self.timings] == other.timing_marks[..other.timings]
    }
}

impl Eq for MessageHistory {}

impl Hash for MessageHistory {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source_ids[..self.sources].hash(state);
        self.source_indexes[..self.sources].hash(state);
        self.timing_marks[..self.timings].hash(state);
    }
}
