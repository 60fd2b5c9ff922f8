//! Record-level errors for message history mutation.

use thiserror::Error;

/// Errors raised while mutating a history record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// A source or timing append would exceed the record's fixed capacity.
    /// Never silently truncated.
    #[error("message history {lane} capacity exceeded: {requested} > {capacity}")]
    CapacityExceeded {
        lane: &'static str,
        capacity: usize,
        requested: usize,
    },
}

impl HistoryError {
    pub fn source_capacity(capacity: usize, requested: usize) -> Self {
        Self::CapacityExceeded {
            lane: "sources",
            capacity,
            requested,
        }
    }

    pub fn timing_capacity(capacity: usize, requested: usize) -> Self {
        Self::CapacityExceeded {
            lane: "timings",
            capacity,
            requested,
        }
    }
}
