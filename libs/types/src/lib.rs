//! # Tracewire Types Library
//!
//! ## Purpose
//!
//! Pure data structures shared by the tracewire codec and channel layers:
//! - **MessageHistory**: bounded, array-backed log of the hops a message has
//!   traversed plus nanosecond timing marks, attached to every message for
//!   tracing and latency audit
//! - **Capacity constants**: the numeric ceilings every encoder and decoder
//!   must preserve for wire compatibility
//! - **Time sources**: monotonic and wall-clock nanosecond capture
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → libs/codec → libs/channel
//!     ↑             ↓             ↓
//! Pure Data    Encoding Rules  Transport
//! Structures   Framing         Writer Loop
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Encoding/decoding logic (belongs in libs/codec)
//! - Buffer or transport management (belongs in libs/channel)

pub mod constants;
pub mod error;
pub mod history;
pub mod time;

pub use constants::{
    HISTORY_EVENT_NAME, HISTORY_METHOD_ID, MAX_LENGTH, MAX_TIMINGS, MESSAGE_HISTORY_LENGTH,
};
pub use error::HistoryError;
pub use history::MessageHistory;
pub use time::TimeSource;
