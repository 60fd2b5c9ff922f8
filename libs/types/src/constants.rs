//! # History Record Constants
//!
//! ## Purpose
//!
//! Central registry of the capacity ceilings and reserved identifiers for the
//! message history wire format. These values define on-wire behavior and must
//! remain stable for backward compatibility across all services.

/// Maximum number of source hops a history record can carry.
pub const MESSAGE_HISTORY_LENGTH: usize = 128;

/// Maximum number of timing marks a history record can carry.
pub const MAX_TIMINGS: usize = MESSAGE_HISTORY_LENGTH * 2;

/// Capacity predicate for the compact fixed-layout encoding path.
///
/// A sink must have at least this many bytes directly addressable before the
/// codec takes the fixed-layout path. The bound dominates the worst-case
/// encoded size (two count bytes, full source and timing lanes, plus the
/// emitted timestamp).
pub const MAX_LENGTH: usize = 2 + MESSAGE_HISTORY_LENGTH * 8 * 4;

/// Event name used when a history record is embedded in a method-call stream.
pub const HISTORY_EVENT_NAME: &str = "history";

/// Reserved numeric event id used in place of [`HISTORY_EVENT_NAME`] when the
/// method-identifier toggle is active.
pub const HISTORY_METHOD_ID: u16 = 0x8000;
