//! # Tracewire Codec - Wire Sink and History Record Encoding
//!
//! ## Purpose
//!
//! This crate contains the "rules" layer of tracewire:
//! - **WireBuffer**: an elastic byte sink with explicit read/write positions
//!   and length-prefixed document framing
//! - **HistoryCodec**: the self-describing message history codec with two
//!   physical representations - a tag-delimited structural form and a compact
//!   fixed-layout binary form selected by a capacity predicate
//! - **Current history cell**: thread-local handoff slot for the record of
//!   the message currently being processed
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → libs/channel
//!     ↑           ↓           ↓
//! Pure Data   Encoding    Transport
//! Structures  Framing     Writer Loop
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Buffer exchange or transport logic (belongs in libs/channel)
//! - Raw record definitions (belongs in libs/types)
//!
//! ## Performance Profile
//!
//! The compact path addresses the sink as contiguous little-endian lanes via
//! `zerocopy` byte-order types, avoiding per-element position bookkeeping.
//! Both decode paths (direct and sequential) accept the same bytes and must
//! produce identical records; a property test enforces this.

pub mod config;
pub mod current;
pub mod error;
pub mod history;
pub mod wire;

pub use config::CodecConfig;
pub use error::{CodecError, CodecResult};
pub use history::{copy, HistoryCodec, SourceContext, COMPACT_HISTORY_TAG};
pub use wire::{WireBuffer, DOCUMENT_LENGTH_MASK, DOCUMENT_METADATA_BIT, DOCUMENT_NOT_COMPLETE_BIT};
