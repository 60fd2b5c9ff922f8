//! Codec-level errors for wire document and history record processing.
//!
//! Each variant carries the context needed to diagnose a malformed payload
//! without re-reading the buffer: what was expected, what was found, and
//! where. Codec errors propagate synchronously to the caller of the failing
//! operation.

use thiserror::Error;
use types::HistoryError;

/// Errors raised while encoding or decoding wire documents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A record mutation hit its fixed capacity during decode or copy.
    #[error(transparent)]
    Capacity(#[from] HistoryError),

    /// The buffer ended before a complete value could be read.
    #[error("truncated value: need {need} bytes, got {got} (context: {context})")]
    TruncatedValue {
        need: usize,
        got: usize,
        context: &'static str,
    },

    /// A structural field name did not match the expected sequence name.
    #[error("unexpected field: expected {expected:?}, got {got:?}")]
    UnexpectedField { expected: &'static str, got: String },

    /// A document header failed the well-formedness check.
    #[error("malformed document header {header:#010x}: {reason}")]
    MalformedDocumentHeader { header: u32, reason: &'static str },

    /// A compact payload declared more sources than any record can hold -
    /// a protocol violation, not a recoverable condition.
    #[error("source count {count} exceeds history capacity {capacity}")]
    SourceOverflow { count: usize, capacity: usize },

    /// A compact payload declared more timings than any record can hold.
    #[error("timing count {count} exceeds history capacity {capacity}")]
    TimingOverflow { count: usize, capacity: usize },

    /// A structural sequence's byte length is not a multiple of its element
    /// size.
    #[error("malformed {name} sequence: byte length {byte_len} is not a whole number of elements")]
    MalformedSequence { name: &'static str, byte_len: usize },

    /// An event envelope carried a tag this codec does not recognize.
    #[error("unknown event envelope tag {tag:#04x}")]
    UnknownEnvelopeTag { tag: u8 },

    /// An event envelope named an event other than the history event.
    #[error("unexpected event: expected {expected:?}, got {got:?}")]
    UnexpectedEvent { expected: &'static str, got: String },
}

impl CodecError {
    pub fn truncated(need: usize, got: usize, context: &'static str) -> Self {
        Self::TruncatedValue { need, got, context }
    }

    pub fn unexpected_field(expected: &'static str, got: impl Into<String>) -> Self {
        Self::UnexpectedField {
            expected,
            got: got.into(),
        }
    }

    pub fn malformed_header(header: u32, reason: &'static str) -> Self {
        Self::MalformedDocumentHeader { header, reason }
    }
}

/// Result type for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;
