//! Channel-level errors.
//!
//! Writer-thread failures cannot propagate to a caller - there is none - so
//! they surface through `tracing` at warning severity and the channel
//! transitions toward closed; producer calls then observe [`ChannelError::Closed`]
//! or time out waiting for buffer space.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    /// The transport's connectivity check failed. The writer loop terminates;
    /// reconnection is the caller's concern, via a new channel.
    #[error("connection lost: {context}")]
    ConnectionLost { context: String },

    /// The producer waited past the hard ceiling for a free exchange buffer.
    #[error("timed out waiting for a free exchange buffer: waited {waited:?} of {ceiling:?}")]
    UnrecoverableTimeout { waited: Duration, ceiling: Duration },

    /// The channel or exchanger has been closed; operations fail fast.
    #[error("channel is closed")]
    Closed,

    #[error("transport i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    pub fn connection_lost(context: impl Into<String>) -> Self {
        Self::ConnectionLost {
            context: context.into(),
        }
    }
}

/// Result type for channel operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;
