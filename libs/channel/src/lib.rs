//! # Tracewire Channel - Buffered Document Transport
//!
//! ## Purpose
//!
//! Moves framed wire documents from an application thread to a transport
//! with minimal producer-side latency:
//!
//! - **WireExchanger**: a double-buffered single-producer/single-consumer
//!   handoff. The producer appends framed documents into one buffer while
//!   the consumer drains the other; ownership flips by whole-buffer swap at
//!   release boundaries, so a reader never observes a partial frame.
//! - **BufferedChannel**: owns a dedicated background writer thread that
//!   drains the exchanger, flushes to the transport, coalesces small writes
//!   within a bounded linger window, and backs off under idle load through a
//!   pluggable backoff strategy.
//!
//! ## Architecture Role
//!
//! ```text
//! producer thread → [WireExchanger] → writer thread → transport
//!       ↓                 ↓                ↓              ↓
//! writing_document   buffer swap     linger window    flush_out
//! ```
//!
//! The design deliberately favors batching over per-write flushing: multiple
//! small documents coalesce into a single flush, trading latency bounded by
//! the linger window for drastically reduced per-flush overhead.

pub mod backoff;
pub mod buffered;
pub mod config;
pub mod error;
pub mod exchanger;
pub mod poller;
pub mod transport;

pub use backoff::{Backoff, BusySpinBackoff, YieldingBackoff};
pub use buffered::BufferedChannel;
pub use config::ChannelConfig;
pub use error::{ChannelError, ChannelResult};
pub use exchanger::{ConsumerLease, ProducerLease, WireExchanger, WritingDocument};
pub use poller::EventPoller;
pub use transport::{ChannelTransport, TcpTransport};
