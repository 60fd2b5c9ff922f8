//! # Buffered Channel
//!
//! ## Purpose
//!
//! Owns a dedicated background writer thread that continuously drains the
//! [`WireExchanger`] and flushes to the transport. After each flush the
//! writer spin-waits out a linger window, giving the producer a further
//! chance to batch small writes into the next flush; when the exchanger
//! comes up empty the writer runs the optional event poller and otherwise
//! backs off.
//!
//! Document framing happens entirely on the producer side, so the writer
//! only ever sees whole frames; its header check before a flush is a
//! defensive assertion against framing bugs, not a production gate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::backoff::Backoff;
use crate::config::{ChannelConfig, DEFAULT_LINGER};
use crate::error::{ChannelError, ChannelResult};
use crate::exchanger::{ProducerLease, WireExchanger, WritingDocument};
use crate::poller::EventPoller;
use crate::transport::ChannelTransport;

type SharedPoller = Arc<Mutex<Option<Box<dyn EventPoller>>>>;

/// Buffered document channel with a background writer thread.
pub struct BufferedChannel {
    exchanger: Arc<WireExchanger>,
    closing: Arc<AtomicBool>,
    poller: SharedPoller,
    writer: Option<JoinHandle<()>>,
    config: ChannelConfig,
}

impl BufferedChannel {
    /// Builds the channel and starts its writer thread. The transport and
    /// backoff strategy move into the writer.
    pub fn new<T, B>(transport: T, backoff: B, config: ChannelConfig) -> ChannelResult<Self>
    where
        T: ChannelTransport,
        B: Backoff + 'static,
    {
        if config.linger != DEFAULT_LINGER {
            debug!(linger = ?config.linger, "non-default linger window");
        }
        let exchanger = Arc::new(WireExchanger::new(config));
        let closing = Arc::new(AtomicBool::new(false));
        let poller: SharedPoller = Arc::new(Mutex::new(None));

        let writer = {
            let exchanger = exchanger.clone();
            let closing = closing.clone();
            let poller = poller.clone();
            std::thread::Builder::new()
                .name("tracewire~writer".into())
                .spawn(move || write_loop(exchanger, closing, poller, transport, backoff, config))?
        };

        Ok(Self {
            exchanger,
            closing,
            poller,
            writer: Some(writer),
            config,
        })
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Opens a framed document over the producer buffer; the frame becomes
    /// visible to the writer thread when the returned context drops.
    pub fn writing_document(&self, metadata: bool) -> ChannelResult<WritingDocument<'_>> {
        self.check_open()?;
        self.exchanger.writing_document(metadata)
    }

    /// As [`Self::writing_document`], waiting for buffer space when the
    /// producer is too far ahead of the writer.
    pub fn acquire_writing_document(&self, metadata: bool) -> ChannelResult<WritingDocument<'_>> {
        self.check_open()?;
        self.exchanger.acquire_writing_document(metadata)
    }

    /// Raw access to the producer buffer for callers that frame documents
    /// themselves. Prefer [`Self::writing_document`].
    pub fn acquire_producer(&self) -> ChannelResult<ProducerLease<'_>> {
        self.check_open()?;
        self.exchanger.acquire_producer()
    }

    /// Installs the idle-cycle poller, replacing any previous one.
    pub fn set_event_poller(&self, poller: Box<dyn EventPoller>) {
        *self.poller.lock() = Some(poller);
    }

    /// Removes and returns the current poller.
    pub fn clear_event_poller(&self) -> Option<Box<dyn EventPoller>> {
        self.poller.lock().take()
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    fn check_open(&self) -> ChannelResult<()> {
        if self.is_closing() {
            return Err(ChannelError::Closed);
        }
        Ok(())
    }

    /// Signals the writer loop to stop, closes the exchanger, and joins the
    /// writer thread. Idempotent.
    pub fn close(&mut self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        self.exchanger.close();
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                warn!("writer thread panicked during close");
            }
        }
    }
}

impl Drop for BufferedChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn write_loop<T: ChannelTransport, B: Backoff>(
    exchanger: Arc<WireExchanger>,
    closing: Arc<AtomicBool>,
    poller: SharedPoller,
    mut transport: T,
    mut backoff: B,
    config: ChannelConfig,
) {
    let result = (|| -> ChannelResult<()> {
        while !closing.load(Ordering::Acquire) {
            let start = Instant::now();
            transport.ensure_connected()?;

            let mut consumer = match exchanger.acquire_consumer() {
                Ok(lease) => lease,
                Err(ChannelError::Closed) => break,
                Err(err) => return Err(err),
            };
            if consumer.is_empty() {
                let worked = poller
                    .lock()
                    .as_mut()
                    .map(|poller| poller.on_poll())
                    .unwrap_or(false);
                if !worked {
                    backoff.pause();
                }
                drop(consumer);
                continue;
            }

            debug_assert!(
                consumer.validate_document_header().is_ok(),
                "drained buffer does not start with a well-formed document"
            );
            backoff.reset();
            transport.flush_out(&mut consumer)?;
            drop(consumer);

            // post-flush linger: let the producer batch more writes into the
            // next flush before another transport round-trip
            while start.elapsed() < config.linger {
                if closing.load(Ordering::Acquire) {
                    break;
                }
                backoff.pause();
            }
        }
        Ok(())
    })();

    if let Err(err) = result {
        if !closing.load(Ordering::Acquire) {
            warn!(error = %err, "buffered channel writer died");
        }
    }
    // the poller is owned by the writer's lifetime; drop it on the way out
    poller.lock().take();
}
