//! # Wire Exchanger
//!
//! ## Purpose
//!
//! Hands a stream of framed documents from exactly one producer thread to
//! exactly one consumer thread with minimal synchronization. Two buffer
//! slots exist: at any instant one is producer-owned (being appended to) and
//! the other consumer-owned (being drained). A slot never transitions
//! between the two ownerships directly - handoff is a whole-buffer content
//! swap performed under both slot locks, and only at release boundaries, so
//! the consumer never observes a partially written frame.
//!
//! Handoff is consumer-driven: when the consumer polls an empty slot it
//! try-locks the producer slot and pulls any bytes already released. Between
//! polls the producer keeps accumulating into its own buffer, so documents
//! written during the writer's linger window coalesce into a single flush -
//! that batching is the point of the design.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};

use codec::WireBuffer;

use crate::config::ChannelConfig;
use crate::error::{ChannelError, ChannelResult};

/// Initial capacity of each exchange buffer. Sized so the compact history
/// fast path is directly addressable from the start.
const EXCHANGE_BUFFER_CAPACITY: usize = 64 * 1024;

/// Double-buffered single-producer/single-consumer document handoff.
#[derive(Debug)]
pub struct WireExchanger {
    producer: Mutex<WireBuffer>,
    consumer: Mutex<WireBuffer>,
    /// Signalled whenever a swap empties the producer slot.
    space: Condvar,
    closed: AtomicBool,
    config: ChannelConfig,
}

impl WireExchanger {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            producer: Mutex::new(WireBuffer::with_capacity(EXCHANGE_BUFFER_CAPACITY)),
            consumer: Mutex::new(WireBuffer::with_capacity(EXCHANGE_BUFFER_CAPACITY)),
            space: Condvar::new(),
            closed: AtomicBool::new(false),
            config,
        }
    }

    fn check_open(&self) -> ChannelResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChannelError::Closed);
        }
        Ok(())
    }

    /// Locks the producer slot for appending framed documents. Must be
    /// balanced by dropping the lease, which publishes the written bytes.
    pub fn acquire_producer(&self) -> ChannelResult<ProducerLease<'_>> {
        self.check_open()?;
        Ok(ProducerLease {
            guard: Some(self.producer.lock()),
        })
    }

    /// Scoped framing over the producer buffer: begins a length-prefixed
    /// document, exposes the buffer for content writes, and on drop
    /// finalizes the frame and releases the producer.
    pub fn writing_document(&self, metadata: bool) -> ChannelResult<WritingDocument<'_>> {
        Ok(WritingDocument::begin(self.acquire_producer()?, metadata))
    }

    /// As [`Self::writing_document`], but applies backpressure: once the
    /// producer buffer has grown past the configured ceiling this waits for
    /// the consumer to drain, surfacing an unrecoverable timeout after the
    /// configured hard ceiling.
    pub fn acquire_writing_document(&self, metadata: bool) -> ChannelResult<WritingDocument<'_>> {
        self.check_open()?;
        let start = Instant::now();
        let mut guard = self.producer.lock();
        while guard.len() >= self.config.producer_ceiling_bytes {
            self.check_open()?;
            let waited = start.elapsed();
            let Some(left) = self.config.acquire_timeout.checked_sub(waited) else {
                return Err(ChannelError::UnrecoverableTimeout {
                    waited,
                    ceiling: self.config.acquire_timeout,
                });
            };
            let _ = self.space.wait_for(&mut guard, left);
        }
        self.check_open()?;
        let lease = ProducerLease { guard: Some(guard) };
        Ok(WritingDocument::begin(lease, metadata))
    }

    /// Non-blocking poll point for the consumer thread. The returned buffer
    /// may be empty if the producer has released nothing since the last
    /// drain.
    pub fn acquire_consumer(&self) -> ChannelResult<ConsumerLease<'_>> {
        self.check_open()?;
        let mut guard = self.consumer.lock();
        if guard.is_empty() {
            // pull bytes the producer has already released; a failed
            // try_lock means a document is mid-write and will hand off on
            // its own release
            if let Some(mut producer) = self.producer.try_lock() {
                if !producer.is_empty() {
                    std::mem::swap(&mut *guard, &mut *producer);
                    self.space.notify_all();
                }
            }
        }
        Ok(ConsumerLease {
            exchanger: self,
            guard: Some(guard),
        })
    }

    /// Closes the exchange: subsequent producer and consumer operations fail
    /// fast. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.space.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Consumer-release: the drained buffer is cleared and becomes eligible
    /// for the next handoff swap.
    fn release_consumer(&self, consumer: &mut WireBuffer) {
        consumer.clear();
    }
}

/// Exclusive hold on the producer slot. Dropping it releases the producer,
/// publishing the written bytes for the consumer's next poll.
#[derive(Debug)]
pub struct ProducerLease<'a> {
    guard: Option<MutexGuard<'a, WireBuffer>>,
}

impl Deref for ProducerLease<'_> {
    type Target = WireBuffer;

    fn deref(&self) -> &WireBuffer {
        self.guard.as_ref().expect("lease still held")
    }
}

impl DerefMut for ProducerLease<'_> {
    fn deref_mut(&mut self) -> &mut WireBuffer {
        self.guard.as_mut().expect("lease still held")
    }
}

impl Drop for ProducerLease<'_> {
    fn drop(&mut self) {
        // releasing the lock publishes the bytes; the consumer's next poll
        // pulls them across
        self.guard.take();
    }
}

/// Exclusive hold on the consumer slot. Dropping it clears the drained
/// bytes and makes the slot reusable.
#[derive(Debug)]
pub struct ConsumerLease<'a> {
    exchanger: &'a WireExchanger,
    guard: Option<MutexGuard<'a, WireBuffer>>,
}

impl Deref for ConsumerLease<'_> {
    type Target = WireBuffer;

    fn deref(&self) -> &WireBuffer {
        self.guard.as_ref().expect("lease still held")
    }
}

impl DerefMut for ConsumerLease<'_> {
    fn deref_mut(&mut self) -> &mut WireBuffer {
        self.guard.as_mut().expect("lease still held")
    }
}

impl Drop for ConsumerLease<'_> {
    fn drop(&mut self) {
        if let Some(mut guard) = self.guard.take() {
            self.exchanger.release_consumer(&mut guard);
        }
    }
}

/// Scoped document-writing context over the producer buffer.
///
/// Content writes go through `Deref` to the underlying [`WireBuffer`]. On
/// drop the frame length is finalized (or the frame rolled back if nothing
/// was written) and the producer is released.
#[derive(Debug)]
pub struct WritingDocument<'a> {
    lease: ProducerLease<'a>,
    header_pos: usize,
}

impl<'a> WritingDocument<'a> {
    fn begin(mut lease: ProducerLease<'a>, metadata: bool) -> Self {
        let header_pos = lease.begin_document(metadata);
        Self { lease, header_pos }
    }

    /// Finalizes the document explicitly; equivalent to dropping.
    pub fn close(self) {}
}

impl Deref for WritingDocument<'_> {
    type Target = WireBuffer;

    fn deref(&self) -> &WireBuffer {
        &self.lease
    }
}

impl DerefMut for WritingDocument<'_> {
    fn deref_mut(&mut self) -> &mut WireBuffer {
        &mut self.lease
    }
}

impl Drop for WritingDocument<'_> {
    fn drop(&mut self) {
        if self.lease.len() == self.header_pos + 4 {
            // nothing was written: roll the empty frame back
            self.lease.truncate(self.header_pos);
        } else {
            self.lease.end_document(self.header_pos);
        }
        // the lease's own drop publishes the bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn exchanger() -> WireExchanger {
        WireExchanger::new(ChannelConfig::default())
    }

    fn write_doc(exchanger: &WireExchanger, payload: &[u8]) {
        let mut doc = exchanger.writing_document(false).unwrap();
        doc.write_bytes(payload);
    }

    fn drain_one(exchanger: &WireExchanger) -> Vec<Vec<u8>> {
        let mut lease = exchanger.acquire_consumer().unwrap();
        let mut docs = Vec::new();
        while !lease.is_empty() {
            let (_, payload) = lease.read_document().unwrap();
            docs.push(payload.to_vec());
        }
        docs
    }

    #[test]
    fn released_document_is_visible_to_consumer() {
        let exchanger = exchanger();
        write_doc(&exchanger, b"d1");
        assert_eq!(drain_one(&exchanger), vec![b"d1".to_vec()]);
        // drained and cleared
        assert!(exchanger.acquire_consumer().unwrap().is_empty());
    }

    #[test]
    fn documents_batch_while_consumer_is_busy() {
        let exchanger = exchanger();
        write_doc(&exchanger, b"d1");

        let busy = exchanger.acquire_consumer().unwrap();
        assert!(!busy.is_empty());
        // released while the consumer is mid-drain: they accumulate
        write_doc(&exchanger, b"d2");
        write_doc(&exchanger, b"d3");
        drop(busy);

        // both batched documents arrive together, in order
        assert_eq!(drain_one(&exchanger), vec![b"d2".to_vec(), b"d3".to_vec()]);
    }

    #[test]
    fn consumer_pulls_bytes_stranded_in_producer_slot() {
        let exchanger = exchanger();
        // released while the consumer slot was held elsewhere
        {
            let busy = exchanger.acquire_consumer().unwrap();
            write_doc(&exchanger, b"d1");
            drop(busy);
        }
        // the next poll must pull d1 across, not strand it
        assert_eq!(drain_one(&exchanger), vec![b"d1".to_vec()]);
    }

    #[test]
    fn empty_document_rolls_back() {
        let exchanger = exchanger();
        {
            let doc = exchanger.writing_document(false).unwrap();
            doc.close();
        }
        assert!(exchanger.acquire_consumer().unwrap().is_empty());
    }

    #[test]
    fn metadata_flag_travels_with_the_frame() {
        let exchanger = exchanger();
        {
            let mut doc = exchanger.writing_document(true).unwrap();
            doc.write_u8(1);
        }
        let mut lease = exchanger.acquire_consumer().unwrap();
        let (metadata, payload) = lease.read_document().unwrap();
        assert!(metadata);
        assert_eq!(payload, &[1]);
    }

    #[test]
    fn close_fails_fast_on_both_sides() {
        let exchanger = exchanger();
        exchanger.close();
        exchanger.close(); // idempotent
        assert!(matches!(
            exchanger.writing_document(false),
            Err(ChannelError::Closed)
        ));
        assert!(matches!(
            exchanger.acquire_consumer(),
            Err(ChannelError::Closed)
        ));
    }

    #[test]
    fn backpressure_times_out_when_nothing_drains() {
        let exchanger = WireExchanger::new(ChannelConfig {
            producer_ceiling_bytes: 16,
            acquire_timeout: Duration::from_millis(50),
            ..ChannelConfig::default()
        });
        // occupy the consumer slot so the ceiling cannot clear by swap
        let busy = exchanger.acquire_consumer().unwrap();
        write_doc(&exchanger, &[0u8; 32]);

        let err = exchanger.acquire_writing_document(false).unwrap_err();
        assert!(matches!(err, ChannelError::UnrecoverableTimeout { .. }));
        drop(busy);
    }

    #[test]
    fn ordering_holds_across_producer_and_consumer_threads() {
        let exchanger = std::sync::Arc::new(exchanger());
        let producer = {
            let exchanger = exchanger.clone();
            std::thread::spawn(move || {
                for n in 0..100u32 {
                    let mut doc = exchanger.writing_document(false).unwrap();
                    doc.write_u32(n);
                }
            })
        };

        let mut seen = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while seen.len() < 100 {
            assert!(Instant::now() < deadline, "drained {} of 100", seen.len());
            let mut lease = exchanger.acquire_consumer().unwrap();
            while !lease.is_empty() {
                let (_, payload) = lease.read_document().unwrap();
                seen.push(u32::from_le_bytes(payload.try_into().unwrap()));
            }
        }
        producer.join().unwrap();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }
}
