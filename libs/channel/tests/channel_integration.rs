//! End-to-end channel tests against a recording transport: flush ordering,
//! linger coalescing, writer-death behavior, and poller lifecycle.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use channel::{
    BufferedChannel, ChannelConfig, ChannelError, ChannelResult, ChannelTransport, EventPoller,
    YieldingBackoff,
};
use codec::{CodecConfig, HistoryCodec, WireBuffer};
use types::{MessageHistory, TimeSource};

struct RecordingState {
    flushes: Mutex<Vec<Vec<u8>>>,
    down: AtomicBool,
}

#[derive(Clone)]
struct RecordingTransport(Arc<RecordingState>);

impl RecordingTransport {
    fn new() -> (Self, Arc<RecordingState>) {
        let state = Arc::new(RecordingState {
            flushes: Mutex::new(Vec::new()),
            down: AtomicBool::new(false),
        });
        (Self(state.clone()), state)
    }
}

impl ChannelTransport for RecordingTransport {
    fn ensure_connected(&mut self) -> ChannelResult<()> {
        if self.0.down.load(Ordering::Acquire) {
            return Err(ChannelError::connection_lost("test transport down"));
        }
        Ok(())
    }

    fn flush_out(&mut self, buffer: &mut WireBuffer) -> ChannelResult<()> {
        let bytes = buffer.as_read_slice().to_vec();
        buffer.advance_read(bytes.len());
        self.0.flushes.lock().push(bytes);
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("channel=debug")
        .with_test_writer()
        .try_init();
}

fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    pred()
}

fn parse_payloads(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut buf = WireBuffer::new();
    buf.write_bytes(bytes);
    let mut payloads = Vec::new();
    while !buf.is_empty() {
        let (_, payload) = buf.read_document().unwrap();
        payloads.push(payload.to_vec());
    }
    payloads
}

fn flushed_payloads(state: &RecordingState) -> Vec<Vec<u8>> {
    let joined: Vec<u8> = state.flushes.lock().iter().flatten().copied().collect();
    parse_payloads(&joined)
}

#[test]
fn documents_flush_in_write_order() {
    init_tracing();
    let (transport, state) = RecordingTransport::new();
    let channel =
        BufferedChannel::new(transport, YieldingBackoff::new(), ChannelConfig::default()).unwrap();

    for payload in [b"d1".as_slice(), b"d2", b"d3"] {
        let mut doc = channel.writing_document(false).unwrap();
        doc.write_bytes(payload);
    }

    assert!(wait_until(Duration::from_secs(5), || {
        flushed_payloads(&state).len() == 3
    }));
    assert_eq!(
        flushed_payloads(&state),
        vec![b"d1".to_vec(), b"d2".to_vec(), b"d3".to_vec()]
    );
    drop(channel);
}

#[test]
fn burst_within_linger_coalesces_into_one_flush() {
    init_tracing();
    let (transport, state) = RecordingTransport::new();
    let config = ChannelConfig {
        linger: Duration::from_millis(200),
        ..ChannelConfig::default()
    };
    let channel = BufferedChannel::new(transport, YieldingBackoff::new(), config).unwrap();

    {
        let mut doc = channel.writing_document(false).unwrap();
        doc.write_bytes(b"d1");
    }
    assert!(wait_until(Duration::from_secs(5), || {
        state.flushes.lock().len() == 1
    }));

    // released well inside the linger window following the first flush
    {
        let mut doc = channel.writing_document(false).unwrap();
        doc.write_bytes(b"d2");
    }
    {
        let mut doc = channel.writing_document(false).unwrap();
        doc.write_bytes(b"d3");
    }

    assert!(wait_until(Duration::from_secs(5), || {
        state.flushes.lock().len() >= 2
    }));
    // both documents arrive in the second flush call
    let flushes = state.flushes.lock();
    assert_eq!(flushes.len(), 2);
    assert_eq!(
        parse_payloads(&flushes[1]),
        vec![b"d2".to_vec(), b"d3".to_vec()]
    );
    drop(flushes);
    drop(channel);
}

#[test]
fn history_record_travels_through_the_channel() {
    init_tracing();
    let (transport, state) = RecordingTransport::new();
    let channel =
        BufferedChannel::new(transport, YieldingBackoff::new(), ChannelConfig::default()).unwrap();
    let codec = HistoryCodec::new(CodecConfig::default());

    let mut record = MessageHistory::new();
    record.set_time_source(TimeSource::Fixed(42));
    record.add_source(1, 0xff).unwrap();
    record.add_source(2, 0xfff).unwrap();
    record.add_timing(1_000_000_000_000_000_000).unwrap();
    {
        let mut doc = channel.writing_document(false).unwrap();
        codec.write(&mut record, &mut doc).unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || {
        !state.flushes.lock().is_empty()
    }));
    let payloads = flushed_payloads(&state);
    assert_eq!(payloads.len(), 1);

    let mut input = WireBuffer::new();
    input.write_bytes(&payloads[0]);
    let mut decoded = MessageHistory::new();
    codec.read(&mut input, &mut decoded, None).unwrap();
    assert_eq!(decoded.sources(), 2);
    assert_eq!(decoded.timings(), 2); // stored timing + emitted timestamp
    assert!(decoded.source_ids_ends_with(&[1, 2]));
    drop(channel);
}

#[test]
fn lost_connection_kills_writer_and_producer_times_out() {
    init_tracing();
    let (transport, state) = RecordingTransport::new();
    state.down.store(true, Ordering::Release);
    let config = ChannelConfig {
        producer_ceiling_bytes: 64,
        acquire_timeout: Duration::from_millis(100),
        ..ChannelConfig::default()
    };
    let channel = BufferedChannel::new(transport, YieldingBackoff::new(), config).unwrap();

    // the channel is not closed by the writer's death, but nothing drains:
    // the producer eventually hits the backpressure ceiling
    {
        let mut doc = channel.writing_document(false).unwrap();
        doc.write_bytes(&[0u8; 128]);
    }
    let err = channel.acquire_writing_document(false).unwrap_err();
    assert!(matches!(err, ChannelError::UnrecoverableTimeout { .. }));
    assert!(state.flushes.lock().is_empty());
    drop(channel);
}

#[test]
fn close_is_idempotent_and_fails_fast_afterwards() {
    init_tracing();
    let (transport, _state) = RecordingTransport::new();
    let mut channel =
        BufferedChannel::new(transport, YieldingBackoff::new(), ChannelConfig::default()).unwrap();

    channel.close();
    channel.close();
    assert!(channel.is_closing());
    assert!(matches!(
        channel.writing_document(false),
        Err(ChannelError::Closed)
    ));
    assert!(matches!(
        channel.acquire_writing_document(false),
        Err(ChannelError::Closed)
    ));
}

#[test]
fn event_poller_runs_on_idle_cycles() {
    init_tracing();
    let (transport, _state) = RecordingTransport::new();
    let channel =
        BufferedChannel::new(transport, YieldingBackoff::new(), ChannelConfig::default()).unwrap();

    let polls = Arc::new(AtomicUsize::new(0));
    let counter = polls.clone();
    channel.set_event_poller(Box::new(move || {
        counter.fetch_add(1, Ordering::AcqRel);
        false
    }));

    assert!(wait_until(Duration::from_secs(5), || {
        polls.load(Ordering::Acquire) > 10
    }));
    assert!(channel.clear_event_poller().is_some());
    drop(channel);
}

#[test]
fn poller_is_dropped_when_the_writer_exits() {
    init_tracing();

    struct TrackedPoller(Arc<AtomicBool>);

    impl EventPoller for TrackedPoller {
        fn on_poll(&mut self) -> bool {
            false
        }
    }

    impl Drop for TrackedPoller {
        fn drop(&mut self) {
            self.0.store(true, Ordering::Release);
        }
    }

    let (transport, state) = RecordingTransport::new();
    let channel =
        BufferedChannel::new(transport, YieldingBackoff::new(), ChannelConfig::default()).unwrap();
    let dropped = Arc::new(AtomicBool::new(false));
    channel.set_event_poller(Box::new(TrackedPoller(dropped.clone())));

    state.down.store(true, Ordering::Release);
    assert!(wait_until(Duration::from_secs(5), || {
        dropped.load(Ordering::Acquire)
    }));
    drop(channel);
}
