//! # History Record Codec
//!
//! ## Purpose
//!
//! Serializes and deserializes a [`MessageHistory`] to and from a
//! [`WireBuffer`], switching between two physical representations:
//!
//! - **Compact binary**: a leading tag byte (`0x86`) followed by a fixed
//!   layout - `u8 source count | source ids | source indexes |
//!   u8 timing count | timings` - addressed as contiguous little-endian
//!   lanes. Chosen when the compact toggle is on and the sink has
//!   [`MAX_LENGTH`] bytes directly addressable.
//! - **Structural**: two named, length-prefixed sequences (`sources` as
//!   (id, index) pairs, `timings` as i64 values). The general form every
//!   format backend can parse.
//!
//! Both representations carry one freshly captured "emission" timestamp
//! appended after the record's own timings - the latency this hop
//! contributes, captured at write time without mutating the record. The one
//! exception is a fingerprint sink, where the structural form omits the
//! emission timestamp so content hashes stay time-independent; a
//! compact-mode write to a fingerprint sink falls back to structural for the
//! same reason.
//!
//! Decoding detects the tag byte and parses either via the direct
//! lane-oriented path (when the sink exposes a contiguous region of at least
//! [`MAX_LENGTH`] bytes) or via sequential reads. The two paths accept the
//! same bytes and produce identical records.

use zerocopy::byteorder::{LittleEndian, I64, U32, U64};
use zerocopy::Ref;

use types::{
    MessageHistory, HISTORY_EVENT_NAME, HISTORY_METHOD_ID, MAX_LENGTH, MAX_TIMINGS,
    MESSAGE_HISTORY_LENGTH,
};

use crate::config::CodecConfig;
use crate::error::{CodecError, CodecResult};
use crate::wire::WireBuffer;

type U32le = U32<LittleEndian>;
type U64le = U64<LittleEndian>;
type I64le = I64<LittleEndian>;

/// Tag byte introducing the compact binary representation inside a generic
/// value slot. Structural payloads start with a field-name length instead.
pub const COMPACT_HISTORY_TAG: u8 = 0x86;

/// Envelope tag for a named event preceding an embedded history record.
pub const EVENT_NAME_TAG: u8 = 0xB9;

/// Envelope tag for a numeric event id preceding an embedded history record.
pub const EVENT_ID_TAG: u8 = 0xBA;

const SOURCES_FIELD: &str = "sources";
const TIMINGS_FIELD: &str = "timings";

/// Pair width in the structural sources sequence: u32 id + u64 index.
const SOURCE_PAIR_BYTES: usize = 12;

/// The context a record is being read within, e.g. the inbound queue a
/// document arrived on. Supplies the hop appended when a record has
/// `add_source_details` set.
pub trait SourceContext {
    fn source_id(&self) -> u32;
    fn index(&self) -> u64;
}

/// History record codec configured by [`CodecConfig`].
#[derive(Debug, Clone, Default)]
pub struct HistoryCodec {
    config: CodecConfig,
}

impl HistoryCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(CodecConfig::from_env())
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Writes `record` to `out`, clearing the record's dirty flag.
    ///
    /// The compact path requires the wire timing count (record timings plus
    /// the emitted one) to fit its count byte; a fuller record falls back to
    /// the structural form, whose sequence lengths are 32-bit.
    pub fn write(&self, record: &mut MessageHistory, out: &mut WireBuffer) -> CodecResult<()> {
        let wire_timings = record.timings() + 1;
        if self.config.compact_binary
            && !out.is_fingerprint()
            && wire_timings <= u8::MAX as usize
            && out.can_write_direct(MAX_LENGTH)
        {
            out.write_u8(COMPACT_HISTORY_TAG);
            self.write_compact_direct(record, out)?;
        } else {
            self.write_structural(record, out);
        }
        record.mark_clean();
        Ok(())
    }

    /// Reads a record from `input`, replacing `record`'s contents. When the
    /// record has `add_source_details` set, the read appends the context's
    /// (source id, index) pair and a fresh timing mark afterwards.
    pub fn read(
        &self,
        input: &mut WireBuffer,
        record: &mut MessageHistory,
        ctx: Option<&dyn SourceContext>,
    ) -> CodecResult<()> {
        if input.peek_u8() == Some(COMPACT_HISTORY_TAG) {
            input.advance_read(1);
            if input.can_read_direct(MAX_LENGTH) {
                Self::read_compact_direct(input, record)?;
            } else {
                Self::read_compact_sequential(input, record)?;
            }
        } else {
            Self::read_structural(input, record)?;
        }
        if record.add_source_details() {
            if let Some(ctx) = ctx {
                record.add_source(ctx.source_id(), ctx.index())?;
            }
            record.add_timing_now()?;
        }
        Ok(())
    }

    /// Embeds `record` in a method-call stream: an event envelope (named
    /// `history`, or the reserved numeric event id when the
    /// method-identifier toggle is on) followed by the encoded record.
    pub fn write_history_document(
        &self,
        record: &mut MessageHistory,
        out: &mut WireBuffer,
    ) -> CodecResult<()> {
        if self.config.method_id_events {
            out.write_u8(EVENT_ID_TAG);
            out.write_u16(HISTORY_METHOD_ID);
        } else {
            out.write_u8(EVENT_NAME_TAG);
            out.write_u8(HISTORY_EVENT_NAME.len() as u8);
            out.write_bytes(HISTORY_EVENT_NAME.as_bytes());
        }
        self.write(record, out)
    }

    /// Reverses [`Self::write_history_document`], accepting either envelope
    /// form.
    pub fn read_history_document(
        &self,
        input: &mut WireBuffer,
        record: &mut MessageHistory,
        ctx: Option<&dyn SourceContext>,
    ) -> CodecResult<()> {
        let tag = input.read_u8("event envelope tag")?;
        match tag {
            EVENT_NAME_TAG => {
                let len = input.read_u8("event name length")? as usize;
                let name = input.read_bytes(len, "event name")?;
                if name != HISTORY_EVENT_NAME.as_bytes() {
                    return Err(CodecError::UnexpectedEvent {
                        expected: HISTORY_EVENT_NAME,
                        got: String::from_utf8_lossy(name).into_owned(),
                    });
                }
            }
            EVENT_ID_TAG => {
                let id = input.read_u16("event id")?;
                if id != HISTORY_METHOD_ID {
                    return Err(CodecError::UnexpectedEvent {
                        expected: HISTORY_EVENT_NAME,
                        got: format!("{id:#06x}"),
                    });
                }
            }
            other => return Err(CodecError::UnknownEnvelopeTag { tag: other }),
        }
        self.read(input, record, ctx)
    }

    // ---- compact path ---------------------------------------------------

    fn write_compact_direct(
        &self,
        record: &MessageHistory,
        out: &mut WireBuffer,
    ) -> CodecResult<()> {
        let sources = record.sources();
        let timings = record.timings();
        let total = 2 + sources * SOURCE_PAIR_BYTES + (timings + 1) * 8;

        let region = out.direct_write_region(total);
        region[0] = sources as u8;
        let (id_lane, rest) = region[1..].split_at_mut(sources * 4);
        let ids = lane_mut::<U32le>(id_lane)?;
        for n in 0..sources {
            ids[n] = U32le::new(record.source_id(n));
        }
        let (index_lane, rest) = rest.split_at_mut(sources * 8);
        let indexes = lane_mut::<U64le>(index_lane)?;
        for n in 0..sources {
            indexes[n] = U64le::new(record.source_index(n));
        }
        rest[0] = (timings + 1) as u8;
        let marks = lane_mut::<I64le>(&mut rest[1..])?;
        for n in 0..timings {
            marks[n] = I64le::new(record.timing(n));
        }
        // latency contributed by this hop, captured at write time
        marks[timings] = I64le::new(record.time_source().now_nanos());
        Ok(())
    }

    fn read_compact_direct(input: &mut WireBuffer, record: &mut MessageHistory) -> CodecResult<()> {
        let region = input.as_read_slice();
        let sources = region[0] as usize;
        if sources > MESSAGE_HISTORY_LENGTH {
            return Err(CodecError::SourceOverflow {
                count: sources,
                capacity: MESSAGE_HISTORY_LENGTH,
            });
        }
        let mut offset = 1;
        let ids = lane::<U32le>(&region[offset..offset + sources * 4])?;
        offset += sources * 4;
        let indexes = lane::<U64le>(&region[offset..offset + sources * 8])?;
        offset += sources * 8;
        let timings = region[offset] as usize;
        offset += 1;
        let marks = lane::<I64le>(&region[offset..offset + timings * 8])?;
        offset += timings * 8;

        record.reset();
        for n in 0..sources {
            record.add_source(ids[n].get(), indexes[n].get())?;
        }
        for n in 0..timings {
            record.add_timing(marks[n].get())?;
        }
        input.advance_read(offset);
        Ok(())
    }

    fn read_compact_sequential(
        input: &mut WireBuffer,
        record: &mut MessageHistory,
    ) -> CodecResult<()> {
        let sources = input.read_u8("history source count")? as usize;
        if sources > MESSAGE_HISTORY_LENGTH {
            return Err(CodecError::SourceOverflow {
                count: sources,
                capacity: MESSAGE_HISTORY_LENGTH,
            });
        }
        record.reset();
        let mut ids = [0u32; MESSAGE_HISTORY_LENGTH];
        for n in 0..sources {
            ids[n] = input.read_u32("history source id")?;
        }
        for &id in ids.iter().take(sources) {
            let index = input.read_u64("history source index")?;
            record.add_source(id, index)?;
        }
        let timings = input.read_u8("history timing count")? as usize;
        for _ in 0..timings {
            let mark = input.read_i64("history timing")?;
            record.add_timing(mark)?;
        }
        Ok(())
    }

    // ---- structural path ------------------------------------------------

    fn write_structural(&self, record: &MessageHistory, out: &mut WireBuffer) {
        write_field_name(out, SOURCES_FIELD);
        out.write_u32((record.sources() * SOURCE_PAIR_BYTES) as u32);
        for n in 0..record.sources() {
            out.write_u32(record.source_id(n));
            out.write_u64(record.source_index(n));
        }

        write_field_name(out, TIMINGS_FIELD);
        // a fingerprint sink gets no emission timestamp: hashes of the same
        // content must not vary with the wall clock
        let emit = !out.is_fingerprint();
        let count = record.timings() + usize::from(emit);
        out.write_u32((count * 8) as u32);
        for n in 0..record.timings() {
            out.write_i64(record.timing(n));
        }
        if emit {
            out.write_i64(record.time_source().now_nanos());
        }
    }

    fn read_structural(input: &mut WireBuffer, record: &mut MessageHistory) -> CodecResult<()> {
        record.reset();
        expect_field_name(input, SOURCES_FIELD)?;
        let byte_len = input.read_u32("sources sequence length")? as usize;
        if byte_len % SOURCE_PAIR_BYTES != 0 {
            return Err(CodecError::MalformedSequence {
                name: SOURCES_FIELD,
                byte_len,
            });
        }
        let sources = byte_len / SOURCE_PAIR_BYTES;
        if sources > MESSAGE_HISTORY_LENGTH {
            return Err(CodecError::SourceOverflow {
                count: sources,
                capacity: MESSAGE_HISTORY_LENGTH,
            });
        }
        for _ in 0..sources {
            let id = input.read_u32("source id")?;
            let index = input.read_u64("source index")?;
            record.add_source(id, index)?;
        }

        expect_field_name(input, TIMINGS_FIELD)?;
        let byte_len = input.read_u32("timings sequence length")? as usize;
        if byte_len % 8 != 0 {
            return Err(CodecError::MalformedSequence {
                name: TIMINGS_FIELD,
                byte_len,
            });
        }
        let timings = byte_len / 8;
        if timings > MAX_TIMINGS {
            return Err(CodecError::TimingOverflow {
                count: timings,
                capacity: MAX_TIMINGS,
            });
        }
        for _ in 0..timings {
            let mark = input.read_i64("timing")?;
            record.add_timing(mark)?;
        }
        Ok(())
    }
}

/// Appends all of `src`'s sources and timings onto `dst`.
///
/// The capacity check runs up front: when either lane would exceed its
/// ceiling nothing is appended and `CapacityExceeded` is returned.
pub fn copy(src: &MessageHistory, dst: &mut MessageHistory) -> CodecResult<()> {
    let sources = dst.sources() + src.sources();
    if sources > MESSAGE_HISTORY_LENGTH {
        return Err(types::HistoryError::source_capacity(MESSAGE_HISTORY_LENGTH, sources).into());
    }
    let timings = dst.timings() + src.timings();
    if timings > MAX_TIMINGS {
        return Err(types::HistoryError::timing_capacity(MAX_TIMINGS, timings).into());
    }
    for n in 0..src.sources() {
        dst.add_source(src.source_id(n), src.source_index(n))?;
    }
    for n in 0..src.timings() {
        dst.add_timing(src.timing(n))?;
    }
    Ok(())
}

fn write_field_name(out: &mut WireBuffer, name: &str) {
    out.write_u8(name.len() as u8);
    out.write_bytes(name.as_bytes());
}

fn expect_field_name(input: &mut WireBuffer, expected: &'static str) -> CodecResult<()> {
    let len = input.read_u8("field name length")? as usize;
    let name = input.read_bytes(len, "field name")?;
    if name != expected.as_bytes() {
        return Err(CodecError::unexpected_field(
            expected,
            String::from_utf8_lossy(name).into_owned(),
        ));
    }
    Ok(())
}

fn lane<'a, T: zerocopy::FromBytes>(bytes: &'a [u8]) -> CodecResult<&'a [T]> {
    Ref::<&[u8], [T]>::new_slice(bytes)
        .map(Ref::into_slice)
        .ok_or_else(|| CodecError::truncated(std::mem::size_of::<T>(), bytes.len(), "value lane"))
}

fn lane_mut<'a, T: zerocopy::FromBytes + zerocopy::AsBytes>(
    bytes: &'a mut [u8],
) -> CodecResult<&'a mut [T]> {
    let len = bytes.len();
    Ref::<&mut [u8], [T]>::new_slice(bytes)
        .map(Ref::into_mut_slice)
        .ok_or_else(|| CodecError::truncated(std::mem::size_of::<T>(), len, "value lane"))
}
