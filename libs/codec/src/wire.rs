//! # Wire Document Sink
//!
//! ## Purpose
//!
//! An elastic byte buffer with explicit read and write positions, the sink
//! every tracewire encoder writes into and every decoder reads from. Values
//! are little-endian. On top of the primitive reads and writes it provides
//! length-prefixed document framing: each document is a 4-byte header (30-bit
//! payload length, a metadata bit, and a not-complete bit held while the
//! document is open) followed by the payload bytes.
//!
//! The `can_write_direct`/`can_read_direct` predicates gate the compact
//! fixed-layout codec path: they hold when the requested span is addressable
//! as one contiguous region without reallocation, so lane-oriented encoding
//! can skip per-element position bookkeeping.

use crate::error::{CodecError, CodecResult};

/// Marks a document as metadata rather than data.
pub const DOCUMENT_METADATA_BIT: u32 = 0x4000_0000;

/// Set while a document is open; cleared when the frame length is finalized.
pub const DOCUMENT_NOT_COMPLETE_BIT: u32 = 0x8000_0000;

/// Low 30 bits of the header carry the payload length.
pub const DOCUMENT_LENGTH_MASK: u32 = 0x3FFF_FFFF;

/// Elastic byte sink with position/length semantics.
pub struct WireBuffer {
    data: Vec<u8>,
    read_pos: usize,
    fingerprint: bool,
}

impl WireBuffer {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            read_pos: 0,
            fingerprint: false,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            read_pos: 0,
            fingerprint: false,
        }
    }

    /// A sink whose bytes feed a content hash rather than a transport.
    /// Encoders with no meaningful physical timing semantics for such sinks
    /// (the history codec's emission timestamp) check this flag.
    pub fn for_fingerprint() -> Self {
        Self {
            data: Vec::new(),
            read_pos: 0,
            fingerprint: true,
        }
    }

    pub fn is_fingerprint(&self) -> bool {
        self.fingerprint
    }

    /// Unread bytes remaining.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Total bytes written, which is also the next write position.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Drops all content and rewinds both positions.
    pub fn clear(&mut self) {
        self.data.clear();
        self.read_pos = 0;
    }

    /// Discards everything written at or after `len`, e.g. to roll back an
    /// abandoned frame.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
        self.read_pos = self.read_pos.min(len);
    }

    pub fn as_read_slice(&self) -> &[u8] {
        &self.data[self.read_pos..]
    }

    // ---- capacity predicates -------------------------------------------

    /// True when `n` bytes can be appended into the contiguous spare region
    /// without reallocation.
    pub fn can_write_direct(&self, n: usize) -> bool {
        self.data.capacity() - self.data.len() >= n
    }

    /// True when `n` unread bytes are addressable as one contiguous region.
    pub fn can_read_direct(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    /// Extends the buffer by exactly `n` zeroed bytes and exposes them for a
    /// direct fixed-layout write. Callers check `can_write_direct` first.
    pub fn direct_write_region(&mut self, n: usize) -> &mut [u8] {
        let start = self.data.len();
        self.data.resize(start + n, 0);
        &mut self.data[start..]
    }

    /// Consumes `n` bytes previously inspected through `as_read_slice`.
    pub fn advance_read(&mut self, n: usize) {
        debug_assert!(n <= self.remaining());
        self.read_pos += n;
    }

    // ---- sequential writes ---------------------------------------------

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Back-patches a u32 written earlier, used to finalize frame headers.
    pub fn patch_u32(&mut self, pos: usize, value: u32) {
        self.data[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
    }

    // ---- sequential reads ----------------------------------------------

    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.read_pos).copied()
    }

    fn take(&mut self, n: usize, context: &'static str) -> CodecResult<&[u8]> {
        if self.remaining() < n {
            return Err(CodecError::truncated(n, self.remaining(), context));
        }
        let start = self.read_pos;
        self.read_pos += n;
        Ok(&self.data[start..start + n])
    }

    pub fn read_u8(&mut self, context: &'static str) -> CodecResult<u8> {
        Ok(self.take(1, context)?[0])
    }

    pub fn read_u16(&mut self, context: &'static str) -> CodecResult<u16> {
        let bytes = self.take(2, context)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self, context: &'static str) -> CodecResult<u32> {
        let bytes = self.take(4, context)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_u64(&mut self, context: &'static str) -> CodecResult<u64> {
        let bytes = self.take(8, context)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_i64(&mut self, context: &'static str) -> CodecResult<i64> {
        let bytes = self.take(8, context)?;
        Ok(i64::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> CodecResult<&[u8]> {
        self.take(n, context)
    }

    // ---- document framing ----------------------------------------------

    /// Opens a length-prefixed document and returns the header position for
    /// `end_document`. The header carries the not-complete bit until then.
    pub fn begin_document(&mut self, metadata: bool) -> usize {
        let header_pos = self.data.len();
        let mut header = DOCUMENT_NOT_COMPLETE_BIT;
        if metadata {
            header |= DOCUMENT_METADATA_BIT;
        }
        self.write_u32(header);
        header_pos
    }

    /// Finalizes the frame: writes the payload length and clears the
    /// not-complete bit, making the document visible to a consumer.
    pub fn end_document(&mut self, header_pos: usize) {
        let payload_len = (self.data.len() - header_pos - 4) as u32;
        let current = u32::from_le_bytes(self.data[header_pos..header_pos + 4].try_into().unwrap());
        let header = (current & DOCUMENT_METADATA_BIT) | (payload_len & DOCUMENT_LENGTH_MASK);
        self.patch_u32(header_pos, header);
    }

    pub fn peek_document_header(&self) -> Option<u32> {
        let bytes = self.data.get(self.read_pos..self.read_pos + 4)?;
        Some(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Well-formedness check for the document at the read position: present,
    /// non-empty, complete, and fully contained in the readable bytes.
    pub fn validate_document_header(&self) -> CodecResult<()> {
        let header = self
            .peek_document_header()
            .ok_or_else(|| CodecError::truncated(4, self.remaining(), "document header"))?;
        if header & DOCUMENT_NOT_COMPLETE_BIT != 0 {
            return Err(CodecError::malformed_header(header, "document not complete"));
        }
        let length = (header & DOCUMENT_LENGTH_MASK) as usize;
        if length == 0 {
            return Err(CodecError::malformed_header(header, "zero-length document"));
        }
        if length > self.remaining() - 4 {
            return Err(CodecError::malformed_header(
                header,
                "declared length exceeds readable bytes",
            ));
        }
        Ok(())
    }

    /// Reads the header of the document at the read position and exposes its
    /// payload, advancing past the whole frame.
    pub fn read_document(&mut self) -> CodecResult<(bool, &[u8])> {
        self.validate_document_header()?;
        let header = self.read_u32("document header")?;
        let metadata = header & DOCUMENT_METADATA_BIT != 0;
        let length = (header & DOCUMENT_LENGTH_MASK) as usize;
        let payload = self.take(length, "document payload")?;
        Ok((metadata, payload))
    }
}

impl Default for WireBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WireBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireBuffer")
            .field("len", &self.data.len())
            .field("read_pos", &self.read_pos)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}
