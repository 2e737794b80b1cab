//! RLP (Recursive Length Prefix) encoding and decoding.
//!
//! RLP is the length-prefixed, type-tagged serialization used for trie
//! node contents and account records. Decoding is strict: malformed
//! bytes are an [`RlpError`], which callers must keep distinct from
//! "key not found".

use thiserror::Error;

use crate::codec::{u256_to_min_be, u64_to_min_be};
use primitive_types::U256;

/// RLP decoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RlpError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("expected a byte string, found a list")]
    ExpectedBytes,
    #[error("expected a list, found a byte string")]
    ExpectedList,
    #[error("integer field is too wide")]
    IntegerOverflow,
    #[error("integer field has leading zeros")]
    NonCanonicalInteger,
    #[error("length is not minimally encoded")]
    NonCanonicalLength,
    #[error("trailing bytes after item")]
    TrailingBytes,
    #[error("expected a 32-byte hash, found {0} bytes")]
    BadHashLength(usize),
}

/// RLP encoder for building RLP-encoded data.
#[derive(Clone, Debug, Default)]
pub struct RlpEncoder {
    buffer: Vec<u8>,
}

impl RlpEncoder {
    /// Creates a new empty encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Returns the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the encoder and returns the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Clears the encoder.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Encodes a byte slice as a string.
    pub fn encode_bytes(&mut self, bytes: &[u8]) {
        if bytes.len() == 1 && bytes[0] < 0x80 {
            self.buffer.push(bytes[0]);
        } else if bytes.len() < 56 {
            self.buffer.push(0x80 + bytes.len() as u8);
            self.buffer.extend_from_slice(bytes);
        } else {
            let len_bytes = encode_length(bytes.len());
            self.buffer.push(0xb7 + len_bytes.len() as u8);
            self.buffer.extend_from_slice(&len_bytes);
            self.buffer.extend_from_slice(bytes);
        }
    }

    /// Encodes an empty string.
    pub fn encode_empty(&mut self) {
        self.buffer.push(0x80);
    }

    /// Splices an already-encoded item into the stream verbatim.
    ///
    /// Used to embed small child nodes inline in their parent encoding.
    pub fn encode_raw(&mut self, raw: &[u8]) {
        self.buffer.extend_from_slice(raw);
    }

    /// Encodes a u64 as a minimal big-endian integer.
    pub fn encode_u64(&mut self, value: u64) {
        self.encode_bytes(&u64_to_min_be(value));
    }

    /// Encodes a U256 as a minimal big-endian integer.
    pub fn encode_u256(&mut self, value: U256) {
        self.encode_bytes(&u256_to_min_be(value));
    }

    /// Encodes a list of items.
    pub fn encode_list<F>(&mut self, encode_items: F)
    where
        F: FnOnce(&mut Self),
    {
        let start = self.start_list();
        encode_items(self);
        self.finish_list(start);
    }

    /// Starts encoding a list, returns the position to write length later.
    fn start_list(&mut self) -> usize {
        let pos = self.buffer.len();
        self.buffer.push(0); // placeholder header
        pos
    }

    /// Finishes encoding a list started at the given position.
    fn finish_list(&mut self, start_pos: usize) {
        let content_len = self.buffer.len() - start_pos - 1;

        if content_len < 56 {
            self.buffer[start_pos] = 0xc0 + content_len as u8;
        } else {
            let len_bytes = encode_length(content_len);
            let header_len = 1 + len_bytes.len();

            // Need to make room for the longer header
            let extra = header_len - 1;
            let old_len = self.buffer.len();
            self.buffer.resize(old_len + extra, 0);
            self.buffer
                .copy_within(start_pos + 1..old_len, start_pos + header_len);

            self.buffer[start_pos] = 0xf7 + len_bytes.len() as u8;
            self.buffer[start_pos + 1..start_pos + header_len].copy_from_slice(&len_bytes);
        }
    }

    /// Encodes compact nibbles (for leaf/extension nodes).
    ///
    /// HP (Hex-Prefix) encoding:
    /// - First nibble: flags (0=extension even, 1=extension odd, 2=leaf even, 3=leaf odd)
    /// - Remaining nibbles: path
    pub fn encode_nibbles(&mut self, nibbles: &[u8], is_leaf: bool) {
        let odd = nibbles.len() % 2 == 1;
        let prefix: u8 = match (is_leaf, odd) {
            (true, true) => 0x3,
            (true, false) => 0x2,
            (false, true) => 0x1,
            (false, false) => 0x0,
        };

        let mut encoded = Vec::with_capacity(nibbles.len() / 2 + 1);

        if odd {
            // Odd: combine prefix with first nibble
            encoded.push((prefix << 4) | nibbles[0]);
            for chunk in nibbles[1..].chunks(2) {
                encoded.push((chunk[0] << 4) | chunk.get(1).copied().unwrap_or(0));
            }
        } else {
            // Even: prefix byte then nibbles
            encoded.push(prefix << 4);
            for chunk in nibbles.chunks(2) {
                encoded.push((chunk[0] << 4) | chunk.get(1).copied().unwrap_or(0));
            }
        }

        self.encode_bytes(&encoded);
    }
}

/// Encodes a length as big-endian bytes without leading zeros.
fn encode_length(len: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut n = len;

    while n > 0 {
        bytes.push((n & 0xff) as u8);
        n >>= 8;
    }

    bytes.reverse();
    bytes
}

/// A decoded RLP item, borrowing from the input slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlpItem<'a> {
    /// A byte string.
    Bytes(&'a [u8]),
    /// A list; `raw` is the full encoding including the header, `payload`
    /// the concatenated item encodings inside it.
    List { raw: &'a [u8], payload: &'a [u8] },
}

/// Streaming RLP decoder over a borrowed slice.
#[derive(Debug, Clone)]
pub struct RlpDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RlpDecoder<'a> {
    /// Creates a decoder over the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns true once all input has been consumed.
    pub fn is_done(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Decodes the next item (byte string or list) from the stream.
    pub fn next_item(&mut self) -> Result<RlpItem<'a>, RlpError> {
        let (is_list, header_len, content_len) = self.peek_header()?;
        let start = self.pos;
        let content_start = start + header_len;
        let end = content_start + content_len;
        self.pos = end;

        if is_list {
            Ok(RlpItem::List {
                raw: &self.data[start..end],
                payload: &self.data[content_start..end],
            })
        } else {
            Ok(RlpItem::Bytes(&self.data[content_start..end]))
        }
    }

    /// Decodes the next item, requiring a byte string.
    pub fn next_bytes(&mut self) -> Result<&'a [u8], RlpError> {
        match self.next_item()? {
            RlpItem::Bytes(b) => Ok(b),
            RlpItem::List { .. } => Err(RlpError::ExpectedBytes),
        }
    }

    /// Decodes the next item, requiring a list, and returns a decoder
    /// over its payload.
    pub fn enter_list(&mut self) -> Result<RlpDecoder<'a>, RlpError> {
        match self.next_item()? {
            RlpItem::List { payload, .. } => Ok(RlpDecoder::new(payload)),
            RlpItem::Bytes(_) => Err(RlpError::ExpectedList),
        }
    }

    /// Decodes the next item as a canonical big-endian u64.
    pub fn next_u64(&mut self) -> Result<u64, RlpError> {
        let bytes = self.next_bytes()?;
        if bytes.first() == Some(&0) {
            return Err(RlpError::NonCanonicalInteger);
        }
        if bytes.len() > 8 {
            return Err(RlpError::IntegerOverflow);
        }
        let mut value = 0u64;
        for &b in bytes {
            value = (value << 8) | b as u64;
        }
        Ok(value)
    }

    /// Decodes the next item as a canonical big-endian U256.
    pub fn next_u256(&mut self) -> Result<U256, RlpError> {
        let bytes = self.next_bytes()?;
        if bytes.first() == Some(&0) {
            return Err(RlpError::NonCanonicalInteger);
        }
        if bytes.len() > 32 {
            return Err(RlpError::IntegerOverflow);
        }
        Ok(U256::from_big_endian(bytes))
    }

    /// Decodes the next item as a 32-byte hash.
    pub fn next_hash32(&mut self) -> Result<[u8; 32], RlpError> {
        let bytes = self.next_bytes()?;
        if bytes.len() != 32 {
            return Err(RlpError::BadHashLength(bytes.len()));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(bytes);
        Ok(hash)
    }

    /// Requires that all input has been consumed.
    pub fn finish(&self) -> Result<(), RlpError> {
        if self.is_done() {
            Ok(())
        } else {
            Err(RlpError::TrailingBytes)
        }
    }

    /// Reads the header of the item at the current position without
    /// consuming it: (is_list, header_len, content_len).
    fn peek_header(&self) -> Result<(bool, usize, usize), RlpError> {
        let Some(&prefix) = self.data.get(self.pos) else {
            return Err(RlpError::UnexpectedEof);
        };

        let (is_list, header_len, content_len) = match prefix {
            // Single byte, encodes itself
            0x00..=0x7f => (false, 0, 1),
            // Short string
            0x80..=0xb7 => (false, 1, (prefix - 0x80) as usize),
            // Long string
            0xb8..=0xbf => {
                let len_of_len = (prefix - 0xb7) as usize;
                let len = self.read_length(len_of_len)?;
                (false, 1 + len_of_len, len)
            }
            // Short list
            0xc0..=0xf7 => (true, 1, (prefix - 0xc0) as usize),
            // Long list
            0xf8..=0xff => {
                let len_of_len = (prefix - 0xf7) as usize;
                let len = self.read_length(len_of_len)?;
                (true, 1 + len_of_len, len)
            }
        };

        if self.pos + header_len + content_len > self.data.len() {
            return Err(RlpError::UnexpectedEof);
        }
        // A single byte below 0x80 encodes itself; wrapping it in a
        // string header is not canonical.
        if !is_list && header_len == 1 && content_len == 1 && self.data[self.pos + 1] < 0x80 {
            return Err(RlpError::NonCanonicalLength);
        }
        Ok((is_list, header_len, content_len))
    }

    fn read_length(&self, len_of_len: usize) -> Result<usize, RlpError> {
        let start = self.pos + 1;
        let end = start + len_of_len;
        if end > self.data.len() {
            return Err(RlpError::UnexpectedEof);
        }
        if self.data[start] == 0 {
            return Err(RlpError::NonCanonicalLength);
        }
        let mut len = 0usize;
        for &b in &self.data[start..end] {
            len = (len << 8) | b as usize;
        }
        // Lengths under 56 belong in the short header form.
        if len < 56 {
            return Err(RlpError::NonCanonicalLength);
        }
        Ok(len)
    }
}
