//! Full object-graph backend.
//!
//! A tagged, length-prefixed binary format that round-trips every
//! `Value` exactly, including the tuple-vs-list distinction and set
//! types the CBOR backend cannot express. Each item is one tag byte
//! followed by a fixed-width payload or a u32 big-endian length/count
//! and that many nested items.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Name of this backend, used in error messages.
pub const BACKEND: &str = "native";

const TAG_NULL: u8 = 0x00;
const TAG_FALSE: u8 = 0x01;
const TAG_TRUE: u8 = 0x02;
const TAG_INT: u8 = 0x03;
const TAG_FLOAT: u8 = 0x04;
const TAG_STR: u8 = 0x05;
const TAG_BYTES: u8 = 0x06;
const TAG_LIST: u8 = 0x07;
const TAG_TUPLE: u8 = 0x08;
const TAG_SET: u8 = 0x09;
const TAG_MAP: u8 = 0x0a;

/// Encodes a value to native-format bytes.
pub fn pack(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = GraphEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// Decodes a value from native-format bytes.
///
/// The input must contain exactly one encoded value; trailing bytes are
/// an error.
pub fn unpack(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = GraphDecoder::new(bytes);
    let value = decoder.decode()?;
    decoder.expect_end()?;
    Ok(value)
}

/// Encoder for the native object-graph format.
pub struct GraphEncoder {
    buffer: Vec<u8>,
}

impl GraphEncoder {
    /// Creates a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Encodes one value into the buffer.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.buffer.push(TAG_NULL),
            Value::Bool(false) => self.buffer.push(TAG_FALSE),
            Value::Bool(true) => self.buffer.push(TAG_TRUE),
            Value::Int(n) => {
                self.buffer.push(TAG_INT);
                self.buffer.extend_from_slice(&n.to_be_bytes());
            }
            Value::Float(f) => {
                self.buffer.push(TAG_FLOAT);
                self.buffer.extend_from_slice(&f.to_bits().to_be_bytes());
            }
            Value::Str(s) => {
                self.buffer.push(TAG_STR);
                self.encode_len(s.len())?;
                self.buffer.extend_from_slice(s.as_bytes());
            }
            Value::Bytes(b) => {
                self.buffer.push(TAG_BYTES);
                self.encode_len(b.len())?;
                self.buffer.extend_from_slice(b);
            }
            Value::List(items) => self.encode_sequence(TAG_LIST, items)?,
            Value::Tuple(items) => self.encode_sequence(TAG_TUPLE, items)?,
            Value::Set(items) => {
                self.buffer.push(TAG_SET);
                self.encode_len(items.len())?;
                for item in items {
                    self.encode(item)?;
                }
            }
            Value::Map(pairs) => {
                self.buffer.push(TAG_MAP);
                self.encode_len(pairs.len())?;
                for (key, val) in pairs {
                    self.encode(key)?;
                    self.encode(val)?;
                }
            }
        }
        Ok(())
    }

    /// Consumes this encoder and returns the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn encode_sequence(&mut self, tag: u8, items: &[Value]) -> CodecResult<()> {
        self.buffer.push(tag);
        self.encode_len(items.len())?;
        for item in items {
            self.encode(item)?;
        }
        Ok(())
    }

    fn encode_len(&mut self, len: usize) -> CodecResult<()> {
        let len = u32::try_from(len)
            .map_err(|_| CodecError::encoding_failed("length exceeds u32 range"))?;
        self.buffer.extend_from_slice(&len.to_be_bytes());
        Ok(())
    }
}

impl Default for GraphEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoder for the native object-graph format.
pub struct GraphDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> GraphDecoder<'a> {
    /// Creates a decoder over the given bytes.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Decodes one value.
    pub fn decode(&mut self) -> CodecResult<Value> {
        let tag = self.read_u8()?;
        Ok(match tag {
            TAG_NULL => Value::Null,
            TAG_FALSE => Value::Bool(false),
            TAG_TRUE => Value::Bool(true),
            TAG_INT => Value::Int(i64::from_be_bytes(self.read_array()?)),
            TAG_FLOAT => Value::Float(f64::from_bits(u64::from_be_bytes(self.read_array()?))),
            TAG_STR => {
                let len = self.read_len()?;
                let bytes = self.read_slice(len)?;
                Value::Str(
                    std::str::from_utf8(bytes)
                        .map_err(|_| CodecError::InvalidUtf8)?
                        .to_string(),
                )
            }
            TAG_BYTES => {
                let len = self.read_len()?;
                Value::Bytes(self.read_slice(len)?.to_vec())
            }
            TAG_LIST => Value::List(self.decode_items()?),
            TAG_TUPLE => Value::Tuple(self.decode_items()?),
            TAG_SET => {
                let count = self.read_len()?;
                let mut items = BTreeSet::new();
                for _ in 0..count {
                    items.insert(self.decode()?);
                }
                Value::Set(items)
            }
            TAG_MAP => {
                let count = self.read_len()?;
                let mut pairs = BTreeMap::new();
                for _ in 0..count {
                    let key = self.decode()?;
                    let val = self.decode()?;
                    pairs.insert(key, val);
                }
                Value::Map(pairs)
            }
            tag => return Err(CodecError::UnknownTag { tag }),
        })
    }

    /// Fails unless the entire input has been consumed.
    pub fn expect_end(&self) -> CodecResult<()> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes)
        }
    }

    fn decode_items(&mut self) -> CodecResult<Vec<Value>> {
        let count = self.read_len()?;
        // Cap preallocation: count is attacker-controlled before items parse.
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(self.decode()?);
        }
        Ok(items)
    }

    fn read_u8(&mut self) -> CodecResult<u8> {
        let byte = *self.bytes.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_len(&mut self) -> CodecResult<usize> {
        Ok(u32::from_be_bytes(self.read_array()?) as usize)
    }

    fn read_slice(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or(CodecError::UnexpectedEof)?;
        if end > self.bytes.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let slice = self.read_slice(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(slice);
        Ok(array)
    }
}
