//! MessagePack wire codec for [`FieldValue`]
//!
//! Encoding goes through `rmp-serde`. Decoding is a strict reader: values
//! coming back from an untrusted guest must be rejected when they are
//! truncated, carry trailing bytes, hold invalid UTF-8 in a `str`, or nest
//! deeper than [`MAX_DEPTH`].

use crate::FieldValue;
use rmp::decode::{Bytes, RmpRead};
use rmp::Marker;
use std::collections::BTreeMap;
use std::mem;
use thiserror::Error;

/// Maximum nesting of sequences and mappings accepted by [`decode`]
pub const MAX_DEPTH: usize = 128;

/// Errors produced by the value codec
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Encoding failed: {0}")]
    Encode(#[source] rmp_serde::encode::Error),

    #[error("Unexpected end of input at offset {offset}: {needed} more bytes needed")]
    Truncated { offset: usize, needed: usize },

    #[error("Invalid marker 0x{byte:02x} at offset {offset}")]
    InvalidMarker { byte: u8, offset: usize },

    #[error("Unsupported msgpack type '{kind}' at offset {offset}")]
    Unsupported { kind: &'static str, offset: usize },

    #[error("Invalid UTF-8 in string at offset {offset}: {source}")]
    InvalidUtf8 {
        offset: usize,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("Integer {0} does not fit in i64")]
    IntegerOverflow(u64),

    #[error("Mapping key at offset {offset} is not a string")]
    NonStringKey { offset: usize },

    #[error("Duplicate mapping key '{0}'")]
    DuplicateKey(String),

    #[error("Nesting exceeds {0} levels")]
    DepthExceeded(usize),

    #[error("Trailing bytes: consumed {consumed} of {total}")]
    TrailingBytes { consumed: usize, total: usize },
}

/// Encode a value into its MessagePack wire form.
///
/// The output is deterministic: mappings are emitted in key order.
pub fn encode(value: &FieldValue) -> Result<Vec<u8>, CodecError> {
    rmp_serde::to_vec(value).map_err(CodecError::Encode)
}

/// Decode exactly one value occupying all of `bytes`.
pub fn decode(bytes: &[u8]) -> Result<FieldValue, CodecError> {
    let mut reader = Reader::new(bytes);
    let value = reader.value(0)?;
    if reader.remaining() != 0 {
        return Err(CodecError::TrailingBytes {
            consumed: reader.pos(),
            total: bytes.len(),
        });
    }
    Ok(value)
}

/// Offset bookkeeping over [`rmp::decode::Bytes`]
struct Reader<'a> {
    bytes: Bytes<'a>,
    total: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            bytes: Bytes::new(buf),
            total: buf.len(),
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.remaining_slice().len()
    }

    fn pos(&self) -> usize {
        self.total - self.remaining()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let rest = self.bytes.remaining_slice();
        if n > rest.len() {
            return Err(CodecError::Truncated {
                offset: self.pos(),
                needed: n - rest.len(),
            });
        }
        let (head, tail) = rest.split_at(n);
        self.bytes = Bytes::new(tail);
        Ok(head)
    }

    /// Read one fixed-width big-endian field
    fn data<T, E>(
        &mut self,
        read: impl FnOnce(&mut Bytes<'a>) -> Result<T, E>,
    ) -> Result<T, CodecError> {
        let offset = self.pos();
        read(&mut self.bytes).map_err(|_| CodecError::Truncated {
            offset,
            needed: mem::size_of::<T>().saturating_sub(self.remaining()),
        })
    }

    fn len8(&mut self) -> Result<usize, CodecError> {
        Ok(self.data(|b| b.read_data_u8())?.into())
    }

    fn len16(&mut self) -> Result<usize, CodecError> {
        Ok(self.data(|b| b.read_data_u16())?.into())
    }

    fn len32(&mut self) -> Result<usize, CodecError> {
        Ok(self.data(|b| b.read_data_u32())? as usize)
    }

    fn value(&mut self, depth: usize) -> Result<FieldValue, CodecError> {
        if depth > MAX_DEPTH {
            return Err(CodecError::DepthExceeded(MAX_DEPTH));
        }

        let offset = self.pos();
        let byte = self.data(|b| b.read_data_u8())?;
        let value = match Marker::from_u8(byte) {
            Marker::Null => FieldValue::Null,
            Marker::True => FieldValue::Bool(true),
            Marker::False => FieldValue::Bool(false),

            Marker::FixPos(n) => FieldValue::Integer(n.into()),
            Marker::FixNeg(n) => FieldValue::Integer(n.into()),
            Marker::U8 => FieldValue::Integer(self.data(|b| b.read_data_u8())?.into()),
            Marker::U16 => FieldValue::Integer(self.data(|b| b.read_data_u16())?.into()),
            Marker::U32 => FieldValue::Integer(self.data(|b| b.read_data_u32())?.into()),
            Marker::U64 => {
                let raw = self.data(|b| b.read_data_u64())?;
                let v = i64::try_from(raw).map_err(|_| CodecError::IntegerOverflow(raw))?;
                FieldValue::Integer(v)
            }
            Marker::I8 => FieldValue::Integer(self.data(|b| b.read_data_i8())?.into()),
            Marker::I16 => FieldValue::Integer(self.data(|b| b.read_data_i16())?.into()),
            Marker::I32 => FieldValue::Integer(self.data(|b| b.read_data_i32())?.into()),
            Marker::I64 => FieldValue::Integer(self.data(|b| b.read_data_i64())?),

            Marker::F32 => FieldValue::Float(self.data(|b| b.read_data_f32())?.into()),
            Marker::F64 => FieldValue::Float(self.data(|b| b.read_data_f64())?),

            Marker::FixStr(len) => self.string(len.into())?,
            Marker::Str8 => {
                let len = self.len8()?;
                self.string(len)?
            }
            Marker::Str16 => {
                let len = self.len16()?;
                self.string(len)?
            }
            Marker::Str32 => {
                let len = self.len32()?;
                self.string(len)?
            }

            Marker::Bin8 => {
                let len = self.len8()?;
                FieldValue::Bytes(self.take(len)?.to_vec())
            }
            Marker::Bin16 => {
                let len = self.len16()?;
                FieldValue::Bytes(self.take(len)?.to_vec())
            }
            Marker::Bin32 => {
                let len = self.len32()?;
                FieldValue::Bytes(self.take(len)?.to_vec())
            }

            Marker::FixArray(len) => self.sequence(len.into(), depth)?,
            Marker::Array16 => {
                let len = self.len16()?;
                self.sequence(len, depth)?
            }
            Marker::Array32 => {
                let len = self.len32()?;
                self.sequence(len, depth)?
            }

            Marker::FixMap(len) => self.mapping(len.into(), depth)?,
            Marker::Map16 => {
                let len = self.len16()?;
                self.mapping(len, depth)?
            }
            Marker::Map32 => {
                let len = self.len32()?;
                self.mapping(len, depth)?
            }

            Marker::FixExt1
            | Marker::FixExt2
            | Marker::FixExt4
            | Marker::FixExt8
            | Marker::FixExt16
            | Marker::Ext8
            | Marker::Ext16
            | Marker::Ext32 => {
                return Err(CodecError::Unsupported {
                    kind: "ext",
                    offset,
                })
            }
            Marker::Reserved => return Err(CodecError::InvalidMarker { byte, offset }),
        };
        Ok(value)
    }

    fn string(&mut self, len: usize) -> Result<FieldValue, CodecError> {
        let offset = self.pos();
        let raw = self.take(len)?;
        let s = std::str::from_utf8(raw)
            .map_err(|source| CodecError::InvalidUtf8 { offset, source })?;
        Ok(FieldValue::String(s.to_owned()))
    }

    fn sequence(&mut self, len: usize, depth: usize) -> Result<FieldValue, CodecError> {
        // Every element takes at least one byte; never trust the header for capacity.
        let mut items = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            items.push(self.value(depth + 1)?);
        }
        Ok(FieldValue::Sequence(items))
    }

    fn mapping(&mut self, len: usize, depth: usize) -> Result<FieldValue, CodecError> {
        let mut entries = BTreeMap::new();
        for _ in 0..len {
            let offset = self.pos();
            let key = match self.value(depth + 1)? {
                FieldValue::String(key) => key,
                _ => return Err(CodecError::NonStringKey { offset }),
            };
            let value = self.value(depth + 1)?;
            if entries.contains_key(&key) {
                return Err(CodecError::DuplicateKey(key));
            }
            entries.insert(key, value);
        }
        Ok(FieldValue::Mapping(entries))
    }
}
