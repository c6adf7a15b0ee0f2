//! Parsing and structural validation of framed values.
//!
//! Every length is checked against the remaining buffer before allocation,
//! map keys must be strictly ascending and unique, and nesting is bounded by
//! [`MAX_DEPTH`]. A buffer either parses completely or the whole load fails.

use std::collections::BTreeMap;
use std::ops::Range;

use super::encode::{
    TAG_ARRAY, TAG_BOOL, TAG_BYTES, TAG_I32, TAG_MAP, TAG_STR, TAG_TUPLE, TAG_U32, TAG_U64,
};
use super::{MAX_DEPTH, Variant};
use crate::error::{Result, SummaryError};

pub(crate) fn decode(buf: &[u8]) -> Result<Variant> {
    let mut cur = Cursor { buf, pos: 0 };
    let value = cur.read_value(0)?;
    if cur.pos != buf.len() {
        return Err(invalid(format!(
            "{} trailing bytes after value",
            buf.len() - cur.pos
        )));
    }
    Ok(value)
}

fn invalid(reason: impl Into<String>) -> SummaryError {
    SummaryError::invalid("value", reason)
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_u8(&mut self) -> Result<u8> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| invalid("unexpected end of buffer"))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_exact(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(invalid(format!(
                "need {} bytes, {} remaining",
                n,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u32le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_exact(4)?.try_into().unwrap()))
    }

    /// Collection element count, sanity-bounded: every element occupies at
    /// least one byte, so a count larger than the remaining buffer is a
    /// corrupt frame, not a huge allocation.
    fn read_count(&mut self) -> Result<usize> {
        let count = self.read_u32le()? as usize;
        if count > self.remaining() {
            return Err(invalid(format!(
                "element count {} exceeds remaining {} bytes",
                count,
                self.remaining()
            )));
        }
        Ok(count)
    }

    fn read_cstr(&mut self) -> Result<&'a str> {
        let rest = &self.buf[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| invalid("unterminated string"))?;
        let s = std::str::from_utf8(&rest[..nul])
            .map_err(|e| invalid(format!("string is not UTF-8: {}", e)))?;
        self.pos += nul + 1;
        Ok(s)
    }

    fn read_value(&mut self, depth: u32) -> Result<Variant> {
        if depth > MAX_DEPTH {
            return Err(invalid("nesting too deep"));
        }
        let tag = self.read_u8()?;
        let value = match tag {
            TAG_BOOL => match self.read_u8()? {
                0 => Variant::Bool(false),
                1 => Variant::Bool(true),
                other => return Err(invalid(format!("bad bool byte {:#04x}", other))),
            },
            TAG_I32 => Variant::I32(i32::from_le_bytes(self.read_exact(4)?.try_into().unwrap())),
            TAG_U32 => Variant::U32(self.read_u32le()?),
            TAG_U64 => Variant::U64(u64::from_le_bytes(self.read_exact(8)?.try_into().unwrap())),
            TAG_STR => Variant::Str(self.read_cstr()?.to_string()),
            TAG_BYTES => {
                let len = self.read_count()?;
                Variant::Bytes(self.read_exact(len)?.to_vec())
            }
            TAG_ARRAY => {
                let count = self.read_count()?;
                let mut elems = Vec::with_capacity(count);
                for _ in 0..count {
                    elems.push(self.read_value(depth + 1)?);
                }
                Variant::Array(elems)
            }
            TAG_TUPLE => {
                let count = self.read_count()?;
                let mut elems = Vec::with_capacity(count);
                for _ in 0..count {
                    elems.push(self.read_value(depth + 1)?);
                }
                Variant::Tuple(elems)
            }
            TAG_MAP => {
                let count = self.read_count()?;
                let mut map = BTreeMap::new();
                let mut prev: Option<String> = None;
                for _ in 0..count {
                    let key = self.read_cstr()?.to_string();
                    if let Some(p) = &prev {
                        if key.as_bytes() <= p.as_bytes() {
                            return Err(invalid(format!(
                                "map keys not strictly ascending: '{}' after '{}'",
                                key, p
                            )));
                        }
                    }
                    let val = self.read_value(depth + 1)?;
                    prev = Some(key.clone());
                    map.insert(key, val);
                }
                Variant::Map(map)
            }
            other => return Err(invalid(format!("unknown type tag {:#04x}", other))),
        };
        Ok(value)
    }

    /// Advance past one value without materializing it.
    fn skip_value(&mut self, depth: u32) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(invalid("nesting too deep"));
        }
        let tag = self.read_u8()?;
        match tag {
            TAG_BOOL => {
                self.read_u8()?;
            }
            TAG_I32 | TAG_U32 => {
                self.read_exact(4)?;
            }
            TAG_U64 => {
                self.read_exact(8)?;
            }
            TAG_STR => {
                self.read_cstr()?;
            }
            TAG_BYTES => {
                let len = self.read_count()?;
                self.read_exact(len)?;
            }
            TAG_ARRAY | TAG_TUPLE => {
                let count = self.read_count()?;
                for _ in 0..count {
                    self.skip_value(depth + 1)?;
                }
            }
            TAG_MAP => {
                let count = self.read_count()?;
                for _ in 0..count {
                    self.read_cstr()?;
                    self.skip_value(depth + 1)?;
                }
            }
            other => return Err(invalid(format!("unknown type tag {:#04x}", other))),
        }
        Ok(())
    }
}

// ─── Ref-entry spans ────────────────────────────────────────────────

/// Byte range of one ref-map entry inside a serialized summary, from the
/// first byte of the key string to the last byte of the value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefSpan {
    pub name: String,
    pub range: Range<usize>,
}

/// Locate every ref-map entry of a serialized summary without decoding the
/// entry values. The diff engine maps old spans onto new spans to reuse
/// unchanged byte ranges.
///
/// Expects the summary layout `tuple(ref_map, metadata_map)`.
pub fn ref_entry_spans(buf: &[u8]) -> Result<Vec<RefSpan>> {
    let mut cur = Cursor { buf, pos: 0 };
    if cur.read_u8()? != TAG_TUPLE {
        return Err(invalid("summary is not a tuple"));
    }
    let arity = cur.read_count()?;
    if arity != 2 {
        return Err(invalid(format!("summary tuple has arity {}, expected 2", arity)));
    }
    if cur.read_u8()? != TAG_MAP {
        return Err(invalid("summary ref map missing"));
    }
    let count = cur.read_count()?;
    let mut spans = Vec::with_capacity(count);
    for _ in 0..count {
        let start = cur.pos;
        let name = cur.read_cstr()?.to_string();
        cur.skip_value(1)?;
        spans.push(RefSpan {
            name,
            range: start..cur.pos,
        });
    }
    Ok(spans)
}
