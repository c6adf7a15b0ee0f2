//! Deterministic serialization of [`Variant`] trees.
//!
//! Byte-for-byte reproducible: map keys iterate in their stored sorted
//! order, integers are fixed-width little-endian, and there is no padding.

use super::Variant;
use crate::error::{Result, SummaryError};

pub(crate) const TAG_BOOL: u8 = 0x01;
pub(crate) const TAG_I32: u8 = 0x02;
pub(crate) const TAG_U32: u8 = 0x03;
pub(crate) const TAG_U64: u8 = 0x04;
pub(crate) const TAG_STR: u8 = 0x05;
pub(crate) const TAG_BYTES: u8 = 0x06;
pub(crate) const TAG_ARRAY: u8 = 0x07;
pub(crate) const TAG_TUPLE: u8 = 0x08;
pub(crate) const TAG_MAP: u8 = 0x09;

pub(crate) fn encode(value: &Variant) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_value(value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Variant, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Variant::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*b));
        }
        Variant::I32(v) => {
            out.push(TAG_I32);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Variant::U32(v) => {
            out.push(TAG_U32);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Variant::U64(v) => {
            out.push(TAG_U64);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Variant::Str(s) => {
            out.push(TAG_STR);
            write_cstr(s, out)?;
        }
        Variant::Bytes(b) => {
            out.push(TAG_BYTES);
            write_len(b.len(), out)?;
            out.extend_from_slice(b);
        }
        Variant::Array(elems) => {
            out.push(TAG_ARRAY);
            write_len(elems.len(), out)?;
            for elem in elems {
                write_value(elem, out)?;
            }
        }
        Variant::Tuple(elems) => {
            out.push(TAG_TUPLE);
            write_len(elems.len(), out)?;
            for elem in elems {
                write_value(elem, out)?;
            }
        }
        Variant::Map(map) => {
            out.push(TAG_MAP);
            write_len(map.len(), out)?;
            // BTreeMap iteration is already byte-wise ascending.
            for (key, val) in map {
                write_cstr(key, out)?;
                write_value(val, out)?;
            }
        }
    }
    Ok(())
}

fn write_len(len: usize, out: &mut Vec<u8>) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| SummaryError::invalid("value", "collection too large to frame"))?;
    out.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

fn write_cstr(s: &str, out: &mut Vec<u8>) -> Result<()> {
    if s.as_bytes().contains(&0) {
        return Err(SummaryError::invalid("value", "string contains NUL"));
    }
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    Ok(())
}
