//! Binary diffs between serialized summaries.
//!
//! A client holding a prior sub-summary reconstructs the current one from a
//! small patch. Both sides share most ref entries byte-for-byte, and the
//! sorted ref map keeps shared entries in the same relative order, so the
//! patch is mostly "reuse" directives over the old buffer.
//!
//! Frame layout, after zlib decompression:
//! `"FSUD"` | u32 op count | that many u32 op words | literal data.
//! Each op word carries the opcode in bits 28..31 and a byte length in bits
//! 0..27; lengths past 2^28-1 span several words of the same opcode.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::{Result, SummaryError};
use crate::variant::ref_entry_spans;

pub const DIFF_MAGIC: &[u8; 4] = b"FSUD";

const OP_REUSE: u8 = 0;
const OP_SKIP: u8 = 1;
const OP_DATA: u8 = 2;

/// Largest length one op word can carry.
const MAX_OP_LEN: usize = (1 << 28) - 1;

// ─── Generation ─────────────────────────────────────────────────────

/// Produce a compressed diff turning `old` into `new`.
pub fn generate(old: &[u8], new: &[u8]) -> Result<Vec<u8>> {
    let frame = build_frame(old, new);

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&frame)?;
    let compressed = encoder.finish()?;

    #[cfg(debug_assertions)]
    {
        // Round-trip self-check: a diff that does not reproduce `new`
        // exactly must never leave this function.
        let reapplied = apply(old, &compressed)?;
        debug_assert!(reapplied == new, "summary diff failed round-trip");
    }

    Ok(compressed)
}

/// The uncompressed frame. Exposed for size assertions in tests.
pub(crate) fn build_frame(old: &[u8], new: &[u8]) -> Vec<u8> {
    // Entry spans let the consume blocks line up per ref; buffers that are
    // not summaries (or have no refs) fall back to one whole-buffer block.
    let old_spans = ref_entry_spans(old).unwrap_or_default();
    let new_spans = ref_entry_spans(new).unwrap_or_default();

    let mut ops: Vec<u32> = Vec::new();
    let mut literal: Vec<u8> = Vec::new();
    let mut old_pos = 0usize;
    let mut new_pos = 0usize;

    let mut i = 0;
    let mut j = 0;
    while i < old_spans.len() && j < new_spans.len() {
        let o = &old_spans[i];
        let n = &new_spans[j];
        match o.name.as_bytes().cmp(n.name.as_bytes()) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                // Bridge the gap since the previous block: dropped old
                // entries, inserted new entries, and framing bytes.
                consume_block(
                    &mut ops,
                    &mut literal,
                    &old[old_pos..o.range.start],
                    &new[new_pos..n.range.start],
                );
                consume_block(
                    &mut ops,
                    &mut literal,
                    &old[o.range.clone()],
                    &new[n.range.clone()],
                );
                old_pos = o.range.end;
                new_pos = n.range.end;
                i += 1;
                j += 1;
            }
        }
    }
    consume_block(&mut ops, &mut literal, &old[old_pos..], &new[new_pos..]);

    let mut frame = Vec::with_capacity(8 + ops.len() * 4 + literal.len());
    frame.extend_from_slice(DIFF_MAGIC);
    frame.extend_from_slice(&(ops.len() as u32).to_le_bytes());
    for op in &ops {
        frame.extend_from_slice(&op.to_le_bytes());
    }
    frame.extend_from_slice(&literal);
    frame
}

/// Map one old byte range onto one new byte range: reuse the common prefix
/// and suffix, skip the stale middle, carry the fresh middle as literal.
fn consume_block(ops: &mut Vec<u32>, literal: &mut Vec<u8>, old: &[u8], new: &[u8]) {
    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    push_op(ops, OP_REUSE, prefix);
    push_op(ops, OP_SKIP, old.len() - prefix - suffix);
    let fresh = &new[prefix..new.len() - suffix];
    push_op(ops, OP_DATA, fresh.len());
    literal.extend_from_slice(fresh);
    push_op(ops, OP_REUSE, suffix);
}

fn push_op(ops: &mut Vec<u32>, opcode: u8, mut len: usize) {
    if len == 0 {
        return;
    }
    // Adjacent ops of one kind are equivalent to their sum; merging keeps
    // the identity diff at a single word.
    if let Some(last) = ops.last_mut() {
        if (*last >> 28) as u8 == opcode {
            let room = MAX_OP_LEN - (*last & MAX_OP_LEN as u32) as usize;
            let take = room.min(len);
            *last += take as u32;
            len -= take;
        }
    }
    while len > 0 {
        let take = len.min(MAX_OP_LEN);
        ops.push(((opcode as u32) << 28) | take as u32);
        len -= take;
    }
}

// ─── Application ────────────────────────────────────────────────────

/// Apply a compressed diff to `old`, reconstructing the new bytes.
pub fn apply(old: &[u8], diff: &[u8]) -> Result<Vec<u8>> {
    let bad = |reason: String| SummaryError::invalid("summary diff", reason);

    let mut frame = Vec::new();
    ZlibDecoder::new(diff)
        .read_to_end(&mut frame)
        .map_err(|e| bad(format!("decompression failed: {}", e)))?;

    if frame.len() < 8 {
        return Err(bad(format!("frame is {} bytes, header needs 8", frame.len())));
    }
    if &frame[..4] != DIFF_MAGIC {
        return Err(bad("bad magic".into()));
    }
    let op_count = u32::from_le_bytes(frame[4..8].try_into().unwrap()) as u64;
    let data_offset = 8 + 4 * op_count;
    if data_offset > frame.len() as u64 {
        return Err(bad(format!(
            "op count {} overflows {}-byte frame",
            op_count,
            frame.len()
        )));
    }
    let data_offset = data_offset as usize;

    let mut out = Vec::new();
    let mut old_pos = 0usize;
    let mut data_pos = data_offset;
    for word_idx in 0..op_count as usize {
        let base = 8 + word_idx * 4;
        let word = u32::from_le_bytes(frame[base..base + 4].try_into().unwrap());
        let opcode = (word >> 28) as u8;
        let len = (word & MAX_OP_LEN as u32) as usize;
        match opcode {
            OP_REUSE => {
                let end = old_pos
                    .checked_add(len)
                    .filter(|&e| e <= old.len())
                    .ok_or_else(|| bad(format!("reuse of {} bytes exceeds old buffer", len)))?;
                out.extend_from_slice(&old[old_pos..end]);
                old_pos = end;
            }
            OP_SKIP => {
                old_pos = old_pos
                    .checked_add(len)
                    .filter(|&e| e <= old.len())
                    .ok_or_else(|| bad(format!("skip of {} bytes exceeds old buffer", len)))?;
            }
            OP_DATA => {
                let end = data_pos
                    .checked_add(len)
                    .filter(|&e| e <= frame.len())
                    .ok_or_else(|| bad(format!("data op of {} bytes exceeds literals", len)))?;
                out.extend_from_slice(&frame[data_pos..end]);
                data_pos = end;
            }
            other => return Err(bad(format!("unknown opcode {}", other))),
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;
