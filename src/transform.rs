//! Reversible per-byte rotation applied to payload content.
//!
//! Every byte is treated as an 8-bit circular register and rotated left by
//! [`SHIFT_BITS`] on write, right by the same amount on read.  There is no
//! key and no dependency between bytes.  This is obfuscation only: it does
//! not reduce size and offers no confidentiality or integrity.
//!
//! The scalar operations are precomputed into two 256-entry tables at
//! compile time, so slice transforms are a single table lookup per byte.

use std::io::{self, ErrorKind, Read, Write};

use crate::format::SHIFT_BITS;

const fn build_table(forward: bool) -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let b = i as u8;
        table[i] = if forward {
            b.rotate_left(SHIFT_BITS)
        } else {
            b.rotate_right(SHIFT_BITS)
        };
        i += 1;
    }
    table
}

static FORWARD: [u8; 256] = build_table(true);
static INVERSE: [u8; 256] = build_table(false);

// ── Scalar ───────────────────────────────────────────────────────────────────

#[inline]
pub fn transform(byte: u8) -> u8 {
    FORWARD[byte as usize]
}

#[inline]
pub fn inverse_transform(byte: u8) -> u8 {
    INVERSE[byte as usize]
}

// ── Slices ───────────────────────────────────────────────────────────────────

pub fn transform_in_place(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = FORWARD[*b as usize];
    }
}

pub fn inverse_in_place(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = INVERSE[*b as usize];
    }
}

/// Transformed copy of `data`; length and order are preserved.
pub fn transform_slice(data: &[u8]) -> Vec<u8> {
    data.iter().map(|&b| FORWARD[b as usize]).collect()
}

/// Inverse-transformed copy of `data`; length and order are preserved.
pub fn inverse_slice(data: &[u8]) -> Vec<u8> {
    data.iter().map(|&b| INVERSE[b as usize]).collect()
}

/// Inverse-transform `buf` in place across all cores.
///
/// Produces exactly the same bytes as [`inverse_in_place`]; only worth it
/// for multi-megabyte payloads.
#[cfg(feature = "parallel")]
pub fn inverse_in_place_parallel(buf: &mut [u8]) {
    use rayon::prelude::*;

    const SPLIT: usize = 1024 * 1024;
    buf.par_chunks_mut(SPLIT).for_each(inverse_in_place);
}

// ── Streaming ────────────────────────────────────────────────────────────────

/// Copy `reader` to `writer`, transforming every byte on the way through.
///
/// Reads in chunks of `buffer_size` bytes.  The chunk size only affects
/// syscall count; output is identical for any value.  Returns the number of
/// bytes copied.
pub fn transform_copy<R: Read, W: Write>(
    mut reader:  R,
    mut writer:  W,
    buffer_size: usize,
) -> io::Result<u64> {
    let mut buf   = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0)  => break,
            Ok(n)  => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        transform_in_place(&mut buf[..n]);
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}
