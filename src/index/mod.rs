//! The entry index, serialized between the payload and the end marker.
//!
//! Each entry is self-delimiting:
//!
//! ```text
//! [u16 path_len][path bytes, UTF-8][u32 offset][u32 size]
//! ```
//!
//! `offset` is relative to the start of the payload region.  Entries appear
//! in packing order, so offsets are the running sum of preceding sizes.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::io::Write;
use std::path::{Component, Path};

use crate::error::{Result, TcfError};
use crate::format::ENTRY_FIXED_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub path:   String,
    pub offset: u32,
    pub size:   u32,
}

impl Entry {
    /// Bytes this entry occupies in the serialized index.
    pub fn encoded_len(&self) -> usize {
        ENTRY_FIXED_LEN + self.path.len()
    }

    pub fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        let path = self.path.as_bytes();
        let len = u16::try_from(path.len()).map_err(|_| TcfError::PathTooLong {
            path: self.path.clone(),
            len:  path.len(),
        })?;
        writer.write_u16::<LittleEndian>(len)?;
        writer.write_all(path)?;
        writer.write_u32::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.size)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    pub entries: Vec<Entry>,
}

impl Index {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, i: usize) -> Result<&Entry> {
        self.entries.get(i).ok_or(TcfError::EntryOutOfRange {
            index: i,
            count: self.entries.len(),
        })
    }

    /// Append an entry laid out directly after the previous one.
    pub fn push_next(&mut self, path: String, size: u32) -> Result<&Entry> {
        let next = self.payload_len();
        let offset = u32::try_from(next).map_err(|_| TcfError::TooLarge {
            what: format!("payload offset of {path}"),
        })?;
        if offset as u64 + size as u64 > u32::MAX as u64 {
            return Err(TcfError::TooLarge { what: format!("payload end after {path}") });
        }
        self.entries.push(Entry { path, offset, size });
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Total payload bytes covered by the entries.
    pub fn payload_len(&self) -> u64 {
        self.entries.last().map_or(0, Entry::end)
    }

    pub fn encoded_len(&self) -> usize {
        self.entries.iter().map(Entry::encoded_len).sum()
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        for e in &self.entries {
            e.write(&mut writer)?;
        }
        Ok(())
    }

    /// Read exactly `count` entries from the start of `data`.
    ///
    /// `base` is the absolute offset of `data` within the container and is
    /// only used for error reporting.  Returns the index and the number of
    /// bytes consumed.
    pub fn parse(data: &[u8], count: u32, base: usize) -> Result<(Self, usize)> {
        let mut pos = 0usize;
        // Each entry needs at least ENTRY_FIXED_LEN bytes; don't let a hostile
        // count drive the allocation.
        let cap = (count as usize).min(data.len() / ENTRY_FIXED_LEN);
        let mut entries = Vec::with_capacity(cap);

        for i in 0..count as usize {
            let path_len = take(data, &mut pos, 2, base)?.read_u16::<LittleEndian>()? as usize;
            let path_bytes = take(data, &mut pos, path_len, base)?;
            let path = std::str::from_utf8(path_bytes)
                .map_err(|_| TcfError::InvalidUtf8(i))?
                .to_owned();
            let mut fixed = take(data, &mut pos, 8, base)?;
            let offset = fixed.read_u32::<LittleEndian>()?;
            let size = fixed.read_u32::<LittleEndian>()?;
            entries.push(Entry { path, offset, size });
        }
        Ok((Self { entries }, pos))
    }

    /// Check that every entry lies inside a payload of `payload_len` bytes
    /// and that entries are contiguous from offset 0 in index order.
    pub fn validate_layout(&self, payload_len: u64) -> Result<()> {
        let mut expected = 0u64;
        for (i, e) in self.entries.iter().enumerate() {
            if e.offset as u64 != expected {
                return Err(invalid(i, e, format!(
                    "offset {} but preceding entries end at {expected}", e.offset
                )));
            }
            if e.end() > payload_len {
                return Err(invalid(i, e, format!(
                    "range {}..{} exceeds payload length {payload_len}", e.offset, e.end()
                )));
            }
            expected = e.end();
        }
        Ok(())
    }

    /// Reject paths that would escape an extraction root.
    pub fn validate_paths(&self) -> Result<()> {
        for e in &self.entries {
            if !is_safe_relative(&e.path) {
                return Err(TcfError::UnsafePath(e.path.clone()));
            }
        }
        Ok(())
    }
}

/// Non-empty, `/`-separated, relative, and free of `..` components.
pub fn is_safe_relative(path: &str) -> bool {
    if path.is_empty() || path.contains('\\') || path.starts_with('/') {
        return false;
    }
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn take<'a>(data: &'a [u8], pos: &mut usize, n: usize, base: usize) -> Result<&'a [u8]> {
    let end = pos.checked_add(n).filter(|&end| end <= data.len()).ok_or(TcfError::Truncated {
        offset:    base + *pos,
        needed:    n,
        available: data.len() - *pos,
    })?;
    let out = &data[*pos..end];
    *pos = end;
    Ok(out)
}

fn invalid(index: usize, e: &Entry, reason: String) -> TcfError {
    TcfError::InvalidEntry { index, path: e.path.clone(), reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Index {
        let mut idx = Index::default();
        idx.push_next("b/c.txt".into(), 0).unwrap();
        idx.push_next("a.txt".into(), 3).unwrap();
        idx.push_next("dir/big.bin".into(), 1000).unwrap();
        idx
    }

    #[test]
    fn push_next_lays_entries_out_contiguously() {
        let idx = sample();
        let offsets: Vec<u32> = idx.entries.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![0, 0, 3]);
        assert_eq!(idx.payload_len(), 1003);
        idx.validate_layout(1003).unwrap();
    }

    #[test]
    fn serialized_form_is_self_delimiting() {
        let idx = sample();
        let mut buf = Vec::new();
        idx.write(&mut buf).unwrap();
        assert_eq!(buf.len(), idx.encoded_len());
        assert_eq!(&buf[..2], &[7, 0]);
        assert_eq!(&buf[2..9], b"b/c.txt");

        buf.extend_from_slice(b"EOF");
        let (parsed, used) = Index::parse(&buf, 3, 0).unwrap();
        assert_eq!(parsed, idx);
        assert_eq!(used, idx.encoded_len());
    }

    #[test]
    fn truncated_index_is_reported() {
        let idx = sample();
        let mut buf = Vec::new();
        idx.write(&mut buf).unwrap();
        buf.truncate(buf.len() - 1);
        assert!(matches!(Index::parse(&buf, 3, 0), Err(TcfError::Truncated { .. })));
    }

    #[test]
    fn huge_count_does_not_preallocate() {
        let err = Index::parse(&[], u32::MAX, 18).unwrap_err();
        assert!(matches!(err, TcfError::Truncated { offset: 18, .. }));
    }

    #[test]
    fn non_utf8_path_is_rejected() {
        let buf = [2, 0, 0xff, 0xfe, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(Index::parse(&buf, 1, 0), Err(TcfError::InvalidUtf8(0))));
    }

    #[test]
    fn layout_rejects_gaps_and_overruns() {
        let idx = sample();
        assert!(matches!(idx.validate_layout(1002), Err(TcfError::InvalidEntry { index: 2, .. })));

        let mut gap = idx.clone();
        gap.entries[1].offset = 1;
        assert!(matches!(gap.validate_layout(2000), Err(TcfError::InvalidEntry { index: 1, .. })));
    }

    #[test]
    fn out_of_range_lookup() {
        let idx = sample();
        assert_eq!(idx.get(1).unwrap().path, "a.txt");
        assert!(matches!(idx.get(3), Err(TcfError::EntryOutOfRange { index: 3, count: 3 })));
    }

    #[test]
    fn unsafe_paths() {
        for p in ["", "/etc/passwd", "../x", "a/../../x", "a\\b", "a/.."] {
            assert!(!is_safe_relative(p), "{p:?} should be unsafe");
        }
        for p in ["a", "a/b/c.txt", "./a", ".hidden", "a..b"] {
            assert!(is_safe_relative(p), "{p:?} should be safe");
        }
    }

    #[test]
    fn over_long_path_is_rejected_on_write() {
        let e = Entry { path: "x".repeat(70_000), offset: 0, size: 0 };
        assert!(matches!(e.write(Vec::new()), Err(TcfError::PathTooLong { len: 70_000, .. })));
    }
}
