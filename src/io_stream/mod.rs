//! Container engine: writer and reader.
//!
//! # Writer
//! [`TcfWriter`] reserves a zero-filled header, then accepts entries one at
//! a time, streaming each through the byte transform straight into the
//! payload region.  `finalize()` appends the index and end marker, then
//! seeks back and overwrites the placeholder with the real header.  The
//! writer only needs `Write + Seek`, so a `File` and a `Cursor<Vec<u8>>`
//! behave identically.
//!
//! # Reader
//! [`TcfReader`] holds the whole container in memory.  Streaming decode of
//! containers larger than RAM is not supported.  Parsing is a validation
//! gate: magic, checksum and version are checked before any offset from the
//! header is used, and every index entry is bounds-checked against the
//! payload before the reader is handed out.
//!
//! # Endianness
//! All integers are little-endian; see `header.rs` and `index/mod.rs`.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Result, TcfError};
use crate::format::{DEFAULT_BUFFER_SIZE, END_MARKER, HEADER_SIZE};
use crate::header::Header;
use crate::index::{Entry, Index};
use crate::transform;

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct TcfWriter<W: Write + Seek> {
    writer:          W,
    pub index:       Index,
    pub buffer_size: usize,
    /// Path of the entry whose copy failed part-way.  Once set, the payload
    /// no longer matches the index and every further call is refused.
    poisoned:        Option<String>,
}

impl<W: Write + Seek> TcfWriter<W> {
    pub fn new(writer: W) -> Result<Self> {
        Self::with_buffer_size(writer, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(mut writer: W, buffer_size: usize) -> Result<Self> {
        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(&[0u8; HEADER_SIZE])?; // reserved; overwritten on finalize
        Ok(Self {
            writer,
            index:       Index::default(),
            buffer_size: buffer_size.max(1),
            poisoned:    None,
        })
    }

    /// Stream `size` bytes from `reader` into the payload as entry `path`.
    ///
    /// `size` is the length recorded in the index.  If the reader yields a
    /// different number of bytes the container would be inconsistent, so
    /// that is an error.  Any failure after bytes reach the payload poisons
    /// the writer; rejections raised before the copy leave it usable.
    pub fn add_entry<R: Read>(&mut self, path: String, size: u64, reader: R) -> Result<&Entry> {
        self.check_usable()?;
        if path.len() > u16::MAX as usize {
            return Err(TcfError::PathTooLong { len: path.len(), path });
        }
        let end = HEADER_SIZE as u64 + self.index.payload_len() + size;
        if end > u32::MAX as u64 {
            return Err(TcfError::TooLarge { what: format!("payload including {path}") });
        }

        let copied = match transform::transform_copy(reader.take(size + 1), &mut self.writer, self.buffer_size) {
            Ok(n) => n,
            Err(e) => {
                self.poisoned = Some(path);
                return Err(e.into());
            }
        };
        if copied != size {
            self.poisoned = Some(path.clone());
            return Err(TcfError::SizeChanged { path, expected: size, actual: copied });
        }

        // `end` fits in u32, so the entry's size does too.
        let entry = self.index.push_next(path, size as u32)?;
        log::debug!("packed {} at payload offset {} ({} B)", entry.path, entry.offset, entry.size);
        Ok(entry)
    }

    /// Add an in-memory entry.
    pub fn add_bytes(&mut self, path: String, data: &[u8]) -> Result<&Entry> {
        self.add_entry(path, data.len() as u64, data)
    }

    /// Write the index and end marker, then patch the header at offset 0.
    ///
    /// Returns the final header and the underlying writer, positioned at the
    /// end of the container.
    ///
    /// The index offset is taken from the stream position, which must agree
    /// with the entries recorded so far.
    pub fn finalize(mut self) -> Result<(Header, W)> {
        self.check_usable()?;
        let entry_count = u32::try_from(self.index.len())
            .map_err(|_| TcfError::TooLarge { what: "entry count".into() })?;

        let position = self.writer.stream_position()?;
        let expected = HEADER_SIZE as u64 + self.index.payload_len();
        if position != expected {
            return Err(TcfError::PayloadDesync { position, expected });
        }
        let payload_end = u32::try_from(position)
            .map_err(|_| TcfError::TooLarge { what: "payload".into() })?;

        self.index.write(&mut self.writer)?;
        self.writer.write_all(END_MARKER)?;

        let header = Header::new(payload_end, entry_count);
        self.writer.seek(SeekFrom::Start(0))?;
        header.write(&mut self.writer)?;
        self.writer.seek(SeekFrom::End(0))?;
        self.writer.flush()?;

        log::debug!("finalized container: {entry_count} entries, index at {payload_end}");
        Ok((header, self.writer))
    }

    fn check_usable(&self) -> Result<()> {
        match &self.poisoned {
            Some(path) => Err(TcfError::WriterPoisoned(path.clone())),
            None => Ok(()),
        }
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct TcfReader {
    data:       Vec<u8>,
    pub header: Header,
    pub index:  Index,
}

impl TcfReader {
    /// Read the container at `path` into memory and validate it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::parse(fs::read(path)?)
    }

    /// Validate and index an in-memory container.
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        let header = Header::parse(&data)?;
        Self::with_header(data, header)
    }

    /// Like [`TcfReader::parse`] but without the checksum and version gate.
    ///
    /// For diagnostics on damaged containers only.  Offsets are still
    /// bounds-checked, so this never panics, but the header fields it uses
    /// are untrusted.
    pub fn parse_unchecked(data: Vec<u8>) -> Result<Self> {
        let header = Header::parse_unchecked(&data)?;
        Self::with_header(data, header)
    }

    fn with_header(data: Vec<u8>, header: Header) -> Result<Self> {
        let payload_end = header.payload_end as usize;
        if payload_end < HEADER_SIZE || payload_end > data.len() {
            return Err(TcfError::BadPayloadEnd { payload_end: header.payload_end, len: data.len() });
        }

        let (index, used) = Index::parse(&data[payload_end..], header.entry_count, payload_end)?;

        let marker_at = payload_end + used;
        if data.get(marker_at..marker_at + END_MARKER.len()) != Some(&END_MARKER[..]) {
            return Err(TcfError::MissingEndMarker);
        }

        index.validate_layout(header.payload_len() as u64)?;
        Ok(Self { data, header, index })
    }

    /// The payload region, still transformed.
    pub fn payload(&self) -> &[u8] {
        &self.data[HEADER_SIZE..self.header.payload_end as usize]
    }

    /// Transformed bytes of `entry`.
    pub fn raw_entry(&self, entry: &Entry) -> &[u8] {
        let start = entry.offset as usize;
        &self.payload()[start..start + entry.size as usize]
    }

    /// Original bytes of `entry`.
    pub fn read_entry(&self, entry: &Entry) -> Vec<u8> {
        transform::inverse_slice(self.raw_entry(entry))
    }

    /// Inverse-transform the whole payload at once.
    ///
    /// Entry ranges from the index then slice straight into the result.
    pub fn decode_payload(&self) -> Vec<u8> {
        let mut out = self.payload().to_vec();
        #[cfg(feature = "parallel")]
        transform::inverse_in_place_parallel(&mut out);
        #[cfg(not(feature = "parallel"))]
        transform::inverse_in_place(&mut out);
        out
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}
