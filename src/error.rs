use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TcfError {
    // ── Invalid input ────────────────────────────────────────────────────────
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("No files found under {0}")]
    NoFiles(PathBuf),
    #[error("Path is {len} bytes, longer than the 65535-byte limit: {path}")]
    PathTooLong { path: String, len: usize },
    #[error("{what} exceeds the 4 GiB format limit")]
    TooLarge { what: String },
    #[error("{path} changed size during packing (expected {expected} B, read {actual} B)")]
    SizeChanged { path: String, expected: u64, actual: u64 },
    #[error("Writer is unusable after a failed write of {0}")]
    WriterPoisoned(String),
    #[error("Stream is at {position} but the index ends the payload at {expected}")]
    PayloadDesync { position: u64, expected: u64 },
    #[error("Cannot derive an archive path for {0}")]
    InvalidPath(PathBuf),

    // ── Format ───────────────────────────────────────────────────────────────
    #[error("Invalid magic number: not a TCF container")]
    InvalidMagic,
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u16),
    #[error("Payload-end offset {payload_end} lies outside the container ({len} B)")]
    BadPayloadEnd { payload_end: u32, len: usize },
    #[error("Container truncated: needed {needed} B at offset {offset}, {available} B available")]
    Truncated { offset: usize, needed: usize, available: usize },
    #[error("Index entry {0} has a non-UTF-8 path")]
    InvalidUtf8(usize),
    #[error("End marker missing after index")]
    MissingEndMarker,
    #[error("Index entry {index} ({path}) is inconsistent: {reason}")]
    InvalidEntry { index: usize, path: String, reason: String },
    #[error("Refusing to extract unsafe path: {0}")]
    UnsafePath(String),

    // ── Integrity ────────────────────────────────────────────────────────────
    #[error("Header checksum mismatch (stored {expected:08x}, computed {actual:08x})")]
    ChecksumMismatch { expected: u32, actual: u32 },

    // ── Range ────────────────────────────────────────────────────────────────
    #[error("Entry index {index} out of range ({count} entries)")]
    EntryOutOfRange { index: usize, count: usize },

    // ── OS ───────────────────────────────────────────────────────────────────
    #[error("Failed to extract {path} after {} completed entries: {source}", .completed.len())]
    Extract {
        path:      String,
        completed: Vec<String>,
        #[source]
        source:    io::Error,
    },
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, TcfError>;
