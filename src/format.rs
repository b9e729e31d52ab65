//! Frozen format constants.
//!
//! Every value here is part of the on-disk contract.  Changing any of them
//! produces containers that older readers reject (magic, version) or
//! silently misdecode (shift).

/// Leading identifier of every container.
pub const MAGIC: &[u8; 3] = b"TCF";

/// Current format version, stored as u16 LE at byte 3.
pub const VERSION: u16 = 1;

/// Endianness flag at byte 5.  Reserved; only little-endian (0) is written.
pub const ENDIANNESS_LE: u8 = 0;

/// Rotation applied to every payload byte (left on write, right on read).
pub const SHIFT_BITS: u32 = 2;

/// Terminal sentinel written after the index.
pub const END_MARKER: &[u8; 3] = b"EOF";

/// Canonical file extension, without the dot.
pub const EXTENSION: &str = "tcf";

// ── Header geometry ──────────────────────────────────────────────────────────

/// Bytes covered by the header CRC32: magic, version, endianness,
/// payload-end offset, entry count.
pub const HEADER_CHECKED_LEN: usize = 3 + 2 + 1 + 4 + 4;

/// Fixed header size.  The payload region starts here.
pub const HEADER_SIZE: usize = HEADER_CHECKED_LEN + 4;

/// Fixed bytes per index entry, excluding the path itself.
pub const ENTRY_FIXED_LEN: usize = 2 + 4 + 4;

// ── I/O tuning (not part of the format) ──────────────────────────────────────

/// Default read/transform chunk size: 64 KiB.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Default number of entry bytes shown by `inspect`.
pub const DEFAULT_INSPECT_BYTES: usize = 100;
