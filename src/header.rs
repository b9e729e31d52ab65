//! Fixed 18-byte container header.
//!
//! ```text
//! offset  size  field
//!      0     3  magic            "TCF"
//!      3     2  version          u16 LE
//!      5     1  endianness       0 = little-endian
//!      6     4  payload_end      u32 LE, absolute file offset of the index
//!     10     4  entry_count      u32 LE
//!     14     4  checksum         CRC32 over bytes 0..14
//! ```
//!
//! The payload region is `[HEADER_SIZE, payload_end)`.  `payload_end` is
//! therefore `HEADER_SIZE + total payload length`, never less than 18.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use std::io::{self, Write};

use crate::error::{Result, TcfError};
use crate::format::{ENDIANNESS_LE, HEADER_CHECKED_LEN, HEADER_SIZE, MAGIC, VERSION};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version:     u16,
    pub endianness:  u8,
    pub payload_end: u32,
    pub entry_count: u32,
    pub checksum:    u32,
}

impl Header {
    /// Header for a finished container; the checksum is computed here.
    pub fn new(payload_end: u32, entry_count: u32) -> Self {
        let mut h = Self {
            version:    VERSION,
            endianness: ENDIANNESS_LE,
            payload_end,
            entry_count,
            checksum:   0,
        };
        h.checksum = checksum(&h.checked_bytes());
        h
    }

    /// Length of the payload region this header describes.
    pub fn payload_len(&self) -> usize {
        (self.payload_end as usize).saturating_sub(HEADER_SIZE)
    }

    /// Serialized magic through entry count: the bytes the checksum covers.
    pub fn checked_bytes(&self) -> [u8; HEADER_CHECKED_LEN] {
        let mut out = [0u8; HEADER_CHECKED_LEN];
        out[..3].copy_from_slice(MAGIC);
        LittleEndian::write_u16(&mut out[3..5], self.version);
        out[5] = self.endianness;
        LittleEndian::write_u32(&mut out[6..10], self.payload_end);
        LittleEndian::write_u32(&mut out[10..14], self.entry_count);
        out
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..HEADER_CHECKED_LEN].copy_from_slice(&self.checked_bytes());
        LittleEndian::write_u32(&mut out[HEADER_CHECKED_LEN..], self.checksum);
        out
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.checked_bytes())?;
        writer.write_u32::<LittleEndian>(self.checksum)?;
        Ok(())
    }

    /// Parse the header fields without judging them.
    ///
    /// Only the magic and the length are checked; the checksum, version and
    /// offsets are returned as stored.  Use [`Header::parse`] for anything
    /// that will trust the result.
    pub fn parse_unchecked(data: &[u8]) -> Result<Self> {
        if data.len() < MAGIC.len() || &data[..MAGIC.len()] != MAGIC {
            return Err(TcfError::InvalidMagic);
        }
        if data.len() < HEADER_SIZE {
            return Err(TcfError::Truncated {
                offset:    0,
                needed:    HEADER_SIZE,
                available: data.len(),
            });
        }
        let mut cur = &data[MAGIC.len()..HEADER_SIZE];
        Ok(Self {
            version:     cur.read_u16::<LittleEndian>()?,
            endianness:  cur.read_u8()?,
            payload_end: cur.read_u32::<LittleEndian>()?,
            entry_count: cur.read_u32::<LittleEndian>()?,
            checksum:    cur.read_u32::<LittleEndian>()?,
        })
    }

    /// Parse and validate: magic, then CRC32, then version.
    ///
    /// The checksum is recomputed over the raw stored bytes, so nothing past
    /// the magic is interpreted until it matches.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = Self::parse_unchecked(data)?;
        let actual = checksum(&data[..HEADER_CHECKED_LEN]);
        if actual != header.checksum {
            return Err(TcfError::ChecksumMismatch { expected: header.checksum, actual });
        }
        if header.version != VERSION {
            return Err(TcfError::UnsupportedVersion(header.version));
        }
        Ok(header)
    }
}

/// CRC32 (IEEE, zlib-compatible).
pub fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}
