//! High-level operations: the primary embedding surface.
//!
//! ```no_run
//! use std::path::Path;
//!
//! let summary = tcf::archive::pack(Path::new("assets"), Path::new("out/assets"))?;
//! assert!(summary.output.ends_with("assets.tcf"));
//!
//! let n = tcf::archive::unpack(&summary.output, Path::new("restored"))?;
//! assert_eq!(n, summary.file_count);
//! # Ok::<(), tcf::TcfError>(())
//! ```

use serde::Serialize;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::{Result, TcfError};
use crate::format::{DEFAULT_BUFFER_SIZE, EXTENSION, HEADER_SIZE};
use crate::io_stream::{TcfReader, TcfWriter};
use crate::source::{self, SourceFile};

// ── PackOptions ───────────────────────────────────────────────────────────────

/// Configuration for [`pack_with_options`].
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Read/transform chunk size.  Does not affect the output bytes.
    pub buffer_size: usize,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self { buffer_size: DEFAULT_BUFFER_SIZE }
    }
}

// ── Result types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PackSummary {
    pub output:         PathBuf,
    pub file_count:     usize,
    pub original_size:  u64,
    pub container_size: u64,
}

/// Lightweight descriptor returned by [`list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    pub path:   String,
    pub offset: u32,
    pub size:   u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub path:              String,
    /// Full size of the entry.
    pub size:              u32,
    /// Bytes included in the hex dumps.
    pub shown:             usize,
    pub raw_hex:           String,
    pub detransformed_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub version:        u16,
    pub entry_count:    u32,
    pub payload_len:    usize,
    pub container_size: usize,
}

// ── Pack ──────────────────────────────────────────────────────────────────────

/// Append `.tcf` unless `path` already ends with it (case-insensitive).
///
/// The extension is appended to the whole name, so `out.bin` becomes
/// `out.bin.tcf` rather than having its extension replaced.
pub fn normalize_output_path(path: &Path) -> PathBuf {
    let has_ext = path
        .extension()
        .map_or(false, |e| e.to_string_lossy().eq_ignore_ascii_case(EXTENSION));
    if has_ext {
        return path.to_path_buf();
    }
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(EXTENSION);
    PathBuf::from(name)
}

pub fn pack(source_dir: &Path, output: &Path) -> Result<PackSummary> {
    pack_with_options(source_dir, output, &PackOptions::default())
}

/// Pack every regular file under `source_dir` into one container.
///
/// Files are laid out in ascending size order.  Invalid input (missing
/// directory, no files, paths or sizes beyond the format limits) is
/// detected before the output file is created.
pub fn pack_with_options(source_dir: &Path, output: &Path, opts: &PackOptions) -> Result<PackSummary> {
    let mut files = source::collect(source_dir)?;
    if files.is_empty() {
        return Err(TcfError::NoFiles(source_dir.to_path_buf()));
    }
    source::sort_for_packing(&mut files);
    check_limits(&files)?;

    let output = normalize_output_path(output);
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    log::info!("packing {} file(s) from {} into {}", files.len(), source_dir.display(), output.display());
    if let Err(e) = write_container(&files, &output, opts) {
        if let Err(rm) = fs::remove_file(&output) {
            log::warn!("could not remove partial container {}: {rm}", output.display());
        }
        return Err(e);
    }

    Ok(PackSummary {
        file_count:     files.len(),
        original_size:  source::total_size(&files),
        container_size: source::file_len(&output)?,
        output,
    })
}

fn check_limits(files: &[SourceFile]) -> Result<()> {
    if u32::try_from(files.len()).is_err() {
        return Err(TcfError::TooLarge { what: "entry count".into() });
    }
    for f in files {
        if f.rel_path.len() > u16::MAX as usize {
            return Err(TcfError::PathTooLong { path: f.rel_path.clone(), len: f.rel_path.len() });
        }
    }
    if HEADER_SIZE as u64 + source::total_size(files) > u32::MAX as u64 {
        return Err(TcfError::TooLarge { what: "total payload".into() });
    }
    Ok(())
}

fn write_container(files: &[SourceFile], output: &Path, opts: &PackOptions) -> Result<()> {
    let out = BufWriter::with_capacity(opts.buffer_size.max(1), File::create(output)?);
    let mut writer = TcfWriter::with_buffer_size(out, opts.buffer_size)?;
    for f in files {
        let input = File::open(&f.disk_path)?;
        writer.add_entry(f.rel_path.clone(), f.size, input)?;
    }
    let (header, out) = writer.finalize()?;
    out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    log::debug!("header written: payload_end={} crc={:08x}", header.payload_end, header.checksum);
    Ok(())
}

// ── Unpack ────────────────────────────────────────────────────────────────────

/// Recreate every entry of `container` under `output_dir`.
///
/// The container is fully validated first: header checksum, index bounds,
/// end marker and path safety.  Nothing is written unless all of it passes.
/// If a write fails part-way, the error lists the entries already written.
pub fn unpack(container: &Path, output_dir: &Path) -> Result<usize> {
    let reader = TcfReader::open(container)?;
    reader.index.validate_paths()?;

    let payload = reader.decode_payload();
    fs::create_dir_all(output_dir)?;

    let mut completed = Vec::with_capacity(reader.index.len());
    for e in &reader.index.entries {
        let start = e.offset as usize;
        let data = &payload[start..start + e.size as usize];
        if let Err(source) = write_entry(output_dir, &e.path, data) {
            return Err(TcfError::Extract { path: e.path.clone(), completed, source });
        }
        log::debug!("extracted {} ({} B)", e.path, e.size);
        completed.push(e.path.clone());
    }

    log::info!("extracted {} file(s) from {} into {}", completed.len(), container.display(), output_dir.display());
    Ok(completed.len())
}

fn write_entry(root: &Path, rel: &str, data: &[u8]) -> std::io::Result<()> {
    let dest = rel.split('/').fold(root.to_path_buf(), |p, part| p.join(part));
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, data)
}

// ── Read-only views ───────────────────────────────────────────────────────────

/// Hex dump the first `byte_count` bytes of entry `entry_index`, both as
/// stored and after the inverse transform.
///
/// Goes through the same checksum gate as [`unpack`].
pub fn inspect(container: &Path, entry_index: usize, byte_count: usize) -> Result<Inspection> {
    inspect_reader(&TcfReader::open(container)?, entry_index, byte_count)
}

/// [`inspect`] without the checksum and version gate, for examining damaged
/// containers.  Offsets are still bounds-checked.
pub fn inspect_unchecked(container: &Path, entry_index: usize, byte_count: usize) -> Result<Inspection> {
    let reader = TcfReader::parse_unchecked(fs::read(container)?)?;
    inspect_reader(&reader, entry_index, byte_count)
}

fn inspect_reader(reader: &TcfReader, entry_index: usize, byte_count: usize) -> Result<Inspection> {
    let entry = reader.index.get(entry_index)?;
    let raw = reader.raw_entry(entry);
    let shown = byte_count.min(raw.len());
    let raw = &raw[..shown];
    Ok(Inspection {
        path:              entry.path.clone(),
        size:              entry.size,
        shown,
        raw_hex:           hex::encode(raw),
        detransformed_hex: hex::encode(crate::transform::inverse_slice(raw)),
    })
}

/// Index entries in packing order.
pub fn list(container: &Path) -> Result<Vec<EntryInfo>> {
    let reader = TcfReader::open(container)?;
    Ok(reader
        .index
        .entries
        .into_iter()
        .map(|e| EntryInfo { path: e.path, offset: e.offset, size: e.size })
        .collect())
}

/// Run the full read gate, including path safety, without writing anything.
pub fn verify(container: &Path) -> Result<VerifyReport> {
    let reader = TcfReader::open(container)?;
    reader.index.validate_paths()?;
    Ok(VerifyReport {
        version:        reader.header.version,
        entry_count:    reader.header.entry_count,
        payload_len:    reader.payload().len(),
        container_size: reader.len(),
    })
}
