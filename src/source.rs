//! Source-tree enumeration for packing.

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Result, TcfError};

/// A regular file found under the source root.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the root, `/`-separated.
    pub rel_path:  String,
    pub disk_path: PathBuf,
    pub size:      u64,
}

/// Collect every regular file under `root`, recursively.
///
/// Directories are visited in file-name order, so the result is
/// deterministic for a given tree.  Symlinks are followed: a link to a
/// regular file is packed under the link's own path, and a link cycle is
/// reported as a walk error.
pub fn collect(root: &Path) -> Result<Vec<SourceFile>> {
    if !root.is_dir() {
        return Err(TcfError::NotADirectory(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for ent in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
    {
        let ent = ent?;
        if !ent.file_type().is_file() {
            continue;
        }
        let rel_path = normalize_rel_path(root, ent.path())?;
        let size = ent.metadata()?.len();
        files.push(SourceFile { rel_path, disk_path: ent.into_path(), size });
    }
    log::debug!("collected {} file(s) under {}", files.len(), root.display());
    Ok(files)
}

/// Stable sort by ascending size; equal sizes keep traversal order.
pub fn sort_for_packing(files: &mut [SourceFile]) {
    files.sort_by_key(|f| f.size);
}

/// `file` relative to `root`, joined with `/` regardless of host separator.
pub fn normalize_rel_path(root: &Path, file: &Path) -> Result<String> {
    let rel = file
        .strip_prefix(root)
        .map_err(|_| TcfError::InvalidPath(file.to_path_buf()))?;

    let mut parts = Vec::new();
    for comp in rel.components() {
        let part = comp
            .as_os_str()
            .to_str()
            .ok_or_else(|| TcfError::InvalidPath(file.to_path_buf()))?;
        parts.push(part.replace('\\', "/"));
    }
    let out = parts.join("/");
    if out.is_empty() {
        return Err(TcfError::InvalidPath(file.to_path_buf()));
    }
    Ok(out)
}

/// Total size of the source files, for summaries.
pub fn total_size(files: &[SourceFile]) -> u64 {
    files.iter().map(|f| f.size).sum()
}

pub(crate) fn file_len(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path)?.len())
}
