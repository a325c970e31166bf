//! On-disk layout of a log directory.
//!
//! ```text
//! <log_dir>/
//! ├─ 0.store       # frames of the segment starting at offset 0
//! ├─ 0.index       # its position index
//! ├─ 1024.store
//! └─ 1024.index
//! ```
//!
//! Each segment is a pair of files named after its base offset in decimal.

use crate::error::{CoreError, CoreResult};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Extension of segment store files.
pub const STORE_EXT: &str = "store";
/// Extension of segment index files.
pub const INDEX_EXT: &str = "index";

/// Returns the path of the store file for `base_offset`.
#[must_use]
pub fn store_path(dir: &Path, base_offset: u64) -> PathBuf {
    dir.join(format!("{base_offset}.{STORE_EXT}"))
}

/// Returns the path of the index file for `base_offset`.
#[must_use]
pub fn index_path(dir: &Path, base_offset: u64) -> PathBuf {
    dir.join(format!("{base_offset}.{INDEX_EXT}"))
}

/// Makes sure `dir` exists and is a directory.
///
/// # Errors
///
/// Returns an error if the directory is missing and `create_if_missing` is
/// false, if the path is not a directory, or if creation fails.
pub fn ensure_dir(dir: &Path, create_if_missing: bool) -> CoreResult<()> {
    if !dir.exists() {
        if create_if_missing {
            fs::create_dir_all(dir)?;
        } else {
            return Err(CoreError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("log directory does not exist: {}", dir.display()),
            )));
        }
    }

    if !dir.is_dir() {
        return Err(CoreError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path is not a directory: {}", dir.display()),
        )));
    }
    Ok(())
}

/// Collects the distinct base offsets of every segment file in `dir`,
/// ascending.
///
/// Files that are not `<u64>.store` or `<u64>.index` are skipped.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed.
pub fn scan_base_offsets(dir: &Path) -> CoreResult<BTreeSet<u64>> {
    let mut offsets = BTreeSet::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        match parse_segment_file(&path) {
            Some(base) => {
                offsets.insert(base);
            }
            None => tracing::debug!(path = %path.display(), "ignoring non-segment file"),
        }
    }

    Ok(offsets)
}

fn parse_segment_file(path: &Path) -> Option<u64> {
    let ext = path.extension()?.to_str()?;
    if ext != STORE_EXT && ext != INDEX_EXT {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}
