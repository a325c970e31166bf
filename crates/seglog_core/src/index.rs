//! Memory-mapped offset index.
//!
//! ## Entry Format
//!
//! ```text
//! | relative offset (4, BE) | store position (8, BE) |
//! ```
//!
//! Entries are packed with no gaps and appended strictly in order, so entry
//! `i` describes the `i`-th record of the segment and its relative offset is
//! `i`.
//!
//! ## Lifecycle
//!
//! On open the file is grown to the configured capacity and mapped once;
//! the mapping is never remapped while entries are appended. On close the
//! mapping is flushed and dropped and the file is shrunk back to the used
//! prefix. Every open scans the existing file for the run of entries whose
//! relative offset matches their slot. A file longer than that run was never
//! closed and still carries its preallocated tail, whatever capacity it was
//! created with; a file exactly as long as the capacity may be either.

use crate::error::{CoreError, CoreResult};
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Width of the relative offset field.
pub const OFFSET_WIDTH: u64 = 4;
/// Width of the store position field.
pub const POSITION_WIDTH: u64 = 8;
/// Width of a whole index entry.
pub const ENTRY_WIDTH: u64 = OFFSET_WIDTH + POSITION_WIDTH;

/// The position index of one segment.
#[derive(Debug)]
pub struct Index {
    path: PathBuf,
    file: File,
    /// `None` once closed.
    mmap: Option<MmapMut>,
    size: u64,
    capacity: u64,
    recovered: bool,
}

impl Index {
    /// Opens or creates the index file at `path` with room for
    /// `capacity` bytes of entries.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened, resized or mapped
    /// - The file is larger than `capacity` ([`CoreError::InvalidConfig`])
    /// - The file is non-empty but shorter than one entry
    ///   ([`CoreError::SegmentCorruption`])
    pub fn open(path: &Path, capacity: u64) -> CoreResult<Self> {
        if capacity < ENTRY_WIDTH {
            return Err(CoreError::invalid_config(format!(
                "index capacity {capacity} cannot hold one entry"
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();

        if len > capacity {
            return Err(CoreError::invalid_config(format!(
                "index {} holds {len} bytes, more than the configured {capacity}",
                path.display()
            )));
        }
        if len % ENTRY_WIDTH != 0 && len < ENTRY_WIDTH {
            return Err(CoreError::segment_corruption(format!(
                "index {} length {len} is shorter than one entry",
                path.display()
            )));
        }

        file.set_len(capacity)?;
        let mmap = match map(&file) {
            Ok(mmap) => mmap,
            Err(e) => {
                // Put the file back the way we found it.
                if let Err(restore) = file.set_len(len) {
                    tracing::warn!(
                        path = %path.display(),
                        len,
                        error = %restore,
                        "failed to restore index length after map failure"
                    );
                }
                return Err(e.into());
            }
        };

        let mut index = Self {
            path: path.to_path_buf(),
            file,
            mmap: Some(mmap),
            size: 0,
            capacity,
            recovered: false,
        };

        // The file may still carry the preallocated tail of an earlier,
        // possibly smaller, capacity. Only the prefix of valid entries counts.
        index.size = index.scan_used_prefix(len);
        index.recovered = index.size != len || len == capacity;
        if index.size != len {
            tracing::debug!(
                path = %index.path.display(),
                file_len = len,
                entries = index.len(),
                "recovered index prefix"
            );
        }

        Ok(index)
    }

    /// Counts leading entries within the first `len` bytes whose relative
    /// offset equals their slot and whose positions strictly increase.
    fn scan_used_prefix(&self, len: u64) -> u64 {
        let Some(mmap) = self.mmap.as_ref() else {
            return 0;
        };
        let limit = len.min(self.capacity);
        let mut entries = 0u64;
        let mut last_pos = None;
        while (entries + 1) * ENTRY_WIDTH <= limit {
            let at = (entries * ENTRY_WIDTH) as usize;
            let rel = read_u32(mmap, at);
            let pos = read_u64(mmap, at + OFFSET_WIDTH as usize);
            if u64::from(rel) != entries || last_pos.is_some_and(|last| pos <= last) {
                break;
            }
            last_pos = Some(pos);
            entries += 1;
        }
        entries * ENTRY_WIDTH
    }

    /// Reads an entry.
    ///
    /// `entry == -1` reads the last written entry; any other value is the
    /// slot number. Returns `(relative offset, store position)`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EndOfData`] if the index is empty or the slot has
    /// never been written, and [`CoreError::Closed`] after close.
    pub fn read(&self, entry: i64) -> CoreResult<(u32, u64)> {
        let mmap = self.mmap.as_ref().ok_or(CoreError::Closed)?;
        if self.size == 0 {
            return Err(CoreError::EndOfData);
        }

        let slot = match entry {
            -1 => self.len() - 1,
            n if n < 0 => return Err(CoreError::EndOfData),
            n => n as u64,
        };

        let at = slot.checked_mul(ENTRY_WIDTH).ok_or(CoreError::EndOfData)?;
        if at.saturating_add(ENTRY_WIDTH) > self.size {
            return Err(CoreError::EndOfData);
        }

        let at = at as usize;
        let rel = read_u32(mmap, at);
        let pos = read_u64(mmap, at + OFFSET_WIDTH as usize);
        Ok((rel, pos))
    }

    /// Reads the last written entry.
    ///
    /// # Errors
    ///
    /// Same as [`Index::read`] with `-1`.
    pub fn last(&self) -> CoreResult<(u32, u64)> {
        self.read(-1)
    }

    /// Appends an entry.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexFull`] if another entry does not fit in the
    /// mapped capacity, and [`CoreError::Closed`] after close.
    pub fn write(&mut self, rel: u32, pos: u64) -> CoreResult<()> {
        let capacity = self.capacity;
        let at = self.size;
        let mmap = self.mmap.as_mut().ok_or(CoreError::Closed)?;
        if at + ENTRY_WIDTH > capacity {
            return Err(CoreError::IndexFull { capacity });
        }

        let at = at as usize;
        let mid = at + OFFSET_WIDTH as usize;
        let end = at + ENTRY_WIDTH as usize;
        mmap[at..mid].copy_from_slice(&rel.to_be_bytes());
        mmap[mid..end].copy_from_slice(&pos.to_be_bytes());
        self.size += ENTRY_WIDTH;
        Ok(())
    }

    /// Forgets every entry from slot `entries` onwards.
    ///
    /// Only used while reconciling an index with its store after a crash.
    pub(crate) fn truncate_entries(&mut self, entries: u64) {
        self.size = self.size.min(entries * ENTRY_WIDTH);
    }

    /// Flushes written entries to the file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] after close, or an I/O error.
    pub fn flush(&self) -> CoreResult<()> {
        let mmap = self.mmap.as_ref().ok_or(CoreError::Closed)?;
        mmap.flush()?;
        Ok(())
    }

    /// Flushes the mapping, syncs the file and shrinks it to the used prefix.
    ///
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if any flush, sync or resize fails.
    pub fn close(&mut self) -> CoreResult<()> {
        let Some(mmap) = self.mmap.as_ref() else {
            return Ok(());
        };
        mmap.flush()?;
        self.file.sync_all()?;

        // The mapping has to go before the file can shrink.
        self.mmap = None;
        self.file.set_len(self.size)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Path of the index file.
    #[must_use]
    pub fn name(&self) -> &Path {
        &self.path
    }

    /// Bytes of entries written.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of entries written.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.size / ENTRY_WIDTH
    }

    /// Whether no entry has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Mapped capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Whether another entry would exceed the capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.size + ENTRY_WIDTH > self.capacity
    }

    /// Whether the used prefix was recovered by scanning on open.
    #[must_use]
    pub fn was_recovered(&self) -> bool {
        self.recovered
    }
}

impl Drop for Index {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to close index on drop");
        }
    }
}

#[allow(unsafe_code)]
fn map(file: &File) -> io::Result<MmapMut> {
    // SAFETY: the index owns `file` for as long as the mapping lives and only
    // resizes it after the mapping is dropped. Concurrent modification by
    // other processes is outside the single-writer contract of the log.
    unsafe { MmapMut::map_mut(file) }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; OFFSET_WIDTH as usize];
    bytes.copy_from_slice(&buf[at..at + OFFSET_WIDTH as usize]);
    u32::from_be_bytes(bytes)
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; POSITION_WIDTH as usize];
    bytes.copy_from_slice(&buf[at..at + POSITION_WIDTH as usize]);
    u64::from_be_bytes(bytes)
}
