//! A segment pairs one store with one index.
//!
//! Writes go to the store first and then to the index; reads go the other
//! way round. The segment assigns offsets: entry `i` of its index belongs to
//! the record at `base_offset + i`.

use crate::config::Config;
use crate::dir;
use crate::error::{CoreError, CoreResult};
use crate::index::Index;
use crate::record::Record;
use crate::store::Store;
use std::fs;
use std::path::{Path, PathBuf};

/// Point-in-time description of a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Offset of the first record.
    pub base_offset: u64,
    /// Offset the next record will get.
    pub next_offset: u64,
    /// Store size in bytes.
    pub store_bytes: u64,
    /// Used index bytes.
    pub index_bytes: u64,
    /// Path of the store file.
    pub store_path: PathBuf,
    /// Path of the index file.
    pub index_path: PathBuf,
}

impl SegmentInfo {
    /// Number of records in the segment.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.next_offset - self.base_offset
    }

    /// Whether the segment holds no record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.next_offset == self.base_offset
    }
}

/// One store/index pair of the log.
#[derive(Debug)]
pub struct Segment {
    store: Store,
    index: Index,
    base_offset: u64,
    next_offset: u64,
    max_store_bytes: u64,
    store_path: PathBuf,
    index_path: PathBuf,
}

impl Segment {
    /// Opens or creates the segment starting at `base_offset` in `dir`.
    ///
    /// The next offset is recovered from the last index entry. If the index
    /// was not closed cleanly, entries whose frames never reached the store
    /// are dropped, and store bytes past the last indexed frame are cut off.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `dir` does not exist or the files cannot be opened
    /// - The index cannot be read for a reason other than being empty
    /// - A cleanly closed index points past the end of its store
    pub fn open(dir: &Path, base_offset: u64, config: &Config) -> CoreResult<Self> {
        dir::ensure_dir(dir, false)?;

        let store_path = dir::store_path(dir, base_offset);
        let index_path = dir::index_path(dir, base_offset);

        let mut store = Store::open(&store_path)?;
        let mut index = Index::open(&index_path, config.max_index_bytes)?;

        let store_end = reconcile(&store, &mut index)?;
        if store.size() > store_end {
            tracing::warn!(
                path = %store_path.display(),
                size = store.size(),
                keep = store_end,
                "truncating unindexed store tail"
            );
            store.truncate(store_end)?;
        }

        let next_offset = match index.last() {
            Ok((rel, _)) => base_offset + u64::from(rel) + 1,
            Err(CoreError::EndOfData) => base_offset,
            Err(e) => {
                return Err(CoreError::segment_corruption(format!(
                    "unexpected index read error in {}: {e}",
                    index_path.display()
                )))
            }
        };

        tracing::debug!(base_offset, next_offset, "opened segment");

        Ok(Self {
            store,
            index,
            base_offset,
            next_offset,
            max_store_bytes: config.max_store_bytes,
            store_path,
            index_path,
        })
    }

    /// Appends `record`, assigning it the next offset.
    ///
    /// Returns the assigned offset, which is also written into
    /// `record.offset`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexFull`] without writing anything if the
    /// segment cannot take another record, or an I/O error.
    pub fn append(&mut self, record: &mut Record) -> CoreResult<u64> {
        let capacity = self.index.capacity();
        if self.index.is_full() {
            return Err(CoreError::IndexFull { capacity });
        }
        let rel = u32::try_from(self.next_offset - self.base_offset)
            .map_err(|_| CoreError::IndexFull { capacity })?;

        record.offset = self.next_offset;
        let (_, pos) = self.store.append(&record.encode())?;

        if let Err(e) = self.index.write(rel, pos) {
            tracing::error!(
                base_offset = self.base_offset,
                offset = record.offset,
                error = %e,
                "store frame written without index entry"
            );
            return Err(e);
        }

        self.next_offset += 1;
        Ok(record.offset)
    }

    /// Reads the record at absolute `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OffsetOutOfRange`] if the offset is not held by
    /// this segment, and corruption or I/O errors otherwise.
    pub fn read(&self, offset: u64) -> CoreResult<Record> {
        let out_of_range = CoreError::OffsetOutOfRange { offset };
        let Some(rel) = offset.checked_sub(self.base_offset) else {
            return Err(out_of_range);
        };
        let Ok(slot) = i64::try_from(rel) else {
            return Err(out_of_range);
        };

        let (_, pos) = match self.index.read(slot) {
            Ok(entry) => entry,
            Err(CoreError::EndOfData) => return Err(out_of_range),
            Err(e) => return Err(e),
        };

        let bytes = self.store.read(pos).map_err(|e| {
            if e.is_end_of_data() {
                CoreError::segment_corruption(format!(
                    "index entry for offset {offset} points past the store at {pos}"
                ))
            } else {
                e
            }
        })?;

        let record = Record::decode(&bytes)?;
        if record.offset != offset {
            return Err(CoreError::segment_corruption(format!(
                "record at position {pos} has offset {}, expected {offset}",
                record.offset
            )));
        }
        Ok(record)
    }

    /// Raw positional read of the store.
    ///
    /// # Errors
    ///
    /// See [`Store::read_at`].
    pub fn read_store_at(&self, buf: &mut [u8], position: u64) -> CoreResult<usize> {
        self.store.read_at(buf, position)
    }

    /// Whether the segment should be replaced by a fresh active segment.
    #[must_use]
    pub fn is_maxed(&self) -> bool {
        self.store.size() >= self.max_store_bytes
            || self.index.is_full()
            || self.next_offset - self.base_offset > u64::from(u32::MAX)
    }

    /// Flushes the store and then the index.
    ///
    /// # Errors
    ///
    /// Returns the first flush failure.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.store.flush()?;
        self.index.flush()
    }

    /// Closes the index and then the store.
    ///
    /// # Errors
    ///
    /// Returns the first close failure.
    pub fn close(&mut self) -> CoreResult<()> {
        self.index.close()?;
        self.store.close()?;
        Ok(())
    }

    /// Closes the segment and deletes both of its files.
    ///
    /// # Errors
    ///
    /// Returns an error if closing or deleting fails.
    pub fn remove(mut self) -> CoreResult<()> {
        self.close()?;
        fs::remove_file(&self.index_path)?;
        fs::remove_file(&self.store_path)?;
        tracing::debug!(base_offset = self.base_offset, "removed segment");
        Ok(())
    }

    /// Offset of the first record.
    #[must_use]
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Offset the next appended record will get.
    #[must_use]
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Number of records in the segment.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.next_offset - self.base_offset
    }

    /// Whether the segment holds no record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.next_offset == self.base_offset
    }

    /// Store size in bytes.
    #[must_use]
    pub fn store_size(&self) -> u64 {
        self.store.size()
    }

    /// Used index bytes.
    #[must_use]
    pub fn index_size(&self) -> u64 {
        self.index.size()
    }

    /// Path of the store file.
    #[must_use]
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Path of the index file.
    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Describes the segment.
    #[must_use]
    pub fn info(&self) -> SegmentInfo {
        SegmentInfo {
            base_offset: self.base_offset,
            next_offset: self.next_offset,
            store_bytes: self.store.size(),
            index_bytes: self.index.size(),
            store_path: self.store_path.clone(),
            index_path: self.index_path.clone(),
        }
    }
}

/// Lines the index up with the store and returns where the last indexed
/// frame ends.
fn reconcile(store: &Store, index: &mut Index) -> CoreResult<u64> {
    loop {
        let pos = match index.last() {
            Ok((_, pos)) => pos,
            Err(CoreError::EndOfData) => return Ok(0),
            Err(e) => return Err(e),
        };

        match store.frame_end(pos) {
            Ok(end) => return Ok(end),
            Err(e) if index.was_recovered() && is_torn(&e) => {
                tracing::warn!(
                    path = %index.name().display(),
                    entry = index.len() - 1,
                    "dropping index entry without a complete frame"
                );
                index.truncate_entries(index.len() - 1);
            }
            Err(e) if is_torn(&e) => {
                return Err(CoreError::segment_corruption(format!(
                    "index {} points at position {pos} beyond its store: {e}",
                    index.name().display()
                )))
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_torn(err: &CoreError) -> bool {
    err.is_end_of_data() || matches!(err, CoreError::SegmentCorruption { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ENTRY_WIDTH;
    use tempfile::tempdir;

    fn config() -> Config {
        Config::new()
            .max_store_bytes(1024)
            .max_index_bytes(ENTRY_WIDTH * 3)
    }

    #[test]
    fn append_read_and_index_capacity() {
        let dir = tempdir().unwrap();
        let mut segment = Segment::open(dir.path(), 16, &config()).unwrap();
        assert_eq!(segment.base_offset(), 16);
        assert_eq!(segment.next_offset(), 16);
        assert!(!segment.is_maxed());

        for i in 0..3u64 {
            let mut record = Record::new(b"hello world".to_vec());
            let offset = segment.append(&mut record).unwrap();
            assert_eq!(offset, 16 + i);
            assert_eq!(record.offset, offset);

            let read = segment.read(offset).unwrap();
            assert_eq!(read.payload, b"hello world");
            assert_eq!(read.offset, offset);
        }

        assert!(segment.is_maxed());
        let store_size = segment.store_size();
        let result = segment.append(&mut Record::new(b"overflow".to_vec()));
        assert!(matches!(result, Err(CoreError::IndexFull { .. })));
        // Nothing was written for the refused append.
        assert_eq!(segment.store_size(), store_size);
    }

    #[test]
    fn reopen_recovers_next_offset() {
        let dir = tempdir().unwrap();
        {
            let mut segment = Segment::open(dir.path(), 16, &config()).unwrap();
            for _ in 0..3 {
                segment.append(&mut Record::new(b"hello".to_vec())).unwrap();
            }
            segment.close().unwrap();
        }

        let segment = Segment::open(dir.path(), 16, &config()).unwrap();
        assert_eq!(segment.next_offset(), 19);
        assert!(segment.is_maxed());
        assert_eq!(segment.read(18).unwrap().payload, b"hello");
    }

    #[test]
    fn maxed_by_store_size() {
        let dir = tempdir().unwrap();
        let payload = b"hello world".to_vec();
        let frame = Record::new(payload.clone()).encoded_size() as u64 + 8;
        let config = Config::new()
            .max_store_bytes(frame * 2)
            .max_index_bytes(1024);

        let mut segment = Segment::open(dir.path(), 0, &config).unwrap();
        segment.append(&mut Record::new(payload.clone())).unwrap();
        assert!(!segment.is_maxed());
        segment.append(&mut Record::new(payload)).unwrap();
        assert!(segment.is_maxed());
    }

    #[test]
    fn read_outside_segment_is_out_of_range() {
        let dir = tempdir().unwrap();
        let mut segment = Segment::open(dir.path(), 10, &config()).unwrap();
        segment.append(&mut Record::new(b"a".to_vec())).unwrap();

        for offset in [0, 9, 11, 12, u64::MAX] {
            let err = segment.read(offset).unwrap_err();
            assert!(err.is_offset_out_of_range(), "offset {offset}: {err}");
        }
    }

    #[test]
    fn remove_deletes_files() {
        let dir = tempdir().unwrap();
        let mut segment = Segment::open(dir.path(), 0, &config()).unwrap();
        segment.append(&mut Record::new(b"a".to_vec())).unwrap();
        let store_path = segment.store_path().to_path_buf();
        let index_path = segment.index_path().to_path_buf();
        assert!(store_path.exists() && index_path.exists());

        segment.remove().unwrap();
        assert!(!store_path.exists());
        assert!(!index_path.exists());
    }

    #[test]
    fn missing_directory_fails() {
        let dir = tempdir().unwrap();
        let result = Segment::open(&dir.path().join("missing"), 0, &config());
        assert!(matches!(result, Err(CoreError::Io(_))));
    }

    #[test]
    fn crash_tail_is_reconciled() {
        let dir = tempdir().unwrap();
        let config = Config::new().max_index_bytes(1024);
        {
            let mut segment = Segment::open(dir.path(), 0, &config).unwrap();
            for _ in 0..2 {
                segment.append(&mut Record::new(b"kept".to_vec())).unwrap();
            }
            segment.store.close().unwrap();
            // The index keeps its preallocated length, as after a crash.
            std::mem::forget(segment);
        }

        // A frame that made it into the store but never into the index.
        let store_path = dir::store_path(dir.path(), 0);
        let clean_len = std::fs::metadata(&store_path).unwrap().len();
        {
            let mut store = Store::open(&store_path).unwrap();
            store.append(b"torn").unwrap();
            store.close().unwrap();
        }

        let mut segment = Segment::open(dir.path(), 0, &config).unwrap();
        assert_eq!(segment.next_offset(), 2);
        assert_eq!(segment.store_size(), clean_len);
        assert_eq!(segment.read(1).unwrap().payload, b"kept");
        assert_eq!(segment.append(&mut Record::new(b"next".to_vec())).unwrap(), 2);
    }

    #[test]
    fn empty_segment_after_crash_has_no_entries() {
        let dir = tempdir().unwrap();
        let config = Config::new().max_index_bytes(1024);
        {
            let segment = Segment::open(dir.path(), 5, &config).unwrap();
            std::mem::forget(segment);
        }

        // The zero-filled first slot looks like entry (0, 0) until checked
        // against the empty store.
        let segment = Segment::open(dir.path(), 5, &config).unwrap();
        assert!(segment.is_empty());
        assert_eq!(segment.next_offset(), 5);
    }

    #[test]
    fn clean_index_past_store_is_corruption() {
        let dir = tempdir().unwrap();
        {
            let mut segment = Segment::open(dir.path(), 0, &config()).unwrap();
            segment.append(&mut Record::new(b"gone".to_vec())).unwrap();
            segment.close().unwrap();
        }
        std::fs::write(dir::store_path(dir.path(), 0), b"").unwrap();

        let result = Segment::open(dir.path(), 0, &config());
        assert!(matches!(result, Err(CoreError::SegmentCorruption { .. })));
    }
}
