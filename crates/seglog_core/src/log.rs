//! The segment manager.
//!
//! A log is an ordered list of segments sorted by base offset. The last one
//! is active and takes every append; the others are sealed. When the active
//! segment is maxed, it is flushed and a new one starting at its next
//! offset is created before the append goes through, so offsets stay
//! contiguous across segment boundaries.
//!
//! ## Concurrency
//!
//! The segment list sits behind a reader/writer lock. Appends, rotation,
//! truncation and close take the write side; reads take the read side, and
//! full-log scans take it once per chunk rather than for their lifetime. Tailing subscribers wait on a condition variable that is
//! notified after every append.

use crate::config::Config;
use crate::dir;
use crate::error::{CoreError, CoreResult};
use crate::reader::LogReader;
use crate::record::Record;
use crate::segment::{Segment, SegmentInfo};
use crate::subscription::Subscription;
use parking_lot::{Condvar, Mutex, RwLock};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Segments of a log, ascending by base offset. Never empty while open.
struct Segments {
    list: Vec<Segment>,
    closed: bool,
}

impl Segments {
    fn check_open(&self) -> CoreResult<()> {
        if self.closed {
            return Err(CoreError::Closed);
        }
        Ok(())
    }

    fn active(&self) -> CoreResult<&Segment> {
        self.list
            .last()
            .ok_or_else(|| CoreError::segment_corruption("log has no active segment"))
    }

    fn active_mut(&mut self) -> CoreResult<&mut Segment> {
        self.list
            .last_mut()
            .ok_or_else(|| CoreError::segment_corruption("log has no active segment"))
    }
}

/// A segmented, append-only commit log.
///
/// # Example
///
/// ```no_run
/// use seglog_core::{Config, Log};
///
/// let log = Log::open("/tmp/seglog", Config::default())?;
/// let offset = log.append(b"hello world")?;
/// let record = log.read(offset)?;
/// assert_eq!(record.payload, b"hello world");
/// log.close()?;
/// # Ok::<(), seglog_core::CoreError>(())
/// ```
pub struct Log {
    dir: PathBuf,
    config: Config,
    segments: RwLock<Segments>,
    /// Mirrors the active segment's next offset for lock-free peeks.
    next_offset: AtomicU64,
    appended: Mutex<()>,
    appended_cv: Condvar,
}

impl Log {
    /// Opens the log stored in `dir`, creating it if allowed and needed.
    ///
    /// One segment is opened per base offset found in the directory. If the
    /// directory holds no segment, a single empty segment is created at
    /// `config.initial_offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the directory
    /// cannot be used, or any segment fails to open.
    pub fn open(dir: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let config = config.normalized();
        config.validate()?;
        dir::ensure_dir(&dir, config.create_if_missing)?;

        let mut list = Vec::new();
        for base_offset in dir::scan_base_offsets(&dir)? {
            let segment = Segment::open(&dir, base_offset, &config)?;
            if let Some(prev) = list.last().map(Segment::next_offset) {
                if prev != base_offset {
                    tracing::warn!(
                        expected = prev,
                        found = base_offset,
                        "gap between consecutive segments"
                    );
                }
            }
            list.push(segment);
        }

        if list.is_empty() {
            list.push(Segment::open(&dir, config.initial_offset, &config)?);
        }

        let next_offset = list.last().map_or(config.initial_offset, Segment::next_offset);
        tracing::info!(
            dir = %dir.display(),
            segments = list.len(),
            next_offset,
            "opened log"
        );

        Ok(Self {
            dir,
            config,
            segments: RwLock::new(Segments {
                list,
                closed: false,
            }),
            next_offset: AtomicU64::new(next_offset),
            appended: Mutex::new(()),
            appended_cv: Condvar::new(),
        })
    }

    /// Appends `payload` as a new record and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] after close, or any segment creation or
    /// write error.
    pub fn append(&self, payload: &[u8]) -> CoreResult<u64> {
        let mut record = Record::new(payload);
        self.append_record(&mut record)
    }

    /// Appends `record`, overwriting its offset with the assigned one.
    ///
    /// # Errors
    ///
    /// Same as [`Log::append`].
    pub fn append_record(&self, record: &mut Record) -> CoreResult<u64> {
        let mut segments = self.segments.write();
        segments.check_open()?;

        let active = segments.active_mut()?;
        if active.is_maxed() {
            active.flush()?;
            let base_offset = active.next_offset();
            let segment = Segment::open(&self.dir, base_offset, &self.config)?;
            segments.list.push(segment);
            tracing::debug!(base_offset, "rotated to new segment");
        }

        let offset = segments.active_mut()?.append(record)?;
        self.next_offset.store(offset + 1, Ordering::Release);
        drop(segments);

        self.notify_waiters();
        Ok(offset)
    }

    /// Reads the record at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OffsetOutOfRange`] if the offset is below the
    /// lowest retained offset, not yet produced, or never written; other
    /// errors indicate corruption or I/O failure.
    pub fn read(&self, offset: u64) -> CoreResult<Record> {
        let segments = self.segments.read();
        segments.check_open()?;

        let list = &segments.list;
        let idx = list.partition_point(|s| s.base_offset() <= offset);
        let Some(segment) = idx.checked_sub(1).and_then(|i| list.get(i)) else {
            return Err(CoreError::OffsetOutOfRange { offset });
        };
        if offset >= segment.next_offset() {
            return Err(CoreError::OffsetOutOfRange { offset });
        }

        segment.read(offset)
    }

    /// Returns a one-shot reader over the raw frames of every segment, in
    /// base offset order, as they stand now.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] after close.
    pub fn reader(&self) -> CoreResult<LogReader<'_>> {
        let segments = self.segments.read();
        segments.check_open()?;
        let bounds = segments
            .list
            .iter()
            .map(|s| (s.base_offset(), s.store_size()))
            .collect();
        Ok(LogReader::new(self, bounds))
    }

    /// Positional read of the store of the segment starting at
    /// `base_offset`, under the read lock.
    ///
    /// Fails with [`CoreError::OffsetOutOfRange`] carrying `base_offset` if
    /// that segment is gone.
    pub(crate) fn read_segment_store(
        &self,
        base_offset: u64,
        buf: &mut [u8],
        position: u64,
    ) -> CoreResult<usize> {
        let segments = self.segments.read();
        segments.check_open()?;
        let at = segments
            .list
            .binary_search_by_key(&base_offset, Segment::base_offset)
            .map_err(|_| CoreError::OffsetOutOfRange {
                offset: base_offset,
            })?;
        segments.list[at].read_store_at(buf, position)
    }

    /// Removes every segment whose records all lie below `lowest`.
    ///
    /// A segment holding any offset at or above `lowest` is kept whole. The
    /// active segment is kept while empty; if every segment goes, a fresh one
    /// is started at the old next offset.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment cannot be removed or replaced.
    pub fn truncate(&self, lowest: u64) -> CoreResult<()> {
        let mut segments = self.segments.write();
        segments.check_open()?;

        let next_offset = segments.active()?.next_offset();
        let old = std::mem::take(&mut segments.list);
        let count = old.len();
        let mut removed = 0usize;
        let mut iter = old.into_iter().enumerate();

        while let Some((i, segment)) = iter.next() {
            let keep_active = i + 1 == count && segment.is_empty();
            if segment.next_offset() > lowest || keep_active {
                segments.list.push(segment);
                continue;
            }

            let base_offset = segment.base_offset();
            if let Err(e) = segment.remove() {
                tracing::error!(base_offset, error = %e, "failed to remove segment");
                segments.list.extend(iter.map(|(_, s)| s));
                if segments.list.is_empty() {
                    segments
                        .list
                        .push(Segment::open(&self.dir, next_offset, &self.config)?);
                }
                return Err(e);
            }
            removed += 1;
        }

        if segments.list.is_empty() {
            segments
                .list
                .push(Segment::open(&self.dir, next_offset, &self.config)?);
        }

        tracing::info!(lowest, removed, "truncated log");
        Ok(())
    }

    /// Closes every segment. Later operations fail with
    /// [`CoreError::Closed`]; closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first segment close failure. Every segment is still
    /// attempted.
    pub fn close(&self) -> CoreResult<()> {
        let mut segments = self.segments.write();
        if segments.closed {
            return Ok(());
        }
        segments.closed = true;

        let mut result = Ok(());
        for segment in &mut segments.list {
            if let Err(e) = segment.close() {
                tracing::error!(base_offset = segment.base_offset(), error = %e, "failed to close segment");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        drop(segments);

        self.notify_waiters();
        result
    }

    /// Closes the log and deletes its directory.
    ///
    /// # Errors
    ///
    /// Returns an error if closing or deleting fails.
    pub fn remove(self) -> CoreResult<()> {
        self.close()?;
        let dir = self.dir.clone();
        drop(self);
        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    /// Deletes the log and opens a fresh, empty one in the same directory
    /// with the same configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if removal or reopening fails.
    pub fn reset(self) -> CoreResult<Self> {
        let dir = self.dir.clone();
        let config = self.config.clone().create_if_missing(true);
        self.remove()?;
        Self::open(dir, config)
    }

    /// Starts a tailing subscription at offset `from`.
    #[must_use]
    pub fn subscribe(self: &Arc<Self>, from: u64) -> Subscription {
        Subscription::new(Arc::clone(self), from)
    }

    /// Base offset of the first segment.
    #[must_use]
    pub fn lowest_offset(&self) -> u64 {
        self.segments
            .read()
            .list
            .first()
            .map_or(self.config.initial_offset, Segment::base_offset)
    }

    /// Offset of the last record, or `None` if the log holds no record.
    #[must_use]
    pub fn highest_offset(&self) -> Option<u64> {
        let segments = self.segments.read();
        let lowest = segments.list.first()?.base_offset();
        let next = segments.list.last()?.next_offset();
        (next > lowest).then(|| next - 1)
    }

    /// Offset the next appended record will get.
    #[must_use]
    pub fn next_offset(&self) -> u64 {
        self.next_offset.load(Ordering::Acquire)
    }

    /// Number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.read().list.len()
    }

    /// Describes every segment, ascending by base offset.
    #[must_use]
    pub fn segments(&self) -> Vec<SegmentInfo> {
        self.segments.read().list.iter().map(Segment::info).collect()
    }

    /// Directory holding the segment files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether [`Log::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.segments.read().closed
    }

    /// Blocks until an append or a wake-up, at most `timeout`.
    ///
    /// Returns immediately if cancelled, or if `offset` has been produced
    /// and the caller is not `stalled` on it.
    pub(crate) fn wait_for_append(
        &self,
        offset: u64,
        timeout: Duration,
        stalled: bool,
        cancelled: &AtomicBool,
    ) {
        let mut guard = self.appended.lock();
        if cancelled.load(Ordering::Acquire) {
            return;
        }
        if !stalled && self.next_offset() > offset {
            return;
        }
        self.appended_cv.wait_for(&mut guard, timeout);
    }

    /// Wakes every subscriber blocked in [`Log::wait_for_append`].
    pub(crate) fn notify_waiters(&self) {
        let _guard = self.appended.lock();
        self.appended_cv.notify_all();
    }
}

impl std::fmt::Debug for Log {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Log")
            .field("dir", &self.dir)
            .field("config", &self.config)
            .field("next_offset", &self.next_offset())
            .finish_non_exhaustive()
    }
}
