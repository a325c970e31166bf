//! Whole-log byte reader.
//!
//! Streams the raw store bytes of every segment, in base offset order, as
//! one contiguous sequence of `[length][record]` frames. Useful for
//! snapshots, replication and offline inspection.

use crate::error::CoreError;
use crate::log::Log;
use std::io;

/// A one-shot reader over the concatenated stores of a log.
///
/// The segments and their store sizes are captured when the reader is
/// created; records appended afterwards are not part of the stream. The
/// segment lock is only held for the duration of each `read` call, so
/// appends and other readers keep going while the reader is alive.
///
/// A segment removed by [`Log::truncate`] before the reader reaches it
/// fails the read with [`io::ErrorKind::NotFound`].
///
/// # Example
///
/// ```no_run
/// use seglog_core::{Config, Log};
/// use std::io::Read;
///
/// let log = Log::open("/tmp/seglog", Config::default())?;
/// let mut bytes = Vec::new();
/// log.reader()?.read_to_end(&mut bytes)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct LogReader<'a> {
    log: &'a Log,
    /// `(base offset, store size)` of every segment at creation.
    bounds: Vec<(u64, u64)>,
    /// Index into `bounds` of the segment being read.
    current: usize,
    /// Position within the current segment's store.
    position: u64,
}

impl<'a> LogReader<'a> {
    pub(crate) fn new(log: &'a Log, bounds: Vec<(u64, u64)>) -> Self {
        Self {
            log,
            bounds,
            current: 0,
            position: 0,
        }
    }

    /// Total number of bytes the reader yields from start to finish.
    #[must_use]
    pub fn total_len(&self) -> u64 {
        self.bounds.iter().map(|&(_, size)| size).sum()
    }
}

impl io::Read for LogReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while let Some(&(base_offset, size)) = self.bounds.get(self.current) {
            if self.position >= size {
                self.current += 1;
                self.position = 0;
                continue;
            }

            let remaining = size - self.position;
            let len = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
            let n = self
                .log
                .read_segment_store(base_offset, &mut buf[..len], self.position)
                .map_err(|e| match e {
                    CoreError::Io(io) => io,
                    e @ CoreError::OffsetOutOfRange { .. } => io::Error::new(io::ErrorKind::NotFound, e),
                    other => io::Error::new(io::ErrorKind::Other, other),
                })?;
            self.position += n as u64;
            return Ok(n);
        }

        Ok(0)
    }
}

impl std::fmt::Debug for LogReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogReader")
            .field("segments", &self.bounds.len())
            .field("current", &self.current)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}
