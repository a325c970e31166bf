//! Append-only store of length-prefixed record frames.
//!
//! ## Frame Format
//!
//! ```text
//! | length (8, BE) | bytes (length) |
//! ```
//!
//! Frames are packed back to back with no padding. The store's size is the
//! position at which the next frame will begin.

use crate::error::{CoreError, CoreResult};
use seglog_storage::{FileBackend, StorageBackend, StorageError};
use std::path::{Path, PathBuf};

/// Width of the length prefix in front of every frame.
pub const LEN_WIDTH: u64 = 8;

/// The data file of one segment.
pub struct Store {
    path: Option<PathBuf>,
    backend: Box<dyn StorageBackend>,
    closed: bool,
}

impl Store {
    /// Opens or creates a file-backed store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> CoreResult<Self> {
        let backend = FileBackend::open(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            backend: Box::new(backend),
            closed: false,
        })
    }

    /// Creates a store over an arbitrary backend.
    pub fn with_backend(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            path: None,
            backend,
            closed: false,
        }
    }

    /// Appends one frame holding `payload`.
    ///
    /// Returns the number of bytes written (`8 + payload.len()`) and the
    /// position at which the frame begins. The prefix and the payload go
    /// down in a single backend write.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] after [`Store::close`], or an I/O error.
    pub fn append(&mut self, payload: &[u8]) -> CoreResult<(u64, u64)> {
        if self.closed {
            return Err(StorageError::Closed.into());
        }

        let mut frame = Vec::with_capacity(LEN_WIDTH as usize + payload.len());
        frame.extend_from_slice(&(payload.len() as u64).to_be_bytes());
        frame.extend_from_slice(payload);

        let position = self.backend.append(&frame)?;
        Ok((frame.len() as u64, position))
    }

    /// Reads the frame starting at `position` and returns its bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EndOfData`] if `position` is not inside written
    /// data, and [`CoreError::SegmentCorruption`] if the frame's length
    /// prefix runs past the end of the store.
    pub fn read(&self, position: u64) -> CoreResult<Vec<u8>> {
        let len = self.frame_len(position)?;
        let start = position + LEN_WIDTH;
        let len = usize::try_from(len)
            .map_err(|_| CoreError::segment_corruption(format!("frame at {position} too large")))?;

        self.backend.read_at(start, len).map_err(end_of_data)
    }

    /// Raw positional read into `buf`.
    ///
    /// Used to inspect a length prefix and then fetch the bytes behind it
    /// without decoding a record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EndOfData`] if `buf` reaches past written data.
    pub fn read_at(&self, buf: &mut [u8], position: u64) -> CoreResult<usize> {
        if self.closed {
            return Err(StorageError::Closed.into());
        }
        self.backend.read_into(position, buf).map_err(end_of_data)
    }

    /// Returns the position just past the frame starting at `position`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Store::read`].
    pub fn frame_end(&self, position: u64) -> CoreResult<u64> {
        let len = self.frame_len(position)?;
        Ok(position + LEN_WIDTH + len)
    }

    fn frame_len(&self, position: u64) -> CoreResult<u64> {
        let mut prefix = [0u8; LEN_WIDTH as usize];
        self.read_at(&mut prefix, position)?;
        let len = u64::from_be_bytes(prefix);

        let size = self.size();
        let end = (position + LEN_WIDTH).checked_add(len);
        if end.map_or(true, |end| end > size) {
            return Err(CoreError::segment_corruption(format!(
                "frame at {position} claims {len} bytes, store holds {size}"
            )));
        }
        Ok(len)
    }

    /// Pushes buffered frames to the file without syncing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] after close, or an I/O error.
    pub fn flush(&mut self) -> CoreResult<()> {
        if self.closed {
            return Err(StorageError::Closed.into());
        }
        self.backend.flush()?;
        Ok(())
    }

    /// Current size in bytes, buffered bytes included.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.backend.size()
    }

    /// Drops every byte from `size` onwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot shrink.
    pub fn truncate(&mut self, size: u64) -> CoreResult<()> {
        if self.closed {
            return Err(StorageError::Closed.into());
        }
        self.backend.truncate(size)?;
        Ok(())
    }

    /// Flushes buffered frames and syncs them to durable storage.
    ///
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or sync fails.
    pub fn close(&mut self) -> CoreResult<()> {
        if self.closed {
            return Ok(());
        }
        self.backend.sync()?;
        self.closed = true;
        Ok(())
    }

    /// Returns whether [`Store::close`] has completed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Path of the backing file, if file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn end_of_data(err: StorageError) -> CoreError {
    if err.is_read_past_end() {
        CoreError::EndOfData
    } else {
        err.into()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.backend.sync() {
                tracing::warn!(path = ?self.path, error = %e, "failed to sync store on drop");
            }
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("size", &self.size())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
