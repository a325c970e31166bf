//! Error types for backend operations.

use std::io;
use thiserror::Error;

/// Result type for backend operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors returned by a [`crate::StorageBackend`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying file operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read asked for bytes that were never appended.
    #[error("read of {len} bytes at {position} runs past end of data ({size} bytes)")]
    ReadPastEnd {
        /// Start of the requested range.
        position: u64,
        /// Length of the requested range.
        len: usize,
        /// Bytes appended so far.
        size: u64,
    },

    /// `truncate` was asked to grow the data.
    #[error("cannot truncate {size} bytes up to {requested}")]
    TruncateBeyondEnd {
        /// Requested new size.
        requested: u64,
        /// Bytes appended so far.
        size: u64,
    },

    /// The backend has been closed.
    #[error("backend is closed")]
    Closed,
}

impl StorageError {
    /// Returns `true` if this error reports a read past the written data.
    #[must_use]
    pub fn is_read_past_end(&self) -> bool {
        matches!(self, Self::ReadPastEnd { .. })
    }
}
