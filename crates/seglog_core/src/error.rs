//! Error types for the seglog core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in log, segment, store and index operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] seglog_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested offset has not been produced, was truncated away,
    /// or was never written.
    #[error("offset out of range: {offset}")]
    OffsetOutOfRange {
        /// The offset that was requested.
        offset: u64,
    },

    /// A read went past the written region of a store or index.
    #[error("end of data")]
    EndOfData,

    /// The index has no room left for another entry.
    #[error("index full: capacity {capacity} bytes")]
    IndexFull {
        /// Mapped capacity of the index in bytes.
        capacity: u64,
    },

    /// A record could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },

    /// Checksum mismatch detected while decoding a record.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// Segment files disagree with each other or are malformed.
    #[error("segment corruption: {message}")]
    SegmentCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// The configuration cannot be used.
    #[error("invalid config: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// The log, segment, store or index has been closed.
    #[error("log is closed")]
    Closed,
}

impl CoreError {
    /// Creates a segment corruption error.
    pub fn segment_corruption(message: impl Into<String>) -> Self {
        Self::SegmentCorruption {
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns `true` for the "offset not available" condition.
    ///
    /// Consumers tailing the log retry on this error and treat every
    /// other error as fatal.
    #[must_use]
    pub fn is_offset_out_of_range(&self) -> bool {
        matches!(self, Self::OffsetOutOfRange { .. })
    }

    /// Returns `true` if this error means a read ran past written data.
    #[must_use]
    pub fn is_end_of_data(&self) -> bool {
        match self {
            Self::EndOfData => true,
            Self::Storage(e) => e.is_read_past_end(),
            _ => false,
        }
    }
}
