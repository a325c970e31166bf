//! The byte-store interface a segment store writes through.

use crate::error::StorageResult;

/// Append-only bytes underneath one segment store file.
///
/// A backend never interprets what it holds. The segment store owns the
/// `[length][payload]` frame format and only asks for positional reads,
/// appends and size.
///
/// # Contract
///
/// - `append` returns the position its bytes start at; the bytes of one
///   call are never interleaved with those of another
/// - reads see every appended byte, flushed or not
/// - `size` is where the next `append` will start
/// - after `sync` every appended byte is durable
/// - implementations are `Send + Sync` so a log can be shared by threads
///
/// # Implementors
///
/// - [`super::FileBackend`] - buffered, file-backed
/// - [`super::InMemoryBackend`] - `Vec`-backed, for tests
pub trait StorageBackend: Send + Sync {
    /// Returns the `len` bytes starting at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the range is not
    /// fully written, or an I/O error.
    fn read_at(&self, position: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Fills `buf` with the bytes starting at `position` and returns
    /// `buf.len()`.
    ///
    /// # Errors
    ///
    /// Same as [`StorageBackend::read_at`].
    fn read_into(&self, position: u64, buf: &mut [u8]) -> StorageResult<usize>;

    /// Appends `data` and returns the position it starts at.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Hands buffered bytes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Logical size in bytes, buffered bytes included.
    fn size(&self) -> u64;

    /// Flushes, then forces data and metadata to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or the fsync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Cuts the data down to `new_size` bytes.
    ///
    /// Only crash recovery calls this, to drop a torn tail no index entry
    /// points at.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::TruncateBeyondEnd`] if `new_size` is
    /// larger than the current size, or an I/O error.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
