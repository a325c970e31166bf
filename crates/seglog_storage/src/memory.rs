//! In-memory backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// A backend that keeps every appended byte in a `Vec`.
///
/// Used to exercise store framing without touching the filesystem, and to
/// hand a store hand-crafted bytes (torn frames, bad prefixes).
///
/// ```
/// use seglog_storage::{InMemoryBackend, StorageBackend};
///
/// let mut backend = InMemoryBackend::with_data(b"abc".to_vec());
/// assert_eq!(backend.append(b"de").unwrap(), 3);
/// assert_eq!(backend.read_at(2, 2).unwrap(), b"cd");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// An empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that already holds `data`.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Copy of every byte held.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, position: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        self.read_into(position, &mut buffer)?;
        Ok(buffer)
    }

    fn read_into(&self, position: u64, buf: &mut [u8]) -> StorageResult<usize> {
        let data = self.data.read();
        let len = buf.len();
        let past_end = || StorageError::ReadPastEnd {
            position,
            len,
            size: data.len() as u64,
        };

        let start = usize::try_from(position).map_err(|_| past_end())?;
        let bytes = start
            .checked_add(len)
            .and_then(|end| data.get(start..end))
            .ok_or_else(past_end)?;
        buf.copy_from_slice(bytes);
        Ok(buf.len())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let position = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(position)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.read().len() as u64
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }

        // new_size <= len, so it fits in usize.
        data.truncate(new_size as usize);
        Ok(())
    }
}
