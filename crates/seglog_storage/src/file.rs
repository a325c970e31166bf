//! Buffered file backend for segment store files.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Default capacity of the write buffer in front of the file.
pub const DEFAULT_WRITE_BUFFER: usize = 8 * 1024;

/// Store bytes kept in one file, with appends buffered in memory.
///
/// Writes go through a [`BufWriter`] on an append-mode handle; reads seek a
/// separate read-only handle. `flush` pushes the buffer to the OS and
/// `sync` additionally fsyncs the file.
///
/// A read that reaches into bytes still sitting in the buffer flushes the
/// writer first, so earlier appends are always visible.
///
/// ```no_run
/// use seglog_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("0.store")).unwrap();
/// let start = backend.append(b"frame bytes").unwrap();
/// assert_eq!(backend.read_at(start, 5).unwrap(), b"frame");
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    reader: Mutex<File>,
    /// Logical size, buffered bytes included.
    size: RwLock<u64>,
    /// Bytes known to have reached the file.
    flushed: RwLock<u64>,
}

impl FileBackend {
    /// Opens `path`, creating it if missing, with the default buffer.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::with_buffer_capacity(path, DEFAULT_WRITE_BUFFER)
    }

    /// Like [`FileBackend::open`], with a write buffer of `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn with_buffer_capacity(path: &Path, capacity: usize) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;
        let size = file.metadata()?.len();
        let reader = File::open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::with_capacity(capacity, file)),
            reader: Mutex::new(reader),
            size: RwLock::new(size),
            flushed: RwLock::new(size),
        })
    }

    /// File this backend writes to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rejects ranges past the logical end, and flushes the writer when the
    /// range reaches into buffered bytes.
    fn check_bounds(&self, position: u64, len: usize) -> StorageResult<()> {
        let size = *self.size.read();
        let end = position.saturating_add(len as u64);
        if end > size {
            return Err(StorageError::ReadPastEnd {
                position,
                len,
                size,
            });
        }

        if end > *self.flushed.read() {
            let mut writer = self.writer.lock();
            writer.flush()?;
            *self.flushed.write() = *self.size.read();
        }
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, position: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        self.read_into(position, &mut buffer)?;
        Ok(buffer)
    }

    fn read_into(&self, position: u64, buf: &mut [u8]) -> StorageResult<usize> {
        self.check_bounds(position, buf.len())?;
        if buf.is_empty() {
            return Ok(0);
        }

        let mut file = self.reader.lock();
        file.seek(SeekFrom::Start(position))?;
        file.read_exact(buf)?;
        Ok(buf.len())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut writer = self.writer.lock();
        let mut size = self.size.write();
        let position = *size;
        if data.is_empty() {
            return Ok(position);
        }

        writer.write_all(data)?;
        *size += data.len() as u64;
        Ok(position)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.writer.lock().flush()?;
        *self.flushed.write() = *self.size.read();
        Ok(())
    }

    fn size(&self) -> u64 {
        *self.size.read()
    }

    fn sync(&mut self) -> StorageResult<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        writer.get_ref().sync_all()?;
        *self.flushed.write() = *self.size.read();
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut writer = self.writer.lock();
        let mut size = self.size.write();

        if new_size > *size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size: *size,
            });
        }

        writer.flush()?;
        writer.get_ref().set_len(new_size)?;
        writer.get_ref().sync_all()?;
        *size = new_size;
        *self.flushed.write() = new_size;

        Ok(())
    }
}
