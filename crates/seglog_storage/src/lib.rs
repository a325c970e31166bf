//! # seglog storage
//!
//! Byte-store backends for the seglog commit log.
//!
//! This crate is the lowest layer of the log. A backend is an **opaque,
//! append-only byte store**: it knows nothing about frames, records,
//! offsets or indexes. The segment store in `seglog_core` owns the frame
//! format and drives a backend through the [`StorageBackend`] trait.
//!
//! ## Design Principles
//!
//! - Backends only append, read by position, flush, sync and shrink
//! - Reads issued by the same process always observe earlier appends,
//!   even while those bytes still sit in a write buffer
//! - Must be `Send + Sync` so a log can be shared across threads
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - Buffered, persistent storage using OS file APIs
//! - [`InMemoryBackend`] - For testing and ephemeral logs
//!
//! ## Example
//!
//! ```rust
//! use seglog_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::{FileBackend, DEFAULT_WRITE_BUFFER};
pub use memory::InMemoryBackend;
