//! # seglog core
//!
//! Segmented, append-only commit log engine.
//!
//! This crate provides:
//! - [`Store`] - length-prefixed frames appended to a data file
//! - [`Index`] - memory-mapped table from relative offset to store position
//! - [`Segment`] - a store and an index covering a contiguous offset range
//! - [`Log`] - an ordered list of segments with rotation, truncation and
//!   crash recovery
//! - [`LogReader`] and [`Subscription`] - full-log scans and tailing reads
//!
//! Every record gets a dense, monotonically increasing `u64` offset. Records
//! are never modified after they are written; space is reclaimed only by
//! dropping whole segments from the front of the log.
//!
//! ## Example
//!
//! ```rust
//! use seglog_core::{Config, Log};
//!
//! let dir = tempfile::tempdir()?;
//! let log = Log::open(dir.path(), Config::default())?;
//!
//! let first = log.append(b"first")?;
//! let second = log.append(b"second")?;
//! assert_eq!(second, first + 1);
//! assert_eq!(log.read(first)?.payload, b"first");
//! assert!(log.read(second + 1).unwrap_err().is_offset_out_of_range());
//!
//! log.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
mod index;
mod log;
mod reader;
mod record;
mod segment;
mod store;
mod subscription;

pub use config::{Config, DEFAULT_MAX_INDEX_BYTES, DEFAULT_MAX_STORE_BYTES};
pub use dir::{index_path, scan_base_offsets, store_path, INDEX_EXT, STORE_EXT};
pub use error::{CoreError, CoreResult};
pub use index::{Index, ENTRY_WIDTH, OFFSET_WIDTH, POSITION_WIDTH};
pub use log::Log;
pub use reader::LogReader;
pub use record::{compute_crc32, Record};
pub use segment::{Segment, SegmentInfo};
pub use store::{Store, LEN_WIDTH};
pub use subscription::{CancelHandle, Subscription, DEFAULT_BACKOFF};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
