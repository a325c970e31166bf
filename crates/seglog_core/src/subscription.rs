//! Tailing subscriptions.
//!
//! A subscription yields records in offset order starting at a given
//! offset, then blocks for new appends once it catches up with the end of
//! the log.
//!
//! # Usage
//!
//! ```rust,no_run
//! use seglog_core::{Config, Log};
//! use std::sync::Arc;
//!
//! let log = Arc::new(Log::open("/tmp/seglog", Config::default())?);
//! let subscription = log.subscribe(0);
//! let cancel = subscription.cancel_handle();
//!
//! std::thread::spawn(move || {
//!     for record in subscription {
//!         let record = record?;
//!         println!("{}: {} bytes", record.offset, record.payload.len());
//!     }
//!     Ok::<(), seglog_core::CoreError>(())
//! });
//!
//! log.append(b"event")?;
//! cancel.cancel();
//! # Ok::<(), seglog_core::CoreError>(())
//! ```

use crate::error::CoreResult;
use crate::log::Log;
use crate::record::Record;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default upper bound on a single wait for new records.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(100);

/// A blocking iterator over the records of a log, starting at a fixed
/// offset and following new appends.
///
/// `next` returns `None` only once cancelled. Any error other than
/// [`CoreError::OffsetOutOfRange`](crate::CoreError::OffsetOutOfRange) is
/// yielded once and ends the iteration.
pub struct Subscription {
    log: Arc<Log>,
    next: u64,
    backoff: Duration,
    cancelled: Arc<AtomicBool>,
    /// The current offset is below the log's end but was unreadable.
    stalled: bool,
    finished: bool,
}

impl Subscription {
    pub(crate) fn new(log: Arc<Log>, from: u64) -> Self {
        Self {
            log,
            next: from,
            backoff: DEFAULT_BACKOFF,
            cancelled: Arc::new(AtomicBool::new(false)),
            stalled: false,
            finished: false,
        }
    }

    /// Sets the longest single wait between read attempts.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns a handle that stops this subscription from another thread.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
            log: Arc::clone(&self.log),
        }
    }

    /// Offset of the next record to be yielded.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.next
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Iterator for Subscription {
    type Item = CoreResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished || self.is_cancelled() {
                return None;
            }

            match self.log.read(self.next) {
                Ok(record) => {
                    self.next += 1;
                    self.stalled = false;
                    return Some(Ok(record));
                }
                Err(e) if e.is_offset_out_of_range() => {
                    let produced = self.log.next_offset() > self.next;
                    if produced && !self.stalled {
                        // Appended since the read, or truncated away.
                        self.stalled = true;
                        continue;
                    }
                    self.log
                        .wait_for_append(self.next, self.backoff, self.stalled, &self.cancelled);
                }
                Err(e) => {
                    tracing::debug!(offset = self.next, error = %e, "subscription ended");
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("next", &self.next)
            .field("backoff", &self.backoff)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Stops a [`Subscription`], waking it if blocked.
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
    log: Arc<Log>,
}

impl CancelHandle {
    /// Cancels the subscription. Its next `next` call returns `None`.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.log.notify_waiters();
    }

    /// Whether [`CancelHandle::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
