//! Test fixtures and log helpers.
//!
//! Provides convenience functions for setting up temporary logs and common
//! test scenarios.

use seglog_core::{Config, Log, ENTRY_WIDTH};
use std::path::Path;
use tempfile::TempDir;

/// A log in a temporary directory that is deleted on drop.
pub struct TestLog {
    /// The log instance.
    pub log: Log,
    config: Config,
    /// Declared last so the log closes before the directory goes.
    temp_dir: TempDir,
}

impl TestLog {
    /// Creates a log with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a log with `config`.
    pub fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log = Log::open(temp_dir.path(), config.clone()).expect("Failed to open log");
        Self {
            log,
            config,
            temp_dir,
        }
    }

    /// Creates a log whose segments hold at most `entries` records each.
    pub fn with_segment_entries(entries: u64) -> Self {
        Self::with_config(Config::new().max_index_bytes(ENTRY_WIDTH * entries))
    }

    /// Directory holding the segment files.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Closes the log cleanly and opens it again from disk.
    pub fn reopen(&mut self) {
        self.log.close().expect("Failed to close log");
        self.log = Log::open(self.temp_dir.path(), self.config.clone()).expect("Failed to reopen log");
    }
}

impl Default for TestLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestLog {
    type Target = Log;

    fn deref(&self) -> &Self::Target {
        &self.log
    }
}

/// Runs a test with a temporary log.
///
/// # Example
///
/// ```rust
/// use seglog_testkit::with_temp_log;
///
/// with_temp_log(|log| {
///     assert_eq!(log.append(b"a").unwrap(), 0);
/// });
/// ```
pub fn with_temp_log<F, R>(f: F) -> R
where
    F: FnOnce(&Log) -> R,
{
    let test_log = TestLog::new();
    f(&test_log.log)
}

/// Runs a test with a temporary log and its directory.
pub fn with_temp_log_at<F, R>(config: Config, f: F) -> R
where
    F: FnOnce(&Log, &Path) -> R,
{
    let test_log = TestLog::with_config(config);
    f(&test_log.log, test_log.path())
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a log holding `count` records whose payloads are their index
    /// as text.
    pub fn populated_log(count: usize, entries_per_segment: u64) -> TestLog {
        let test_log = TestLog::with_segment_entries(entries_per_segment);
        for i in 0..count {
            test_log
                .append(i.to_string().as_bytes())
                .expect("Failed to append record");
        }
        test_log
    }
}
