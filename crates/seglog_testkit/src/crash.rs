//! Crash simulation for seglog.
//!
//! A crash is simulated by leaking a log without running any close path:
//! buffered store bytes never reach the file and index files keep their
//! preallocated length. Helpers here also damage segment files directly to
//! model torn writes.

use seglog_core::{index_path, store_path, Config, Log};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Abandons `log` as if the process died. No flush, no sync, no index trim.
pub fn simulate_crash(log: Log) {
    std::mem::forget(log);
}

/// Appends `bytes` of garbage to the store of the segment at `base_offset`,
/// modelling a frame that was only partly written.
pub fn tear_store_tail(dir: &Path, base_offset: u64, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .append(true)
        .open(store_path(dir, base_offset))?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Shrinks the store of the segment at `base_offset` by `by` bytes.
pub fn cut_store(dir: &Path, base_offset: u64, by: u64) -> io::Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .open(store_path(dir, base_offset))?;
    let len = file.metadata()?.len();
    file.set_len(len.saturating_sub(by))?;
    file.sync_all()
}

/// Whether the index of the segment at `base_offset` still has its
/// preallocated length, which marks an unclean shutdown.
pub fn index_is_preallocated(dir: &Path, base_offset: u64, config: &Config) -> io::Result<bool> {
    let len = std::fs::metadata(index_path(dir, base_offset))?.len();
    Ok(len == config.max_index_bytes)
}

/// Outcome of a crash scenario.
#[derive(Debug, Clone)]
pub struct CrashRecoveryResult {
    /// Whether the log reopened consistently.
    pub passed: bool,
    /// What was tested.
    pub description: String,
    /// Records appended before the crash.
    pub appended: u64,
    /// Records readable after recovery.
    pub recovered: u64,
    /// Any error message.
    pub error: Option<String>,
}

/// Appends `count` records to an empty directory, crashes, reopens and
/// checks that the recovered range starts at the initial offset, that every
/// offset in it reads back the payload written there and that appends
/// continue at its end.
pub fn crash_and_recover(dir: &Path, config: Config, count: u64) -> CrashRecoveryResult {
    let description = format!("crash after {count} appends");
    let fail = |error: String, recovered: u64| CrashRecoveryResult {
        passed: false,
        description: description.clone(),
        appended: count,
        recovered,
        error: Some(error),
    };

    let log = match Log::open(dir, config.clone()) {
        Ok(log) => log,
        Err(e) => return fail(e.to_string(), 0),
    };
    for i in 0..count {
        if let Err(e) = log.append(i.to_string().as_bytes()) {
            return fail(e.to_string(), 0);
        }
    }
    simulate_crash(log);

    let log = match Log::open(dir, config.clone()) {
        Ok(log) => log,
        Err(e) => return fail(format!("reopen failed: {e}"), 0),
    };

    let initial = config.initial_offset;
    let lowest = log.lowest_offset();
    let next = log.next_offset();
    if lowest != initial || next < lowest || next - lowest > count {
        let written = initial + count;
        return fail(format!("recovered range {lowest}..{next} outside {initial}..{written}"), 0);
    }

    let mut recovered = 0;
    for offset in lowest..next {
        let expected = (offset - initial).to_string();
        match log.read(offset) {
            Ok(record) if record.payload == expected.as_bytes() => recovered += 1,
            Ok(_) => return fail(format!("payload mismatch at {offset}"), recovered),
            Err(e) => return fail(format!("offset {offset}: {e}"), recovered),
        }
    }

    match log.append(b"after") {
        Ok(offset) if offset == next => {}
        Ok(offset) => return fail(format!("append got {offset}, expected {next}"), recovered),
        Err(e) => return fail(e.to_string(), recovered),
    }

    CrashRecoveryResult {
        passed: recovered == next - lowest,
        description,
        appended: count,
        recovered,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seglog_core::ENTRY_WIDTH;
    use tempfile::tempdir;

    #[test]
    fn crash_leaves_index_preallocated() {
        let dir = tempdir().unwrap();
        let config = Config::default();
        let log = Log::open(dir.path(), config.clone()).unwrap();
        log.append(b"x").unwrap();
        simulate_crash(log);

        assert!(index_is_preallocated(dir.path(), 0, &config).unwrap());
    }

    #[test]
    fn recovers_after_crash_across_segments() {
        let dir = tempdir().unwrap();
        let config = Config::new().max_index_bytes(ENTRY_WIDTH * 4);

        let result = crash_and_recover(dir.path(), config, 18);
        assert!(result.passed, "{result:?}");
        // Sealed segments are flushed on rotation.
        assert!(result.recovered >= 16);
    }

    #[test]
    fn recovers_from_initial_offset() {
        let dir = tempdir().unwrap();
        let config = Config::new()
            .max_index_bytes(ENTRY_WIDTH * 3)
            .initial_offset(500);

        let result = crash_and_recover(dir.path(), config, 10);
        assert!(result.passed, "{result:?}");
        assert!(result.recovered >= 9);
    }

    #[test]
    fn torn_tail_is_dropped() {
        let dir = tempdir().unwrap();
        let config = Config::default();
        {
            let log = Log::open(dir.path(), config.clone()).unwrap();
            log.append(b"kept").unwrap();
            log.close().unwrap();
        }
        tear_store_tail(dir.path(), 0, &[0, 0, 0, 0, 0, 0, 1, 0, 7]).unwrap();

        let log = Log::open(dir.path(), config).unwrap();
        assert_eq!(log.next_offset(), 1);
        assert_eq!(log.append(b"next").unwrap(), 1);
        assert_eq!(log.read(1).unwrap().payload, b"next");
    }

    #[test]
    fn cut_store_behind_clean_index_is_an_error() {
        let dir = tempdir().unwrap();
        let config = Config::default();
        {
            let log = Log::open(dir.path(), config.clone()).unwrap();
            log.append(b"first").unwrap();
            log.append(b"second").unwrap();
            log.close().unwrap();
        }
        cut_store(dir.path(), 0, 3).unwrap();

        assert!(Log::open(dir.path(), config).is_err());
    }
}
