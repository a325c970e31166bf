//! Truncate command implementation.

use super::open_existing;
use seglog_core::{Config, CoreResult, Log};
use std::path::Path;

/// Runs the truncate command.
pub fn run(path: &Path, config: Config, lowest: u64) -> Result<(), Box<dyn std::error::Error>> {
    let log = open_existing(path, config)?;

    let removed = truncate(&log, lowest)?;
    println!(
        "Removed {removed} segment(s); lowest offset is now {}",
        log.lowest_offset()
    );

    log.close()?;
    Ok(())
}

/// Truncates below `lowest` and returns how many segments went away.
fn truncate(log: &Log, lowest: u64) -> CoreResult<usize> {
    let before = log.segment_count();
    log.truncate(lowest)?;
    let removed = before.saturating_sub(log.segment_count());
    tracing::info!(lowest, removed, "truncated log");
    Ok(removed)
}
