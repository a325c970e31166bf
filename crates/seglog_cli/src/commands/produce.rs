//! Produce command implementation.

use seglog_core::{Config, Log};
use std::io::{self, BufRead};
use std::path::Path;

/// Runs the produce command.
///
/// Appends each payload argument, or each stdin line if none were given,
/// and prints the assigned offsets.
pub fn run(path: &Path, config: Config, payloads: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let log = Log::open(path, config)?;

    let offsets = if payloads.is_empty() {
        let stdin = io::stdin();
        let lines = stdin.lock().lines().collect::<Result<Vec<_>, _>>()?;
        append_all(&log, &lines)?
    } else {
        append_all(&log, payloads)?
    };

    for offset in &offsets {
        println!("{offset}");
    }
    tracing::info!(count = offsets.len(), "produced records");

    log.close()?;
    Ok(())
}

fn append_all(log: &Log, payloads: &[String]) -> seglog_core::CoreResult<Vec<u64>> {
    payloads.iter().map(|p| log.append(p.as_bytes())).collect()
}
