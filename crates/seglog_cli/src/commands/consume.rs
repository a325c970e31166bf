//! Consume command implementation.

use super::{display_payload, open_existing};
use seglog_core::{Config, Log, Record};
use std::path::Path;
use std::sync::Arc;

/// Runs the consume command.
///
/// Without `follow`, prints records from `offset` until the end of the log
/// or `limit`. With `follow`, keeps waiting for new records until `limit`
/// records were printed.
pub fn run(
    path: &Path,
    config: Config,
    offset: Option<u64>,
    limit: Option<usize>,
    follow: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let log = Arc::new(open_existing(path, config)?);
    let start = offset.unwrap_or_else(|| log.lowest_offset());
    let limit = limit.unwrap_or(usize::MAX);

    if follow {
        for record in log.subscribe(start).take(limit) {
            print_record(&record?);
        }
    } else {
        for record in read_range(&log, start, limit)? {
            print_record(&record);
        }
    }

    log.close()?;
    Ok(())
}

/// Reads up to `limit` records starting at `start`, stopping at the end of
/// the log.
pub fn read_range(log: &Log, start: u64, limit: usize) -> seglog_core::CoreResult<Vec<Record>> {
    let end = log.next_offset();
    let mut records = Vec::new();

    for offset in start..end {
        if records.len() >= limit {
            break;
        }
        match log.read(offset) {
            Ok(record) => records.push(record),
            Err(e) if e.is_offset_out_of_range() => {
                tracing::debug!(offset, "skipping missing offset");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(records)
}

fn print_record(record: &Record) {
    println!("{}\t{}", record.offset, display_payload(&record.payload));
}
