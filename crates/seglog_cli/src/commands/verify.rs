//! Verify command implementation.

use super::open_existing;
use seglog_core::{Config, Log};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of offsets checked.
    pub records_checked: u64,
    /// Number of records that read back intact.
    pub valid_records: u64,
    /// Offsets inside a segment's range with no record.
    pub missing: Vec<u64>,
    /// Offset ranges between consecutive segments that no segment covers.
    /// Tolerated, and reported for information only.
    pub gaps: Vec<(u64, u64)>,
    /// Offsets whose record failed to decode, with the error.
    pub corrupt: Vec<(u64, String)>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.corrupt.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying log at {}", path.display());
    println!();

    let log = open_existing(path, config)?;
    let result = verify(&log);
    log.close()?;

    print_result(&result);
    if !result.is_ok() {
        return Err("log verification failed".into());
    }
    Ok(())
}

/// Reads every offset held by each segment and classifies failures.
pub fn verify(log: &Log) -> VerifyResult {
    let mut result = VerifyResult::default();
    let mut expected_base = None;

    for segment in log.segments() {
        if let Some(end) = expected_base.filter(|&end| end < segment.base_offset) {
            tracing::warn!(from = end, to = segment.base_offset, "gap between segments");
            result.gaps.push((end, segment.base_offset));
        }
        expected_base = Some(segment.next_offset);

        for offset in segment.base_offset..segment.next_offset {
            result.records_checked += 1;
            match log.read(offset) {
                Ok(record) if record.offset == offset => result.valid_records += 1,
                Ok(record) => result
                    .corrupt
                    .push((offset, format!("record carries offset {}", record.offset))),
                Err(e) if e.is_offset_out_of_range() => result.missing.push(offset),
                Err(e) => result.corrupt.push((offset, e.to_string())),
            }
        }
    }

    result
}

fn print_result(result: &VerifyResult) {
    println!("  Records checked: {}", result.records_checked);
    println!("  Valid records:   {}", result.valid_records);
    println!("  Missing records: {}", result.missing.len());
    println!("  Corrupt records: {}", result.corrupt.len());
    println!("  Segment gaps:    {}", result.gaps.len());

    for (from, to) in &result.gaps {
        println!("    - offsets {from}..{to}: not covered by any segment");
    }

    for offset in &result.missing {
        println!("    - offset {offset}: missing");
    }
    for (offset, error) in &result.corrupt {
        println!("    - offset {offset}: {error}");
    }

    println!();
    if result.is_ok() {
        println!("Log is healthy.");
    } else {
        println!("Log has problems.");
    }
}
