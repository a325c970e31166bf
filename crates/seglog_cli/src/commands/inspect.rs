//! Inspect command implementation.

use super::open_existing;
use seglog_core::{Config, Log};
use serde::Serialize;
use std::path::Path;

/// Log inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log directory.
    pub path: String,
    /// Lowest retained offset.
    pub lowest_offset: u64,
    /// Offset of the last record, if any.
    pub highest_offset: Option<u64>,
    /// Offset the next record will get.
    pub next_offset: u64,
    /// Total store bytes across segments.
    pub store_bytes: u64,
    /// Total index bytes across segments.
    pub index_bytes: u64,
    /// Per-segment details.
    pub segments: Vec<SegmentStats>,
}

/// Statistics for a single segment.
#[derive(Debug, Serialize)]
pub struct SegmentStats {
    /// First offset of the segment.
    pub base_offset: u64,
    /// Offset after the segment's last record.
    pub next_offset: u64,
    /// Number of records.
    pub records: u64,
    /// Store size in bytes.
    pub store_bytes: u64,
    /// Index bytes in use.
    pub index_bytes: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, config: Config, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let log = open_existing(path, config)?;
    let result = inspect(&log);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    log.close()?;
    Ok(())
}

/// Collects offsets and segment sizes of `log`.
pub fn inspect(log: &Log) -> InspectResult {
    let segments: Vec<SegmentStats> = log
        .segments()
        .into_iter()
        .map(|info| SegmentStats {
            base_offset: info.base_offset,
            next_offset: info.next_offset,
            records: info.len(),
            store_bytes: info.store_bytes,
            index_bytes: info.index_bytes,
        })
        .collect();

    InspectResult {
        path: log.dir().display().to_string(),
        lowest_offset: log.lowest_offset(),
        highest_offset: log.highest_offset(),
        next_offset: log.next_offset(),
        store_bytes: segments.iter().map(|s| s.store_bytes).sum(),
        index_bytes: segments.iter().map(|s| s.index_bytes).sum(),
        segments,
    }
}

fn print_text_output(result: &InspectResult) {
    println!("seglog Log Inspection");
    println!("=====================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Offsets:");
    println!("  Lowest:  {}", result.lowest_offset);
    match result.highest_offset {
        Some(highest) => println!("  Highest: {highest}"),
        None => println!("  Highest: (empty)"),
    }
    println!("  Next:    {}", result.next_offset);
    println!();
    println!("Storage:");
    println!("  Store size: {}", format_size(result.store_bytes));
    println!("  Index size: {}", format_size(result.index_bytes));
    println!();
    println!("Segments ({}):", result.segments.len());
    for seg in &result.segments {
        println!(
            "  [{}..{}) {} records, store {}, index {}",
            seg.base_offset,
            seg.next_offset,
            seg.records,
            format_size(seg.store_bytes),
            format_size(seg.index_bytes)
        );
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
