//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use rand::Rng;
use seglog_core::{Config, Log};
use tempfile::TempDir;

/// Random bytes of length `size`.
pub fn random_payload(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` offsets drawn uniformly from `lowest..next`.
pub fn random_offsets(lowest: u64, next: u64, count: usize) -> Vec<u64> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| rng.gen_range(lowest..next)).collect()
}

/// Opens a log in a fresh temp dir and fills it with `records` payloads of
/// `payload_size` bytes. The dir must outlive the log.
pub fn populated_log(config: Config, records: usize, payload_size: usize) -> (TempDir, Log) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let log = Log::open(dir.path(), config).expect("Failed to open log");
    let payload = random_payload(payload_size);
    for _ in 0..records {
        log.append(&payload).expect("Failed to append");
    }
    (dir, log)
}
