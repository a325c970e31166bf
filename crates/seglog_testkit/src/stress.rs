//! Stress tests for seglog.
//!
//! These helpers drive a log under heavy load and concurrent access.

use seglog_core::Log;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Counts and timing of one stress run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Operations attempted.
    pub total_ops: usize,
    /// Operations that behaved as expected.
    pub successful_ops: usize,
    /// Operations that errored or saw the wrong record.
    pub failed_ops: usize,
    /// Wall-clock time of the run.
    pub duration: Duration,
}

impl StressTestResult {
    /// Builds a result from success and failure counts.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        Self {
            total_ops: successful + failed,
            successful_ops: successful,
            failed_ops: failed,
            duration,
        }
    }

    /// Operations per second, or zero for an instant run.
    pub fn ops_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total_ops as f64 / secs
        } else {
            0.0
        }
    }

    /// Whether no operation failed.
    pub fn is_clean(&self) -> bool {
        self.failed_ops == 0
    }
}

impl std::fmt::Display for StressTestResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ops ({} ok, {} failed) in {:?}, {:.0} ops/s",
            self.total_ops,
            self.successful_ops,
            self.failed_ops,
            self.duration,
            self.ops_per_second()
        )
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Appends per producer thread.
    pub operations: usize,
    /// Number of producer threads.
    pub producers: usize,
    /// Number of tailing consumer threads.
    pub consumers: usize,
    /// Size of each payload in bytes.
    pub payload_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            producers: 4,
            consumers: 2,
            payload_size: 128,
        }
    }
}

impl StressConfig {
    /// Total number of appends across every producer.
    pub fn total_appends(&self) -> usize {
        self.operations * self.producers
    }
}

/// Run a single-threaded append stress test.
pub fn stress_sequential_appends(log: &Log, config: &StressConfig) -> StressTestResult {
    let payload = vec![0xABu8; config.payload_size];

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for _ in 0..config.total_appends() {
        match log.append(&payload) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a sequential read stress test over every retained offset.
pub fn stress_sequential_reads(log: &Log) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for offset in log.lowest_offset()..log.next_offset() {
        match log.read(offset) {
            Ok(record) if record.offset == offset => successful += 1,
            _ => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run concurrent producers against one log.
///
/// An append counts as failed if it errors or returns an offset another
/// producer also got.
pub fn stress_concurrent_appends(log: &Arc<Log>, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();

    let handles: Vec<_> = (0..config.producers)
        .map(|_| {
            let log = Arc::clone(log);
            let operations = config.operations;
            let payload = vec![0xCDu8; config.payload_size];
            thread::spawn(move || {
                let mut offsets = Vec::with_capacity(operations);
                let mut failed = 0usize;
                for _ in 0..operations {
                    match log.append(&payload) {
                        Ok(offset) => offsets.push(offset),
                        Err(_) => failed += 1,
                    }
                }
                (offsets, failed)
            })
        })
        .collect();

    let mut offsets = Vec::new();
    let mut failed = 0usize;
    for handle in handles {
        match handle.join() {
            Ok((produced, errors)) => {
                offsets.extend(produced);
                failed += errors;
            }
            Err(_) => failed += config.operations,
        }
    }

    let produced = offsets.len();
    offsets.sort_unstable();
    offsets.dedup();
    let duplicates = produced - offsets.len();

    StressTestResult::new(offsets.len(), failed + duplicates, start.elapsed())
}

/// Run producers and tailing consumers at the same time.
///
/// Each consumer subscribes at the log's next offset before any producer
/// starts and must see every appended record, in offset order, with no gap.
/// Successful operations count appends plus records consumed in order.
pub fn stress_produce_consume(log: &Arc<Log>, config: &StressConfig) -> StressTestResult {
    let total = config.total_appends();
    let from = log.next_offset();

    let consumers: Vec<_> = (0..config.consumers)
        .map(|_| {
            let subscription = log.subscribe(from).with_backoff(Duration::from_millis(10));
            thread::spawn(move || {
                let mut expected = from;
                let mut in_order = 0usize;
                let mut failed = 0usize;
                for record in subscription.take(total) {
                    match record {
                        Ok(record) if record.offset == expected => in_order += 1,
                        _ => failed += 1,
                    }
                    expected += 1;
                }
                (in_order, failed)
            })
        })
        .collect();

    let produced = stress_concurrent_appends(log, config);

    let mut successful = produced.successful_ops;
    let mut failed = produced.failed_ops;
    for consumer in consumers {
        match consumer.join() {
            Ok((ok, errors)) => {
                successful += ok;
                failed += errors;
            }
            Err(_) => failed += total,
        }
    }

    StressTestResult::new(successful, failed, produced.duration)
}
