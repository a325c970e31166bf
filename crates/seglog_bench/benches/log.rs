//! Commit log benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use seglog_bench::{populated_log, random_offsets, random_payload};
use seglog_core::{Config, Log};
use std::io::Read;
use std::sync::Arc;
use tempfile::TempDir;

/// Large segments, so appends rarely rotate.
fn large_segments() -> Config {
    Config::new()
        .max_store_bytes(64 * 1024 * 1024)
        .max_index_bytes(12 * 1024 * 1024)
}

/// Benchmark appends of various payload sizes.
fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_append");
    group.sample_size(50);

    for size in [64, 256, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let log = Log::open(temp_dir.path(), large_segments()).unwrap();
            let payload = random_payload(size);

            b.iter(|| {
                let offset = log.append(black_box(&payload)).unwrap();
                black_box(offset);
            });
        });
    }

    group.finish();
}

/// Benchmark appends that rotate segments often.
fn bench_append_with_rotation(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_append_rotating");
    group.sample_size(20);

    group.bench_function("1000x64_16_per_segment", |b| {
        let payload = random_payload(64);

        b.iter(|| {
            let temp_dir = TempDir::new().unwrap();
            let log = Log::open(temp_dir.path(), Config::new().max_index_bytes(12 * 16)).unwrap();
            for _ in 0..1000 {
                log.append(black_box(&payload)).unwrap();
            }
            black_box(log.segment_count());
        });
    });

    group.finish();
}

/// Benchmark random offset lookups.
fn bench_random_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_random_read");

    for per_segment in [64u64, 1024].iter() {
        group.bench_with_input(
            BenchmarkId::new("10000x256", per_segment),
            per_segment,
            |b, &per_segment| {
                let config = Config::new()
                    .max_store_bytes(u64::MAX / 2)
                    .max_index_bytes(12 * per_segment);
                let (_dir, log) = populated_log(config, 10_000, 256);
                let offsets = random_offsets(log.lowest_offset(), log.next_offset(), 4096);

                let mut idx = 0;
                b.iter(|| {
                    let record = log.read(black_box(offsets[idx])).unwrap();
                    idx = (idx + 1) % offsets.len();
                    black_box(record);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark a full-log scan through the reader.
fn bench_full_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_full_scan");
    group.sample_size(20);

    let (_dir, log) = populated_log(Config::new().max_index_bytes(12 * 256), 10_000, 256);
    let total: u64 = log.segments().iter().map(|s| s.store_bytes).sum();
    group.throughput(Throughput::Bytes(total));

    group.bench_function("10000x256", |b| {
        let mut buf = vec![0u8; 64 * 1024];
        b.iter(|| {
            let mut reader = log.reader().unwrap();
            let mut read = 0usize;
            loop {
                let n = reader.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                read += n;
            }
            black_box(read);
        });
    });

    group.finish();
}

/// Benchmark a subscription catching up on existing records.
fn bench_subscription_catch_up(c: &mut Criterion) {
    let mut group = c.benchmark_group("subscription_catch_up");
    group.sample_size(20);

    let (_dir, log) = populated_log(large_segments(), 10_000, 64);
    let log = Arc::new(log);

    group.bench_function("10000x64", |b| {
        b.iter(|| {
            let count = log.subscribe(0).take(10_000).filter(Result::is_ok).count();
            black_box(count);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_append,
    bench_append_with_rotation,
    bench_random_read,
    bench_full_scan,
    bench_subscription_catch_up,
);

criterion_main!(benches);
