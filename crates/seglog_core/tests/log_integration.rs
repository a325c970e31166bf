//! Integration tests for the commit log.

use proptest::prelude::*;
use seglog_core::{
    Config, CoreError, Index, Log, Record, Segment, Store, ENTRY_WIDTH, LEN_WIDTH,
};
use std::collections::BTreeSet;
use std::io::Read;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

const PAYLOAD: &[u8] = b"hello world";

fn index_for(entries: u64) -> Config {
    Config::new().max_index_bytes(ENTRY_WIDTH * entries)
}

#[test]
fn offsets_are_dense_from_zero() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), index_for(4)).unwrap();

    let offsets: Vec<u64> = (0..25).map(|_| log.append(PAYLOAD).unwrap()).collect();
    assert_eq!(offsets, (0..25).collect::<Vec<_>>());
    assert_eq!(log.next_offset(), 25);
    assert_eq!(log.highest_offset(), Some(24));
}

#[test]
fn offsets_are_dense_from_initial_offset() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), index_for(4).initial_offset(1000)).unwrap();

    let offsets: Vec<u64> = (0..10).map(|_| log.append(PAYLOAD).unwrap()).collect();
    assert_eq!(offsets, (1000..1010).collect::<Vec<_>>());
    assert_eq!(log.segments()[1].base_offset, 1004);
}

#[test]
fn out_of_range_reads() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), index_for(3)).unwrap();
    for _ in 0..5 {
        log.append(PAYLOAD).unwrap();
    }

    for offset in [5, 6, 1_000, u64::MAX] {
        match log.read(offset) {
            Err(CoreError::OffsetOutOfRange { offset: got }) => assert_eq!(got, offset),
            other => panic!("expected out of range for {offset}, got {other:?}"),
        }
    }
}

#[test]
fn store_framing() {
    let dir = tempdir().unwrap();
    let mut store = Store::open(&dir.path().join("0.store")).unwrap();

    let len = PAYLOAD.len() as u64;
    assert_eq!(store.append(PAYLOAD).unwrap(), (LEN_WIDTH + len, 0));
    assert_eq!(store.append(PAYLOAD).unwrap(), (LEN_WIDTH + len, LEN_WIDTH + len));
}

#[test]
fn index_round_trip_with_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("0.index");

    let mut index = Index::open(&path, 1024).unwrap();
    index.write(0, 0).unwrap();
    index.write(1, 10).unwrap();
    assert_eq!(index.read(-1).unwrap(), (1, 10));
    assert!(matches!(index.read(2), Err(CoreError::EndOfData)));
    index.close().unwrap();

    let index = Index::open(&path, 1024).unwrap();
    assert_eq!(index.read(-1).unwrap(), (1, 10));
    assert!(matches!(index.read(2), Err(CoreError::EndOfData)));
}

#[test]
fn rotation_on_full_index() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), index_for(3)).unwrap();

    for _ in 0..3 {
        log.append(PAYLOAD).unwrap();
    }
    assert_eq!(log.segment_count(), 1);

    assert_eq!(log.append(PAYLOAD).unwrap(), 3);
    let segments = log.segments();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].next_offset, segments[1].base_offset);
    assert_eq!(log.read(3).unwrap().payload, PAYLOAD);
}

#[test]
fn truncation_drops_front_segments() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), index_for(3)).unwrap();
    for _ in 0..9 {
        log.append(PAYLOAD).unwrap();
    }
    let ranges: Vec<(u64, u64)> = log
        .segments()
        .iter()
        .map(|s| (s.base_offset, s.next_offset))
        .collect();
    assert_eq!(ranges, vec![(0, 3), (3, 6), (6, 9)]);

    log.truncate(6).unwrap();

    assert!(!dir.path().join("0.store").exists());
    assert!(!dir.path().join("0.index").exists());
    assert!(!dir.path().join("3.store").exists());
    assert!(!dir.path().join("3.index").exists());
    assert!(log.read(2).unwrap_err().is_offset_out_of_range());
    assert_eq!(log.read(6).unwrap().payload, PAYLOAD);
    assert_eq!(log.lowest_offset(), 6);
}

#[test]
fn full_scan_concatenates_segments() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), index_for(2)).unwrap();
    let payloads: Vec<Vec<u8>> = (0..7u8).map(|i| vec![i; usize::from(i) + 1]).collect();
    for payload in &payloads {
        log.append(payload).unwrap();
    }
    assert_eq!(log.segment_count(), 4);

    let mut reader = log.reader().unwrap();
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).unwrap();

    let mut cursor = bytes.as_slice();
    for (offset, payload) in payloads.iter().enumerate() {
        let (prefix, rest) = cursor.split_at(LEN_WIDTH as usize);
        let len = u64::from_be_bytes(prefix.try_into().unwrap()) as usize;
        let record = Record::decode(&rest[..len]).unwrap();
        assert_eq!(record.offset, offset as u64);
        assert_eq!(&record.payload, payload);
        cursor = &rest[len..];
    }
    assert!(cursor.is_empty());

    let mut buf = [0u8; 16];
    assert_eq!(reader.read(&mut buf).unwrap(), 0);
}

#[test]
fn reader_does_not_hold_off_appends() {
    let dir = tempdir().unwrap();
    let log = Arc::new(Log::open(dir.path(), index_for(2)).unwrap());
    for _ in 0..3 {
        log.append(PAYLOAD).unwrap();
    }

    let mut reader = log.reader().unwrap();
    let frame = LEN_WIDTH + (Record::HEADER_SIZE + PAYLOAD.len()) as u64;
    assert_eq!(reader.total_len(), 3 * frame);

    let producer = {
        let log = Arc::clone(&log);
        thread::spawn(move || (0..5).map(|_| log.append(PAYLOAD).unwrap()).collect::<Vec<_>>())
    };
    // Read-side calls on this thread while the producer needs the write lock.
    assert_eq!(log.read(0).unwrap().payload, PAYLOAD);
    assert_eq!(log.lowest_offset(), 0);
    assert_eq!(producer.join().unwrap(), (3..8).collect::<Vec<_>>());

    // Records appended after the reader was created are not streamed.
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).unwrap();
    assert_eq!(bytes.len() as u64, 3 * frame);
}

#[test]
fn reader_fails_on_truncated_segment() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), index_for(2)).unwrap();
    for _ in 0..5 {
        log.append(PAYLOAD).unwrap();
    }

    let mut reader = log.reader().unwrap();
    log.truncate(2).unwrap();

    let mut bytes = Vec::new();
    let err = reader.read_to_end(&mut bytes).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
}

#[test]
fn gap_between_segments_is_tolerated() {
    let dir = tempdir().unwrap();
    let config = index_for(8);
    {
        let mut first = Segment::open(dir.path(), 0, &config).unwrap();
        for _ in 0..3 {
            first.append(&mut Record::new(PAYLOAD.to_vec())).unwrap();
        }
        first.close().unwrap();
        Segment::open(dir.path(), 10, &config).unwrap().close().unwrap();
    }

    let log = Log::open(dir.path(), config).unwrap();
    assert_eq!(log.segment_count(), 2);
    assert_eq!(log.read(2).unwrap().payload, PAYLOAD);
    assert!(matches!(
        log.read(5),
        Err(CoreError::OffsetOutOfRange { offset: 5 })
    ));
    assert!(matches!(
        log.read(3),
        Err(CoreError::OffsetOutOfRange { offset: 3 })
    ));
    assert_eq!(log.next_offset(), 10);
    assert_eq!(log.append(PAYLOAD).unwrap(), 10);
}

#[test]
fn reopen_after_truncate_and_rotation() {
    let dir = tempdir().unwrap();
    {
        let log = Log::open(dir.path(), index_for(3)).unwrap();
        for _ in 0..10 {
            log.append(PAYLOAD).unwrap();
        }
        log.truncate(4).unwrap();
        log.close().unwrap();
    }

    let log = Log::open(dir.path(), index_for(3)).unwrap();
    assert_eq!(log.lowest_offset(), 3);
    assert_eq!(log.next_offset(), 10);
    assert_eq!(log.append(PAYLOAD).unwrap(), 10);
    for offset in 3..11 {
        assert_eq!(log.read(offset).unwrap().offset, offset);
    }
}

#[test]
fn unclean_shutdown_recovers_consistent_prefix() {
    let dir = tempdir().unwrap();
    {
        let log = Log::open(dir.path(), index_for(8)).unwrap();
        for _ in 0..20 {
            log.append(PAYLOAD).unwrap();
        }
        // Skip every close path: buffered frames and index trims are lost.
        std::mem::forget(log);
    }

    let log = Log::open(dir.path(), index_for(8)).unwrap();
    let next = log.next_offset();
    assert!(next <= 20);
    for offset in log.lowest_offset()..next {
        assert_eq!(log.read(offset).unwrap().payload, PAYLOAD);
    }
    assert_eq!(log.append(PAYLOAD).unwrap(), next);
}

#[test]
fn unclean_shutdown_then_reopen_with_larger_index() {
    let dir = tempdir().unwrap();
    let store_len = {
        let mut segment = Segment::open(dir.path(), 0, &index_for(10)).unwrap();
        for _ in 0..3 {
            segment.append(&mut Record::new(PAYLOAD.to_vec())).unwrap();
        }
        segment.flush().unwrap();
        let len = segment.store_size();
        // The index keeps its preallocated length.
        std::mem::forget(segment);
        len
    };
    let store_path = dir.path().join("0.store");
    assert_eq!(std::fs::metadata(&store_path).unwrap().len(), store_len);

    let log = Log::open(dir.path(), index_for(20)).unwrap();
    assert_eq!(log.next_offset(), 3);
    for offset in 0..3 {
        assert_eq!(log.read(offset).unwrap().payload, PAYLOAD);
    }
    assert_eq!(std::fs::metadata(&store_path).unwrap().len(), store_len);

    let info = &log.segments()[0];
    assert_eq!(info.index_bytes, 3 * ENTRY_WIDTH);
    assert_eq!(info.len(), 3);
    assert_eq!(log.append(PAYLOAD).unwrap(), 3);
}

#[test]
fn non_segment_files_are_ignored() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("README"), b"not a segment").unwrap();
    std::fs::write(dir.path().join("lock.tmp"), b"").unwrap();

    let log = Log::open(dir.path(), Config::default()).unwrap();
    assert_eq!(log.segment_count(), 1);
    assert_eq!(log.append(PAYLOAD).unwrap(), 0);
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempdir().unwrap();
    let err = Log::open(dir.path(), Config::new().max_index_bytes(ENTRY_WIDTH - 1)).unwrap_err();
    assert!(matches!(err, CoreError::InvalidConfig { .. }));
}

#[test]
fn concurrent_producers_get_distinct_offsets() {
    let dir = tempdir().unwrap();
    let log = Arc::new(Log::open(dir.path(), Config::new().max_store_bytes(512)).unwrap());

    let producers: Vec<_> = (0..4u8)
        .map(|t| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                (0..250u32)
                    .map(|i| {
                        let mut payload = vec![t];
                        payload.extend_from_slice(&i.to_be_bytes());
                        (log.append(&payload).unwrap(), payload)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for _ in 0..200 {
                    let next = log.next_offset();
                    if next > 0 {
                        log.read(next - 1).unwrap();
                    }
                }
            })
        })
        .collect();

    let mut written = Vec::new();
    for producer in producers {
        written.extend(producer.join().unwrap());
    }
    for reader in readers {
        reader.join().unwrap();
    }

    let offsets: BTreeSet<u64> = written.iter().map(|(o, _)| *o).collect();
    assert_eq!(offsets.len(), 1000);
    assert_eq!(offsets.iter().copied().collect::<Vec<_>>(), (0..1000).collect::<Vec<_>>());
    for (offset, payload) in written {
        assert_eq!(log.read(offset).unwrap().payload, payload);
    }
    assert!(log.segment_count() > 1);
}

#[test]
fn subscription_sees_rotation() {
    let dir = tempdir().unwrap();
    let log = Arc::new(Log::open(dir.path(), index_for(2)).unwrap());
    let subscription = log.subscribe(0);

    let consumer = thread::spawn(move || {
        subscription
            .take(9)
            .map(|r| r.unwrap().offset)
            .collect::<Vec<_>>()
    });
    for _ in 0..9 {
        log.append(PAYLOAD).unwrap();
    }

    assert_eq!(consumer.join().unwrap(), (0..9).collect::<Vec<_>>());
    assert_eq!(log.segment_count(), 5);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn appended_payloads_read_back(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..40),
        max_store in 32u64..256,
        entries in 1u64..6,
    ) {
        let dir = tempdir().unwrap();
        let config = index_for(entries).max_store_bytes(max_store);
        let log = Log::open(dir.path(), config.clone()).unwrap();

        for (i, payload) in payloads.iter().enumerate() {
            prop_assert_eq!(log.append(payload).unwrap(), i as u64);
        }
        for (i, payload) in payloads.iter().enumerate() {
            prop_assert_eq!(&log.read(i as u64).unwrap().payload, payload);
        }
        log.close().unwrap();

        let log = Log::open(dir.path(), config).unwrap();
        prop_assert_eq!(log.next_offset(), payloads.len() as u64);
        let segments = log.segments();
        for pair in segments.windows(2) {
            prop_assert_eq!(pair[0].next_offset, pair[1].base_offset);
        }
        for (i, payload) in payloads.iter().enumerate() {
            prop_assert_eq!(&log.read(i as u64).unwrap().payload, payload);
        }
    }
}
