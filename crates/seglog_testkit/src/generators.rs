//! Property-based test generators using proptest.

use proptest::prelude::*;
use seglog_core::{Config, ENTRY_WIDTH};

/// Strategy for a single record payload, empty payloads included.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy for a batch of payloads to append in order.
pub fn payload_batch_strategy(max_len: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(payload_strategy(), 1..max_len.max(2))
}

/// Strategy for small segment limits that force frequent rotation.
pub fn small_config_strategy() -> impl Strategy<Value = Config> {
    (16u64..512, 1u64..8, 0u64..1_000).prop_map(|(store, entries, initial)| {
        Config::new()
            .max_store_bytes(store)
            .max_index_bytes(ENTRY_WIDTH * entries)
            .initial_offset(initial)
    })
}

/// Operations applied to a log in model-based tests.
#[derive(Debug, Clone)]
pub enum LogOp {
    /// Append a payload.
    Append(Vec<u8>),
    /// Read a record at an offset relative to the lowest offset.
    Read(u64),
    /// Truncate below an offset relative to the lowest offset.
    Truncate(u64),
    /// Close and reopen the log.
    Reopen,
}

/// Strategy for a single log operation, weighted towards appends.
pub fn log_op_strategy() -> impl Strategy<Value = LogOp> {
    prop_oneof![
        6 => payload_strategy().prop_map(LogOp::Append),
        3 => (0u64..64).prop_map(LogOp::Read),
        1 => (0u64..64).prop_map(LogOp::Truncate),
        1 => Just(LogOp::Reopen),
    ]
}

/// Strategy for a sequence of log operations.
pub fn log_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<LogOp>> {
    prop::collection::vec(log_op_strategy(), 1..max_len.max(2))
}
