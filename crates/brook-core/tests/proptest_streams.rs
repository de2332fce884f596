//! Property-based tests for the stream engine.
//!
//! These tests verify invariants that must hold regardless of clock
//! behaviour, trim bounds, or how consumers split their reads.

use bytes::Bytes;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

use brook_core::storage::{
    Clock, GroupReadPosition, GroupStart, ManualClock, StreamEngine, StreamEntryId,
};

// ============================================================================
// Test Strategies
// ============================================================================

/// Strategy: clock movements between appends, including backwards jumps
fn clock_steps_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(-5i64..5, 1..64)
}

/// Strategy: per-read count limits for a group (0 means unbounded)
fn read_counts_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..4, 1..16)
}

fn fields(i: usize) -> Vec<(Bytes, Bytes)> {
    vec![(Bytes::from(format!("f{i}")), Bytes::from(format!("v{i}")))]
}

// ============================================================================
// Stream Engine Property Tests
// ============================================================================

proptest! {
    /// Ids returned by successive appends are strictly increasing,
    /// even when the clock stalls or moves backwards.
    #[test]
    fn prop_ids_strictly_increase(steps in clock_steps_strategy()) {
        let clock = Arc::new(ManualClock::new(1_000));
        let engine = StreamEngine::with_clock(clock.clone());
        let key = Bytes::from("prop");

        let mut last = StreamEntryId::ZERO;
        for (i, step) in steps.iter().enumerate() {
            let now = clock.now_ms();
            clock.set(now.saturating_add_signed(*step));
            let id = engine.add(&key, fields(i), None).unwrap();
            prop_assert!(id > last, "{} not above {}", id, last);
            last = id;
        }
    }

    /// Trimming keeps exactly the newest `max_len` entries in order.
    #[test]
    fn prop_trim_keeps_newest(total in 1usize..60, max_len in 0usize..30) {
        let engine = StreamEngine::with_clock(Arc::new(ManualClock::new(1)));
        let key = Bytes::from("trim");

        let ids: Vec<_> = (0..total)
            .map(|i| engine.add(&key, fields(i), Some(max_len)).unwrap())
            .collect();

        let kept: Vec<_> = engine
            .read(&key, &StreamEntryId::ZERO, None)
            .into_iter()
            .map(|e| e.id)
            .collect();
        let expected = &ids[total.saturating_sub(max_len)..];
        prop_assert_eq!(kept.as_slice(), expected);
    }

    /// Consumers of one group receive a disjoint, ordered cover of the stream.
    #[test]
    fn prop_group_partitions_backlog(total in 0usize..40, counts in read_counts_strategy()) {
        let engine = StreamEngine::with_clock(Arc::new(ManualClock::new(1)));
        let key = Bytes::from("group");
        let group = Bytes::from("g");

        let ids: Vec<_> = (0..total)
            .map(|i| engine.add(&key, fields(i), None).unwrap())
            .collect();
        if total == 0 {
            engine.add(&key, fields(0), Some(0)).unwrap();
        }
        engine.create_group(&key, &group, GroupStart::Beginning).unwrap();

        let mut delivered = Vec::new();
        let mut consumer_ix = 0usize;
        loop {
            let count = counts[consumer_ix % counts.len()];
            let consumer = Bytes::from(format!("c{}", consumer_ix % 3));
            let batch = engine
                .read_group(&key, &group, &consumer, GroupReadPosition::NewMessages, Some(count))
                .unwrap();
            if batch.is_empty() {
                break;
            }
            delivered.extend(batch.into_iter().map(|e| e.id));
            consumer_ix += 1;
        }

        prop_assert_eq!(&delivered, &ids);
        let unique: HashSet<_> = delivered.iter().collect();
        prop_assert_eq!(unique.len(), delivered.len());

        let info = engine.group_info(&key, &group).unwrap();
        prop_assert_eq!(info.pending, total);
    }
}
