//! Bounded-retry ledger for checksum mismatches.
//!
//! Tracks, per build id, how many consecutive verification failures have been
//! observed and turns persistent failure into a final decision.
//!
//! # Counting convention
//!
//! ```text
//! ceiling = N   mismatch #1 .. #N-1 ─→ Retry(1) .. Retry(N-1)
//!               mismatch #N         ─→ Escalate (entry removed)
//! ceiling = 0|1 mismatch #1         ─→ Escalate
//! ```
//!
//! A match at any point removes the entry, so the next mismatch starts a
//! fresh count.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Decision taken after recording a mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryDecision {
    /// Still below the ceiling; carries the consecutive-failure count so far.
    Retry(u32),
    /// The ceiling was reached; the entry has been cleared.
    Escalate,
}

/// In-memory map from entity id to consecutive-failure count.
///
/// Sharded (DashMap), so ids in different shards never contend. Calls for
/// the same id are serialized by the shard lock, but callers are still
/// expected not to verify one id from two workflows at once.
#[derive(Debug, Default)]
pub struct RetryLedger {
    counters: DashMap<String, u32>,
}

impl RetryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget any failures recorded for `id`. Idempotent.
    pub fn record_match(&self, id: &str) {
        self.counters.remove(id);
    }

    /// Record one more consecutive mismatch for `id` and decide what to do.
    pub fn record_mismatch(&self, id: &str, ceiling: u32) -> RetryDecision {
        match self.counters.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                let count = entry.get().saturating_add(1);
                if count >= ceiling {
                    entry.remove();
                    RetryDecision::Escalate
                } else {
                    *entry.get_mut() = count;
                    RetryDecision::Retry(count)
                }
            }
            Entry::Vacant(entry) => {
                if ceiling <= 1 {
                    RetryDecision::Escalate
                } else {
                    entry.insert(1);
                    RetryDecision::Retry(1)
                }
            }
        }
    }

    /// Current consecutive-failure count for `id`, if any.
    pub fn failures(&self, id: &str) -> Option<u32> {
        self.counters.get(id).map(|count| *count)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.counters.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn test_first_mismatch_creates_entry() {
        let ledger = RetryLedger::new();
        assert_eq!(ledger.record_mismatch("B2", 3), RetryDecision::Retry(1));
        assert_eq!(ledger.failures("B2"), Some(1));
    }

    #[test]
    fn test_ceiling_three_escalates_on_third_mismatch() {
        let ledger = RetryLedger::new();
        assert_eq!(ledger.record_mismatch("B2", 3), RetryDecision::Retry(1));
        assert_eq!(ledger.record_mismatch("B2", 3), RetryDecision::Retry(2));
        assert_eq!(ledger.record_mismatch("B2", 3), RetryDecision::Escalate);
        assert!(!ledger.contains("B2"));

        // Next cycle starts fresh.
        assert_eq!(ledger.record_mismatch("B2", 3), RetryDecision::Retry(1));
    }

    #[test]
    fn test_ceiling_one_escalates_immediately() {
        let ledger = RetryLedger::new();
        assert_eq!(ledger.record_mismatch("B3", 1), RetryDecision::Escalate);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_ceiling_zero_escalates_immediately() {
        let ledger = RetryLedger::new();
        assert_eq!(ledger.record_mismatch("B4", 0), RetryDecision::Escalate);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_lowered_ceiling_escalates_existing_entry() {
        let ledger = RetryLedger::new();
        ledger.record_mismatch("B5", 10);
        ledger.record_mismatch("B5", 10);
        assert_eq!(ledger.record_mismatch("B5", 2), RetryDecision::Escalate);
        assert!(!ledger.contains("B5"));
    }

    #[test]
    fn test_match_resets_counter() {
        let ledger = RetryLedger::new();
        ledger.record_mismatch("B6", 3);
        ledger.record_mismatch("B6", 3);
        ledger.record_match("B6");
        assert_eq!(ledger.failures("B6"), None);
        assert_eq!(ledger.record_mismatch("B6", 3), RetryDecision::Retry(1));
    }

    #[test]
    fn test_record_match_is_idempotent() {
        let ledger = RetryLedger::new();
        ledger.record_match("unknown");
        ledger.record_match("unknown");
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_concurrent_mismatches_on_distinct_ids() {
        let ledger = Arc::new(RetryLedger::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let id = format!("build-{}-{}", t, i);
                        assert_eq!(ledger.record_mismatch(&id, 5), RetryDecision::Retry(1));
                        assert_eq!(ledger.record_mismatch(&id, 5), RetryDecision::Retry(2));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker thread panicked");
        }
        assert_eq!(ledger.len(), 8 * 50);
        assert_eq!(ledger.failures("build-3-17"), Some(2));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Match(u8),
        Mismatch(u8),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4).prop_map(Op::Match),
            (0u8..4).prop_map(Op::Mismatch),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// recordMatch after any history leaves no entry for that id.
        #[test]
        fn prop_match_clears_entry(
            ops in prop::collection::vec(arb_op(), 0..40),
            ceiling in 0u32..6,
            id in 0u8..4,
        ) {
            let ledger = RetryLedger::new();
            for op in &ops {
                match op {
                    Op::Match(i) => ledger.record_match(&i.to_string()),
                    Op::Mismatch(i) => { ledger.record_mismatch(&i.to_string(), ceiling); }
                }
            }
            ledger.record_match(&id.to_string());
            prop_assert!(!ledger.contains(&id.to_string()));
        }

        /// For C >= 2, C-1 mismatches retry and the C-th escalates and clears.
        #[test]
        fn prop_ceiling_reached_after_exactly_c_mismatches(ceiling in 2u32..20) {
            let ledger = RetryLedger::new();
            for expected in 1..ceiling {
                prop_assert_eq!(ledger.record_mismatch("id", ceiling), RetryDecision::Retry(expected));
            }
            prop_assert_eq!(ledger.record_mismatch("id", ceiling), RetryDecision::Escalate);
            prop_assert!(!ledger.contains("id"));
        }

        /// The ledger agrees with a plain map model under arbitrary interleavings.
        #[test]
        fn prop_matches_reference_model(
            ops in prop::collection::vec(arb_op(), 0..60),
            ceiling in 0u32..5,
        ) {
            let ledger = RetryLedger::new();
            let mut model: HashMap<String, u32> = HashMap::new();
            for op in ops {
                match op {
                    Op::Match(i) => {
                        ledger.record_match(&i.to_string());
                        model.remove(&i.to_string());
                    }
                    Op::Mismatch(i) => {
                        let key = i.to_string();
                        let next = model.get(&key).copied().unwrap_or(0) + 1;
                        let expected = if next >= ceiling {
                            model.remove(&key);
                            RetryDecision::Escalate
                        } else {
                            model.insert(key.clone(), next);
                            RetryDecision::Retry(next)
                        };
                        prop_assert_eq!(ledger.record_mismatch(&key, ceiling), expected);
                    }
                }
            }
            prop_assert_eq!(ledger.len(), model.len());
            for (key, count) in &model {
                prop_assert!(*count >= 1);
                prop_assert_eq!(ledger.failures(key), Some(*count));
            }
        }
    }
}
