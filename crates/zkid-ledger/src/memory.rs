//! In-memory ledger backed by `DashMap`.
//!
//! The entry API holds the shard lock across the check and the insert,
//! which is what makes `check_and_mark_at` atomic.

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use zkid_core::Timestamp;

use crate::error::LedgerError;
use crate::key::LedgerKey;
use crate::{MarkOutcome, NonceLedger, NonceRecord};

#[derive(Debug, Default)]
pub struct MemoryNonceLedger {
    records: DashMap<String, NonceRecord>,
}

impl MemoryNonceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl NonceLedger for MemoryNonceLedger {
    fn check_and_mark_at(
        &self,
        key: &LedgerKey,
        ttl: Option<Duration>,
        now: Timestamp,
    ) -> Result<MarkOutcome, LedgerError> {
        let record = NonceRecord::new(key, now, ttl)?;
        match self.records.entry(key.as_str().to_string()) {
            Entry::Occupied(mut existing) => {
                if existing.get().is_expired(now) {
                    existing.insert(record.clone());
                    return Ok(MarkOutcome::Fresh(record));
                }
                Ok(MarkOutcome::Replayed {
                    first_seen_at: Some(existing.get().first_seen_at),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(MarkOutcome::Fresh(record))
            }
        }
    }

    fn purge_expired(&self, now: Timestamp) -> Result<usize, LedgerError> {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        let removed = before.saturating_sub(self.records.len());
        tracing::debug!(removed, "purged expired in-memory ledger records");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;
    use std::sync::Arc;

    #[test]
    fn exactly_once() {
        conformance::exactly_once(&MemoryNonceLedger::new());
    }

    #[test]
    fn expiry_and_purge() {
        let ledger = MemoryNonceLedger::new();
        conformance::expiry_and_purge(&ledger);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn expired_record_is_reclaimed() {
        conformance::expired_record_is_reclaimed(&MemoryNonceLedger::new());
    }

    #[test]
    fn concurrent_marks_have_one_winner() {
        conformance::concurrent_marks_have_one_winner(Arc::new(MemoryNonceLedger::new()));
    }

    proptest::proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(256))]

        #[test]
        fn arbitrary_histories_agree_with_model(steps in conformance::histories()) {
            conformance::agrees_with_model(&MemoryNonceLedger::new(), &steps);
        }
    }
}
