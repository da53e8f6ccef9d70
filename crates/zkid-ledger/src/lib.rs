//! # zkid-ledger: Replay Ledger
//!
//! A token nonce or a proof nullifier may be accepted exactly once.
//! [`NonceLedger::check_and_mark`] is the single operation that decides it:
//! an atomic insert-if-absent, so two concurrent redemptions of the same key
//! observe exactly one [`MarkOutcome::Fresh`].
//!
//! ## Backends
//!
//! - [`MemoryNonceLedger`]: `DashMap` entry API. Process-local.
//! - [`FsNonceLedger`]: one file per key created with `O_EXCL`. Atomic across
//!   processes sharing the directory and survives restarts.
//!
//! ## Failure Semantics
//!
//! Any [`LedgerError`] means "could not prove the key is fresh". Callers
//! fail closed and treat it as a replay.

pub mod error;
pub mod fs;
pub mod key;
pub mod memory;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use zkid_core::Timestamp;

pub use error::LedgerError;
pub use fs::FsNonceLedger;
pub use key::{LedgerKey, Namespace};
pub use memory::MemoryNonceLedger;

/// One accepted key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceRecord {
    pub key: String,
    pub first_seen_at: Timestamp,
    /// `None` for keys that never expire (nullifiers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

impl NonceRecord {
    fn new(key: &LedgerKey, now: Timestamp, ttl: Option<Duration>) -> Result<Self, LedgerError> {
        let expires_at = match ttl {
            Some(ttl) => Some(now.checked_add(ttl).ok_or(LedgerError::TtlOverflow)?),
            None => None,
        };
        Ok(Self {
            key: key.as_str().to_string(),
            first_seen_at: now,
            expires_at,
        })
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Result of [`NonceLedger::check_and_mark`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    /// First sighting; the key is now marked.
    Fresh(NonceRecord),
    /// Already marked and not expired.
    Replayed {
        /// `None` when the competing record is still being written.
        first_seen_at: Option<Timestamp>,
    },
}

impl MarkOutcome {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }
}

/// Atomic one-time key registry.
pub trait NonceLedger: Send + Sync {
    /// Mark `key` as seen at `now` unless a live record already exists.
    ///
    /// An expired record is reclaimed and the key counts as fresh.
    fn check_and_mark_at(
        &self,
        key: &LedgerKey,
        ttl: Option<Duration>,
        now: Timestamp,
    ) -> Result<MarkOutcome, LedgerError>;

    /// Remove every record expired at `now`. Returns the number removed.
    fn purge_expired(&self, now: Timestamp) -> Result<usize, LedgerError>;

    fn check_and_mark(&self, key: &LedgerKey, ttl: Option<Duration>) -> Result<MarkOutcome, LedgerError> {
        self.check_and_mark_at(key, ttl, Timestamp::now())
    }
}

impl<T: NonceLedger + ?Sized> NonceLedger for std::sync::Arc<T> {
    fn check_and_mark_at(
        &self,
        key: &LedgerKey,
        ttl: Option<Duration>,
        now: Timestamp,
    ) -> Result<MarkOutcome, LedgerError> {
        (**self).check_and_mark_at(key, ttl, now)
    }

    fn purge_expired(&self, now: Timestamp) -> Result<usize, LedgerError> {
        (**self).purge_expired(now)
    }
}

/// Behavior shared by every backend.
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// One operation in a generated ledger history.
    #[derive(Debug, Clone)]
    pub struct Step {
        key: u8,
        ttl: Option<u64>,
        advance: i64,
        purge: bool,
    }

    pub fn histories() -> impl Strategy<Value = Vec<Step>> {
        let step = (0u8..4, proptest::option::of(1u64..40), 0i64..25, any::<bool>())
            .prop_map(|(key, ttl, advance, purge)| Step { key, ttl, advance, purge });
        proptest::collection::vec(step, 1..40)
    }

    /// Replays `steps` against `ledger` and a plain map of
    /// `key -> (first_seen, expires_at)`, asserting they agree at every step.
    pub fn agrees_with_model(ledger: &dyn NonceLedger, steps: &[Step]) {
        let mut model: HashMap<u8, (i64, Option<i64>)> = HashMap::new();
        let mut now = 1_000;
        for step in steps {
            now += step.advance;
            if step.purge {
                let before = model.len();
                model.retain(|_, (_, exp)| exp.map_or(true, |e| e > now));
                assert_eq!(ledger.purge_expired(at(now)).unwrap(), before - model.len());
            }
            let key = if step.key % 2 == 0 {
                LedgerKey::nonce(&format!("n{}", step.key)).unwrap()
            } else {
                LedgerKey::nullifier(&step.key.to_string()).unwrap()
            };
            let outcome = ledger
                .check_and_mark_at(&key, step.ttl.map(Duration::from_secs), at(now))
                .unwrap();
            match model.get(&step.key) {
                Some(&(first_seen, exp)) if exp.map_or(true, |e| e > now) => {
                    assert_eq!(outcome, MarkOutcome::Replayed { first_seen_at: Some(at(first_seen)) });
                }
                _ => {
                    assert!(outcome.is_fresh(), "{key} at {now}: {outcome:?}");
                    let exp = step.ttl.map(|t| now + i64::try_from(t).unwrap());
                    model.insert(step.key, (now, exp));
                }
            }
        }
    }

    pub fn at(secs: i64) -> Timestamp {
        Timestamp::from_epoch_secs(secs).unwrap()
    }

    pub fn exactly_once(ledger: &dyn NonceLedger) {
        let key = LedgerKey::nonce("abc").unwrap();
        let ttl = Some(Duration::from_secs(60));
        let first = ledger.check_and_mark_at(&key, ttl, at(1_000)).unwrap();
        assert!(first.is_fresh());
        let second = ledger.check_and_mark_at(&key, ttl, at(1_010)).unwrap();
        assert_eq!(second, MarkOutcome::Replayed { first_seen_at: Some(at(1_000)) });

        let other = LedgerKey::nullifier("abc").unwrap();
        assert!(ledger.check_and_mark_at(&other, None, at(1_010)).unwrap().is_fresh());
    }

    pub fn expiry_and_purge(ledger: &dyn NonceLedger) {
        let short = LedgerKey::nonce("short").unwrap();
        let forever = LedgerKey::nullifier("forever").unwrap();
        ledger.check_and_mark_at(&short, Some(Duration::from_secs(10)), at(0)).unwrap();
        ledger.check_and_mark_at(&forever, None, at(0)).unwrap();

        assert!(!ledger.check_and_mark_at(&short, Some(Duration::from_secs(10)), at(9)).unwrap().is_fresh());
        assert_eq!(ledger.purge_expired(at(5)).unwrap(), 0);
        assert_eq!(ledger.purge_expired(at(10)).unwrap(), 1);
        assert!(ledger.check_and_mark_at(&short, Some(Duration::from_secs(10)), at(11)).unwrap().is_fresh());
        assert!(!ledger.check_and_mark_at(&forever, None, at(1_000_000)).unwrap().is_fresh());
    }

    pub fn expired_record_is_reclaimed(ledger: &dyn NonceLedger) {
        let key = LedgerKey::nonce("reuse").unwrap();
        ledger.check_and_mark_at(&key, Some(Duration::from_secs(1)), at(0)).unwrap();
        assert!(ledger.check_and_mark_at(&key, Some(Duration::from_secs(1)), at(5)).unwrap().is_fresh());
    }

    pub fn concurrent_marks_have_one_winner(ledger: Arc<dyn NonceLedger>) {
        let fresh = Arc::new(AtomicUsize::new(0));
        let key = LedgerKey::nonce("race").unwrap();
        std::thread::scope(|s| {
            for _ in 0..16 {
                let ledger = ledger.clone();
                let fresh = fresh.clone();
                let key = key.clone();
                s.spawn(move || {
                    let outcome = ledger
                        .check_and_mark_at(&key, Some(Duration::from_secs(60)), at(100))
                        .unwrap();
                    if outcome.is_fresh() {
                        fresh.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(fresh.load(Ordering::SeqCst), 1);
    }
}
