#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{Duration as ChronoDuration, Utc};
use tempfile::TempDir;
use url::Url;
use zkid_core::{CircuitId, Timestamp};
use zkid_crypto::MasterSecret;
use zkid_token::{Issuer, TokenConfig};
use zkid_zkp::{build, ArtifactStore, BuildConfig, ProofPolicy, Prover, Verifier};

pub fn token_config() -> TokenConfig {
    TokenConfig::new(
        MasterSecret::from_bytes((0u8..32).collect()).unwrap(),
        Url::parse("https://verify.example.org").unwrap(),
    )
}

pub fn issuer() -> Issuer {
    Issuer {
        id: "wallet-01".into(),
        name: "Citizen Wallet".into(),
        domain: Some("wallet.example".into()),
    }
}

pub fn now_secs() -> i64 {
    Timestamp::now().epoch_secs()
}

/// Birth date of someone `years` old today, as `YYYY-MM-DD`.
pub fn birth_date_for_age(years: i64) -> String {
    (Utc::now() - ChronoDuration::days(years * 365 + years / 4 + 7))
        .format("%Y-%m-%d")
        .to_string()
}

/// One artifact root per test binary, built on first use.
pub fn built_store(circuits: &'static [CircuitId]) -> &'static ArtifactStore {
    static STORE: OnceLock<(TempDir, ArtifactStore)> = OnceLock::new();
    let (_, store) = STORE.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        for id in circuits {
            build(&store, *id, &BuildConfig::default()).unwrap();
        }
        (dir, store)
    });
    store
}

pub fn production_keys(store: &ArtifactStore) -> (Prover, Verifier) {
    (
        Prover::load(store, ProofPolicy::production()).unwrap(),
        Verifier::load(store, ProofPolicy::production()).unwrap(),
    )
}

pub fn dev_without_keys() -> (Prover, Verifier) {
    (
        Prover::with_keys(HashMap::new(), ProofPolicy::development()),
        Verifier::with_keys(HashMap::new(), ProofPolicy::development()),
    )
}
