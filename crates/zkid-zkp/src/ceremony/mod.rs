//! # Trusted Setup Ceremony
//!
//! One universal powers-of-tau artifact per tier, reused by every circuit
//! whose QAP domain fits, then a circuit-specific δ phase per key.
//!
//! ```text
//! init (pot<tier>_0000) → contribute (pot<tier>_0001) → verify → prepare
//!   → pot<tier>_final + pot<tier>_transcript.json
//! ```
//!
//! ## Security Invariant
//!
//! A prepared artifact is only ever accepted together with a transcript that
//! records at least one verified contribution. The initial accumulator has
//! `τ = α = β = 1` and yields forgeable keys; loading it without a transcript
//! entry is a [`CeremonyError::NoContributions`], never a silent success.

pub mod fft;
pub mod phase1;
pub mod phase2;

use ark_bn254::G2Affine;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zkid_core::{ContentDigest, Timestamp};

use crate::artifacts::{ArtifactStore, PtauStage};
use crate::codec::to_compressed_hex;
use crate::error::{BuildError, CeremonyError};

pub use phase1::{validate_tier, Accumulator, ContributionKey, MAX_TIER};
pub use phase2::{
    contribute_delta, derive_proving_key, qap_domain_size, verify_delta_contribution, LagrangeBasis,
    PreparedSetup,
};

/// One verified entropy contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRecord {
    /// 1-based position in the ceremony.
    pub index: usize,
    pub participant: String,
    pub contributed_at: Timestamp,
    /// Public half of the contribution: `τ·G2`, `α·G2`, `β·G2`.
    pub tau_g2: String,
    pub alpha_g2: String,
    pub beta_g2: String,
    /// Digest of the accumulator this contribution produced.
    pub accumulator_digest: ContentDigest,
}

impl ContributionRecord {
    fn new(index: usize, participant: &str, key: &ContributionKey, digest: ContentDigest) -> Self {
        let hex = |p: &G2Affine| to_compressed_hex(p);
        Self {
            index,
            participant: participant.to_string(),
            contributed_at: Timestamp::now(),
            tau_g2: hex(&key.tau_g2),
            alpha_g2: hex(&key.alpha_g2),
            beta_g2: hex(&key.beta_g2),
            accumulator_digest: digest,
        }
    }
}

/// Transcript written next to the prepared artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeremonyTranscript {
    pub tier: usize,
    pub contributions: Vec<ContributionRecord>,
    /// Digest of `pot<tier>_final.ptau`; pins the file on reload.
    pub prepared_digest: ContentDigest,
}

/// Return the prepared setup for `tier`, running the ceremony if needed.
///
/// An existing final artifact is reused only when its transcript lists at
/// least one contribution and its digest matches the transcript.
pub fn ensure_universal_setup<R: RngCore + CryptoRng>(
    store: &ArtifactStore,
    tier: usize,
    participant: &str,
    rng: &mut R,
) -> Result<PreparedSetup, BuildError> {
    validate_tier(tier)?;
    let final_path = store.ptau_path(tier, PtauStage::Final);
    let transcript_path = store.transcript_path(tier);

    if store.exists(&final_path) {
        if !store.exists(&transcript_path) {
            return Err(CeremonyError::NoContributions(tier).into());
        }
        let transcript: CeremonyTranscript = store.read_json(&transcript_path)?;
        if transcript.contributions.is_empty() || transcript.tier != tier {
            return Err(CeremonyError::NoContributions(tier).into());
        }
        let setup: PreparedSetup = store.read_ark_pinned(&final_path, &transcript.prepared_digest)?;
        if setup.tier() != tier {
            return Err(CeremonyError::MalformedAccumulator(format!(
                "{} holds tier {}",
                final_path.display(),
                setup.tier()
            ))
            .into());
        }
        tracing::debug!(tier, contributions = transcript.contributions.len(), "reusing prepared setup");
        return Ok(setup);
    }

    tracing::info!(tier, "initializing powers-of-tau accumulator");
    let initial = Accumulator::new(tier)?;
    let initial_path = store.ptau_path(tier, PtauStage::Contribution(0));
    store.write_ark(&initial_path, &initial)?;

    let (contributed, key) = initial.contribute(rng);
    contributed.verify_transition(&initial, &key, 1)?;
    contributed.verify_well_formed(rng)?;
    let contributed_path = store.ptau_path(tier, PtauStage::Contribution(1));
    let accumulator_digest = store.write_ark(&contributed_path, &contributed)?;
    tracing::info!(tier, participant, "verified ceremony contribution 1");

    let setup = PreparedSetup::prepare(contributed)?;
    let prepared_digest = store.write_ark(&final_path, &setup)?;
    let transcript = CeremonyTranscript {
        tier,
        contributions: vec![ContributionRecord::new(1, participant, &key, accumulator_digest)],
        prepared_digest,
    };
    store.write_json(&transcript_path, &transcript)?;

    store.remove(&initial_path)?;
    store.remove(&contributed_path)?;
    tracing::info!(tier, digest = %prepared_digest, "prepared universal setup");
    Ok(setup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn runs_once_then_reuses() {
        let (_dir, store) = store();
        let first = ensure_universal_setup(&store, 8, "alice", &mut OsRng).unwrap();
        assert!(store.exists(&store.ptau_path(8, PtauStage::Final)));
        assert!(!store.exists(&store.ptau_path(8, PtauStage::Contribution(0))));
        assert!(!store.exists(&store.ptau_path(8, PtauStage::Contribution(1))));

        let transcript: CeremonyTranscript = store.read_json(&store.transcript_path(8)).unwrap();
        assert_eq!(transcript.contributions.len(), 1);
        assert_eq!(transcript.contributions[0].participant, "alice");

        let second = ensure_universal_setup(&store, 8, "bob", &mut OsRng).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn final_without_contributions_is_rejected() {
        let (_dir, store) = store();
        let setup = ensure_universal_setup(&store, 4, "alice", &mut OsRng).unwrap();
        let mut transcript: CeremonyTranscript = store.read_json(&store.transcript_path(4)).unwrap();
        transcript.contributions.clear();
        store.write_json(&store.transcript_path(4), &transcript).unwrap();
        assert!(matches!(
            ensure_universal_setup(&store, 4, "alice", &mut OsRng),
            Err(BuildError::Ceremony(CeremonyError::NoContributions(4)))
        ));

        store.remove(&store.transcript_path(4)).unwrap();
        store.write_ark(&store.ptau_path(4, PtauStage::Final), &setup).unwrap();
        assert!(matches!(
            ensure_universal_setup(&store, 4, "alice", &mut OsRng),
            Err(BuildError::Ceremony(CeremonyError::NoContributions(4)))
        ));
    }

    #[test]
    fn tampered_final_fails_digest_pin() {
        let (_dir, store) = store();
        ensure_universal_setup(&store, 4, "alice", &mut OsRng).unwrap();
        let other = PreparedSetup::prepare(Accumulator::new(4).unwrap().contribute(&mut OsRng).0).unwrap();
        store.write_ark(&store.ptau_path(4, PtauStage::Final), &other).unwrap();
        assert!(matches!(
            ensure_universal_setup(&store, 4, "alice", &mut OsRng),
            Err(BuildError::Artifact(crate::error::ArtifactError::DigestMismatch { .. }))
        ));
    }

    #[test]
    fn bad_tier_rejected() {
        let (_dir, store) = store();
        assert!(matches!(
            ensure_universal_setup(&store, 12, "alice", &mut OsRng),
            Err(BuildError::Ceremony(CeremonyError::InvalidTier(12)))
        ));
    }
}
