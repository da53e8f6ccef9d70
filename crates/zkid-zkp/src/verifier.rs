//! # Verifier
//!
//! Checks a `(claim_type, proof, public_signals)` triple against the static
//! claim table and the loaded verification keys.
//!
//! ## Check order
//!
//! 1. Claim type is known (`UNKNOWN_CLAIM_TYPE`).
//! 2. Signal count matches the circuit (`SIGNAL_ARITY_MISMATCH`).
//! 3. Every signal is a canonical decimal field element (`MALFORMED_PROOF`).
//! 4. Claim-bound signals match the claim, e.g. threshold 18 for
//!    `age_over_18` (`PUBLIC_SIGNAL_MISMATCH`).
//! 5. The envelope verifies (`PAIRING_CHECK_FAILED`, `MOCK_PROOF_REJECTED`,
//!    `ARTIFACTS_UNAVAILABLE`).
//! 6. The validity flag is set (`CLAIM_NOT_SATISFIED`).
//!
//! Keys are loaded once at construction and never mutated, so a `Verifier`
//! can be shared across threads behind an `Arc`.

use std::collections::HashMap;

use ark_bn254::{Bn254, Fr};
use ark_ff::One;
use ark_groth16::{PreparedVerifyingKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use zkid_core::{CircuitId, ClaimType};

use crate::artifacts::ArtifactStore;
use crate::build::{load_record, load_verification_key};
use crate::circuits::{descriptor, VALIDITY_SIGNAL};
use crate::envelope::ProofEnvelope;
use crate::error::{ArtifactError, VerifyError, VerifyErrorCode};
use crate::field::fr_from_decimal;
use crate::groth16::Groth16ProofSystem;
use crate::mock::{MockProof, MockProofSystem, MockStatement, MockVerifyingKey};
use crate::policy::{ProofBackend, ProofPolicy};
use crate::traits::ProofSystem;

/// Index of the age threshold among the age circuit's public signals.
const AGE_THRESHOLD_SIGNAL: usize = 1;

/// An accepted claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedClaim {
    pub claim_type: ClaimType,
    pub circuit_id: CircuitId,
    pub backend: ProofBackend,
    pub public_signals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullifier_hash: Option<String>,
}

/// Result of [`Verifier::verify_proof`]. Always produced; never panics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOutcome {
    claim_type: String,
    result: Result<VerifiedClaim, VerifyError>,
}

/// Serializable summary of a [`ProofOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofReport {
    pub valid: bool,
    pub claim_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<ProofBackend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<VerifyErrorCode>,
    pub client_error: bool,
    pub message: String,
}

impl ProofOutcome {
    pub fn is_valid(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&VerifyError> {
        self.result.as_ref().err()
    }

    pub fn error_code(&self) -> Option<VerifyErrorCode> {
        self.error().map(VerifyError::code)
    }

    pub fn claim(&self) -> Option<&VerifiedClaim> {
        self.result.as_ref().ok()
    }

    pub fn check(self) -> Result<VerifiedClaim, VerifyError> {
        self.result
    }

    pub fn report(&self) -> ProofReport {
        match &self.result {
            Ok(claim) => ProofReport {
                valid: true,
                claim_type: self.claim_type.clone(),
                backend: Some(claim.backend),
                error_code: None,
                client_error: false,
                message: format!("{} verified", self.claim_type),
            },
            Err(e) => ProofReport {
                valid: false,
                claim_type: self.claim_type.clone(),
                backend: None,
                error_code: Some(e.code()),
                client_error: e.is_client_error(),
                message: e.to_string(),
            },
        }
    }
}

pub struct Verifier {
    keys: HashMap<CircuitId, PreparedVerifyingKey<Bn254>>,
    policy: ProofPolicy,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("circuits", &self.keys.keys().collect::<Vec<_>>())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Verifier {
    /// Load and prepare every built circuit's verification key.
    pub fn load(store: &ArtifactStore, policy: ProofPolicy) -> Result<Self, ArtifactError> {
        let mut keys = HashMap::new();
        for id in CircuitId::ALL {
            if let Some(record) = load_record(store, id)? {
                let vk = load_verification_key(store, &record)?;
                keys.insert(id, prepare(&vk));
                tracing::debug!(circuit = %id, version = record.version, "loaded verification key");
            } else if policy.allows_mock() {
                tracing::warn!(circuit = %id, "no verification key; mock proofs will be accepted");
            } else {
                tracing::warn!(circuit = %id, "no verification key; proofs will be ARTIFACTS_UNAVAILABLE");
            }
        }
        Ok(Self { keys, policy })
    }

    pub fn with_keys(keys: HashMap<CircuitId, VerifyingKey<Bn254>>, policy: ProofPolicy) -> Self {
        let keys = keys.into_iter().map(|(id, vk)| (id, prepare(&vk))).collect();
        Self { keys, policy }
    }

    pub fn has_key(&self, id: CircuitId) -> bool {
        self.keys.contains_key(&id)
    }

    pub fn policy(&self) -> ProofPolicy {
        self.policy
    }

    pub fn verify_proof(&self, claim_type: &str, proof: &ProofEnvelope, public_signals: &[String]) -> ProofOutcome {
        let result = self.check_claim(claim_type, proof, public_signals);
        if let Err(e) = &result {
            tracing::info!(claim_type, code = %e.code(), "proof rejected: {e}");
        }
        ProofOutcome {
            claim_type: claim_type.to_string(),
            result,
        }
    }

    fn check_claim(
        &self,
        claim_type: &str,
        proof: &ProofEnvelope,
        public_signals: &[String],
    ) -> Result<VerifiedClaim, VerifyError> {
        let claim: ClaimType = claim_type
            .parse()
            .map_err(|_| VerifyError::UnknownClaimType(claim_type.to_string()))?;
        let circuit_id = claim.circuit();
        let desc = descriptor(circuit_id);

        if public_signals.len() != desc.public_signals.len() {
            return Err(VerifyError::SignalArityMismatch {
                expected: desc.public_signals.len(),
                got: public_signals.len(),
            });
        }
        let inputs = public_signals
            .iter()
            .enumerate()
            .map(|(i, s)| {
                fr_from_decimal(s).ok_or_else(|| {
                    VerifyError::MalformedProof(format!(
                        "public signal {i} ({}) is not a canonical field element",
                        desc.public_signals[i]
                    ))
                })
            })
            .collect::<Result<Vec<Fr>, _>>()?;

        if let Some(threshold) = claim.age_threshold() {
            if inputs[AGE_THRESHOLD_SIGNAL] != Fr::from(threshold) {
                return Err(VerifyError::PublicSignalMismatch {
                    index: AGE_THRESHOLD_SIGNAL,
                    name: desc.public_signals[AGE_THRESHOLD_SIGNAL],
                    reason: format!("{claim} requires threshold {threshold}"),
                });
            }
        }

        let backend = proof.backend();
        match proof {
            ProofEnvelope::Groth16 { .. } => {
                let pvk = self
                    .keys
                    .get(&circuit_id)
                    .ok_or(VerifyError::ArtifactsUnavailable(circuit_id))?;
                let decoded = proof.to_groth16()?;
                if !Groth16ProofSystem.verify(pvk, &decoded, &inputs)? {
                    return Err(VerifyError::PairingCheckFailed);
                }
            }
            ProofEnvelope::Mock { digest } => {
                if !self.policy.allows_mock() {
                    return Err(VerifyError::MockProofRejected("production proof policy".into()));
                }
                if self.has_key(circuit_id) {
                    return Err(VerifyError::MockProofRejected(format!(
                        "a verification key is loaded for {circuit_id}"
                    )));
                }
                let statement = MockStatement {
                    circuit_id,
                    public_signals: public_signals.to_vec(),
                };
                let mock = MockProof { digest: digest.clone() };
                if !MockProofSystem.verify(&MockVerifyingKey, &mock, &statement)? {
                    return Err(VerifyError::MockProofRejected(
                        "digest does not match the public signals".into(),
                    ));
                }
                tracing::warn!(claim_type, "accepted MOCK proof under development policy");
            }
        }

        if !inputs[VALIDITY_SIGNAL].is_one() {
            return Err(VerifyError::ClaimNotSatisfied);
        }

        Ok(VerifiedClaim {
            claim_type: claim,
            circuit_id,
            backend,
            nullifier_hash: desc.nullifier_signal.map(|i| public_signals[i].clone()),
            public_signals: public_signals.to_vec(),
        })
    }
}

fn prepare(vk: &VerifyingKey<Bn254>) -> PreparedVerifyingKey<Bn254> {
    PreparedVerifyingKey::from(vk.clone())
}
