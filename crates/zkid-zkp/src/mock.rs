//! # Mock Proof System
//!
//! A deterministic, transparent proof backend for development. The "proof"
//! is `SHA256(JCS({circuit_id, public_signals}))`.
//!
//! ## Security Warning
//!
//! **NOT PRIVATE, NOT SOUND.** Anyone can compute a mock proof for any
//! signals. The prover only emits one under `ProofPolicy::Development`, and
//! the verifier only accepts one under that policy when no verification key
//! is loaded for the circuit.

use serde::{Deserialize, Serialize};
use zkid_core::{sha256_hex, CanonicalBytes, CircuitId};

use crate::error::{ProveError, VerifyError};
use crate::traits::ProofSystem;

/// A mock proof: hex SHA-256 over the canonical statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockProof {
    pub digest: String,
}

/// Stateless; verification is recomputation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockVerifyingKey;

/// Stateless; generation is hashing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockProvingKey;

/// The statement a mock proof binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockStatement {
    pub circuit_id: CircuitId,
    pub public_signals: Vec<String>,
}

impl MockStatement {
    fn digest(&self) -> Result<String, String> {
        let canonical = CanonicalBytes::new(self).map_err(|e| e.to_string())?;
        Ok(sha256_hex(&canonical))
    }
}

/// Deterministic SHA-256 "proof system".
#[derive(Debug, Clone, Copy, Default)]
pub struct MockProofSystem;

impl ProofSystem for MockProofSystem {
    type Proof = MockProof;
    type VerifyingKey = MockVerifyingKey;
    type ProvingKey = MockProvingKey;
    type Circuit = MockStatement;
    type PublicInputs = MockStatement;

    fn prove(&self, _pk: &Self::ProvingKey, circuit: Self::Circuit) -> Result<Self::Proof, ProveError> {
        let digest = circuit.digest().map_err(ProveError::GenerationFailed)?;
        Ok(MockProof { digest })
    }

    fn verify(
        &self,
        _vk: &Self::VerifyingKey,
        proof: &Self::Proof,
        public_inputs: &Self::PublicInputs,
    ) -> Result<bool, VerifyError> {
        let expected = public_inputs.digest().map_err(VerifyError::MalformedProof)?;
        Ok(proof.digest.eq_ignore_ascii_case(&expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(signals: &[&str]) -> MockStatement {
        MockStatement {
            circuit_id: CircuitId::AgeVerification,
            public_signals: signals.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn proof_is_deterministic_and_verifies() {
        let s = statement(&["1", "18", "1700000000", "42"]);
        let a = MockProofSystem.prove(&MockProvingKey, s.clone()).unwrap();
        let b = MockProofSystem.prove(&MockProvingKey, s.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.digest.len(), 64);
        assert!(MockProofSystem.verify(&MockVerifyingKey, &a, &s).unwrap());
    }

    #[test]
    fn proof_binds_signals_and_circuit() {
        let s = statement(&["1", "18", "1700000000", "42"]);
        let proof = MockProofSystem.prove(&MockProvingKey, s.clone()).unwrap();

        let altered = statement(&["1", "21", "1700000000", "42"]);
        assert!(!MockProofSystem.verify(&MockVerifyingKey, &proof, &altered).unwrap());

        let mut other_circuit = s;
        other_circuit.circuit_id = CircuitId::CitizenshipMembership;
        assert!(!MockProofSystem.verify(&MockVerifyingKey, &proof, &other_circuit).unwrap());
    }
}
