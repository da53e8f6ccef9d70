//! # Prover
//!
//! Holds the proving keys of every built circuit and turns a
//! [`ProofRequest`] into a [`GeneratedProof`]. Proving is CPU-bound; async
//! callers dispatch it through the service worker pool.

use std::collections::HashMap;

use ark_bn254::Bn254;
use ark_groth16::ProvingKey;
use rand_core::OsRng;
use zkid_core::CircuitId;

use crate::artifacts::ArtifactStore;
use crate::build::{load_proving_key, load_record};
use crate::circuits::{descriptor, AnyCircuit};
use crate::envelope::{GeneratedProof, ProofEnvelope};
use crate::error::{ArtifactError, ProveError};
use crate::field::fr_to_decimal;
use crate::groth16::{is_satisfied, Groth16ProofSystem};
use crate::mock::{MockProofSystem, MockProvingKey, MockStatement};
use crate::policy::ProofPolicy;
use crate::traits::ProofSystem;
use crate::witness::ProofRequest;

pub struct Prover {
    keys: HashMap<CircuitId, ProvingKey<Bn254>>,
    policy: ProofPolicy,
}

impl std::fmt::Debug for Prover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prover")
            .field("circuits", &self.keys.keys().collect::<Vec<_>>())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Prover {
    /// Load every built circuit's proving key. Unbuilt circuits are skipped;
    /// proving for them reports [`ProveError::ArtifactsUnavailable`].
    pub fn load(store: &ArtifactStore, policy: ProofPolicy) -> Result<Self, ArtifactError> {
        let mut keys = HashMap::new();
        for id in CircuitId::ALL {
            match load_record(store, id)? {
                Some(record) => {
                    keys.insert(id, load_proving_key(store, &record)?);
                    tracing::debug!(circuit = %id, version = record.version, "loaded proving key");
                }
                None => tracing::debug!(circuit = %id, "no proving key built"),
            }
        }
        Ok(Self { keys, policy })
    }

    pub fn with_keys(keys: HashMap<CircuitId, ProvingKey<Bn254>>, policy: ProofPolicy) -> Self {
        Self { keys, policy }
    }

    pub fn has_key(&self, id: CircuitId) -> bool {
        self.keys.contains_key(&id)
    }

    pub fn policy(&self) -> ProofPolicy {
        self.policy
    }

    /// Groth16 proof for `request`.
    pub fn generate_proof(&self, request: ProofRequest) -> Result<GeneratedProof, ProveError> {
        let id = request.circuit_id();
        let pk = self.keys.get(&id).ok_or(ProveError::ArtifactsUnavailable(id))?;
        let circuit = request.into_circuit(&mut OsRng)?;
        let signals = public_signals(&circuit)?;
        let proof = Groth16ProofSystem.prove(pk, circuit)?;
        tracing::debug!(circuit = %id, "generated groth16 proof");
        Ok(bundle(id, ProofEnvelope::from_groth16(&proof), signals))
    }

    /// Like [`generate_proof`](Self::generate_proof), falling back to a mock
    /// proof when the circuit has no keys and the policy allows it.
    pub fn generate_with_fallback(&self, request: ProofRequest) -> Result<GeneratedProof, ProveError> {
        let id = request.circuit_id();
        if self.has_key(id) {
            return self.generate_proof(request);
        }
        if !self.policy.allows_mock() {
            tracing::error!(circuit = %id, "artifacts unavailable and production policy forbids mock proofs");
            return Err(ProveError::ArtifactsUnavailable(id));
        }
        tracing::warn!(circuit = %id, "artifacts unavailable, emitting MOCK proof under development policy");
        self.generate_mock(request)
    }

    /// Transparent mock proof. Refused under the production policy.
    pub fn generate_mock(&self, request: ProofRequest) -> Result<GeneratedProof, ProveError> {
        if !self.policy.allows_mock() {
            return Err(ProveError::MockDisabled);
        }
        let id = request.circuit_id();
        let circuit = request.into_circuit(&mut OsRng)?;
        let signals = public_signals(&circuit)?;
        if !is_satisfied(circuit)? {
            return Err(ProveError::Unsatisfied(id));
        }
        let statement = MockStatement {
            circuit_id: id,
            public_signals: signals.clone(),
        };
        let proof = MockProofSystem.prove(&MockProvingKey, statement)?;
        Ok(bundle(id, ProofEnvelope::from_mock(proof), signals))
    }
}

fn public_signals(circuit: &AnyCircuit) -> Result<Vec<String>, ProveError> {
    let inputs = circuit
        .public_inputs()
        .ok_or_else(|| ProveError::InvalidInputs("circuit has no witness".into()))?;
    Ok(inputs.iter().map(fr_to_decimal).collect())
}

fn bundle(circuit_id: CircuitId, proof: ProofEnvelope, public_signals: Vec<String>) -> GeneratedProof {
    let nullifier_hash = descriptor(circuit_id)
        .nullifier_signal
        .and_then(|i| public_signals.get(i).cloned());
    GeneratedProof {
        circuit_id,
        proof,
        public_signals,
        nullifier_hash,
    }
}
