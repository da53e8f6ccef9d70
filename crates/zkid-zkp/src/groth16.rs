//! # Groth16 Proof System
//!
//! Groth16 over BN254 via `ark-groth16`. Keys come from the build pipeline
//! ([`crate::build`]); this module only proves and verifies.
//!
//! ## Properties
//!
//! - **Proof size:** 2 G1 + 1 G2 points (128 bytes compressed).
//! - **Verification:** one multi-pairing over a prepared verifying key.
//! - **Trusted setup:** universal powers of tau plus a circuit-specific δ.

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, ProvingKey};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem, OptimizationGoal};
use ark_snark::SNARK;
use rand_core::OsRng;

use crate::circuits::AnyCircuit;
use crate::error::{ProveError, VerifyError};
use crate::traits::ProofSystem;

#[derive(Debug, Clone, Copy, Default)]
pub struct Groth16ProofSystem;

/// Whether `circuit` is satisfied, evaluated natively.
///
/// `ark-groth16` does not report an unsatisfied witness; it silently
/// produces a proof that fails verification.
pub fn is_satisfied(circuit: AnyCircuit) -> Result<bool, ProveError> {
    let cs = ConstraintSystem::<Fr>::new_ref();
    cs.set_optimization_goal(OptimizationGoal::Constraints);
    let id = circuit.id();
    match circuit.generate_constraints(cs.clone()) {
        Ok(()) => {}
        // Thrown for witnesses that have no bit decomposition.
        Err(_) => return Ok(false),
    }
    cs.is_satisfied()
        .map_err(|e| ProveError::GenerationFailed(format!("{id}: {e}")))
}

impl ProofSystem for Groth16ProofSystem {
    type Proof = Proof<Bn254>;
    type VerifyingKey = PreparedVerifyingKey<Bn254>;
    type ProvingKey = ProvingKey<Bn254>;
    type Circuit = AnyCircuit;
    type PublicInputs = [Fr];

    fn prove(&self, pk: &Self::ProvingKey, circuit: Self::Circuit) -> Result<Self::Proof, ProveError> {
        let id = circuit.id();
        if !is_satisfied(circuit.clone())? {
            return Err(ProveError::Unsatisfied(id));
        }
        Groth16::<Bn254>::prove(pk, circuit, &mut OsRng)
            .map_err(|e| ProveError::GenerationFailed(format!("{id}: {e}")))
    }

    fn verify(
        &self,
        vk: &Self::VerifyingKey,
        proof: &Self::Proof,
        public_inputs: &Self::PublicInputs,
    ) -> Result<bool, VerifyError> {
        let expected = vk.vk.gamma_abc_g1.len().saturating_sub(1);
        if public_inputs.len() != expected {
            return Err(VerifyError::SignalArityMismatch {
                expected,
                got: public_inputs.len(),
            });
        }
        Groth16::<Bn254>::verify_with_processed_vk(vk, public_inputs, proof)
            .map_err(|e| VerifyError::MalformedProof(e.to_string()))
    }
}
