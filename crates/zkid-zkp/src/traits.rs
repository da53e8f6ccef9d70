//! # Proof System Trait (Sealed)
//!
//! The seam between the prover/verifier and a proving backend. Two backends
//! exist: [`Groth16ProofSystem`](crate::groth16::Groth16ProofSystem) and the
//! transparent [`MockProofSystem`](crate::mock::MockProofSystem).
//!
//! ## Sealed Trait
//!
//! Only types inside `zkid-zkp` can implement [`ProofSystem`]. Backend
//! selection is governed by [`ProofPolicy`](crate::policy::ProofPolicy); an
//! external backend would bypass it.

use crate::error::{ProveError, VerifyError};

mod private {
    pub trait Sealed {}
}

/// A zero-knowledge proof backend.
///
/// Implementations are `Send + Sync` so one instance can serve every worker
/// in the service pool. `verify` is a pure function of its arguments.
pub trait ProofSystem: private::Sealed + Send + Sync {
    /// The proof artifact produced by `prove()`.
    type Proof: Clone + std::fmt::Debug;
    /// Key material used by `verify()`. Loaded once, shared read-only.
    type VerifyingKey;
    /// Key material used by `prove()`. Issuer-only.
    type ProvingKey;
    /// The statement plus witness being proven.
    type Circuit;
    /// What `verify()` checks the proof against.
    type PublicInputs: ?Sized;

    /// Generate a proof for `circuit`.
    ///
    /// # Errors
    ///
    /// [`ProveError::Unsatisfied`] if the witness does not satisfy the
    /// constraints; [`ProveError::GenerationFailed`] on backend failure.
    fn prove(&self, pk: &Self::ProvingKey, circuit: Self::Circuit) -> Result<Self::Proof, ProveError>;

    /// `Ok(false)` for a well-formed proof that does not verify.
    ///
    /// # Errors
    ///
    /// [`VerifyError::MalformedProof`] if the inputs cannot be checked at all.
    fn verify(
        &self,
        vk: &Self::VerifyingKey,
        proof: &Self::Proof,
        public_inputs: &Self::PublicInputs,
    ) -> Result<bool, VerifyError>;
}

// ---- Sealed trait implementations for authorized proof systems ----

impl private::Sealed for crate::mock::MockProofSystem {}
impl private::Sealed for crate::groth16::Groth16ProofSystem {}
