//! # zkid-zkp: Claim Proofs
//!
//! Zero-knowledge proofs for the claims a relying party can ask for
//! (`age_over_18`, `citizenship`, ...), on Groth16 over BN254.
//!
//! ## Architecture
//!
//! - **Circuits** (`circuits/`): age threshold and citizen-registry
//!   membership, with Poseidon commitments and a nullifier.
//! - **Ceremony** (`ceremony/`): per-tier powers of tau with verified
//!   contributions, Lagrange preparation, and the circuit-specific δ phase.
//! - **Build** (`build.rs`): compile → setup → keys, idempotent, persisted
//!   through the atomic [`ArtifactStore`].
//! - **Prover / Verifier**: key-holding front ends. The verifier never
//!   mutates state after construction.
//! - **Policy** (`policy.rs`): gates the transparent mock backend.
//!
//! ## Crate Policy
//!
//! - `ProofSystem` is sealed; only `Groth16ProofSystem` and
//!   `MockProofSystem` exist.
//! - No `unsafe`.

pub mod artifacts;
pub mod build;
pub mod ceremony;
pub mod circuits;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod field;
pub mod groth16;
pub mod mock;
pub mod policy;
pub mod prover;
pub mod traits;
pub mod verifier;
pub mod witness;

pub use artifacts::ArtifactStore;
pub use build::{build, compile, BuildConfig, BuildOutput, BuildRecord, CircuitManifest};
pub use envelope::{GeneratedProof, ProofEnvelope};
pub use error::{
    ArtifactError, BuildError, CeremonyError, CompileError, ProveError, VerifyError, VerifyErrorCode,
};
pub use groth16::Groth16ProofSystem;
pub use mock::MockProofSystem;
pub use policy::{PolicyMode, ProofBackend, ProofPolicy};
pub use prover::Prover;
pub use traits::ProofSystem;
pub use verifier::{ProofOutcome, ProofReport, VerifiedClaim, Verifier};
pub use witness::ProofRequest;
