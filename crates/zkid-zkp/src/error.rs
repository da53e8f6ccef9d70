//! # Proof Pipeline Errors
//!
//! Build-time failures (`CompileError`, `CeremonyError`, `ArtifactError`) are
//! fatal and never retried. Runtime failures carry a stable code:
//! [`VerifyErrorCode`] separates client-input errors from rejected claims so a
//! caller can map the former to a 4xx and the latter to a negative decision.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zkid_core::CircuitId;

/// Circuit compilation failure.
#[derive(Error, Debug)]
pub enum CompileError {
    /// Constraint synthesis failed.
    #[error("synthesis of {circuit} failed: {reason}")]
    Synthesis { circuit: CircuitId, reason: String },

    /// The synthesized circuit declares a different number of public inputs
    /// than its witness schema.
    #[error("{circuit} declares {expected} public signals but synthesizes {got}")]
    PublicArityMismatch {
        circuit: CircuitId,
        expected: usize,
        got: usize,
    },

    /// Constraints changed under an unchanged `(circuit, version)`.
    #[error("{circuit} v{version} already built with different constraints; bump the version")]
    ManifestDrift { circuit: CircuitId, version: u32 },

    /// The QAP domain does not fit the requested ceremony tier.
    #[error("{circuit} needs a domain of {domain} but tier is {tier}")]
    DomainExceedsTier {
        circuit: CircuitId,
        domain: usize,
        tier: usize,
    },
}

/// Trusted-setup ceremony failure.
#[derive(Error, Debug)]
pub enum CeremonyError {
    /// Tier is not a power of two or is out of range.
    #[error("invalid ceremony tier {0}: must be a power of two between 2 and 2^20")]
    InvalidTier(usize),

    /// A prepared artifact was found or requested without any contribution.
    #[error("ceremony for tier {0} has no entropy contributions")]
    NoContributions(usize),

    /// A contribution failed its pairing consistency checks.
    #[error("contribution {index} is invalid: {reason}")]
    InvalidContribution { index: usize, reason: String },

    /// An accumulator is not a well-formed sequence of powers.
    #[error("malformed accumulator: {0}")]
    MalformedAccumulator(String),

    /// Key derivation from the prepared artifact failed.
    #[error("circuit-specific setup failed: {0}")]
    KeyDerivation(String),
}

/// Artifact store failure.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// Filesystem I/O failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An artifact could not be encoded or decoded.
    #[error("artifact {} is corrupt: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// An artifact does not match the digest pinned in its build record.
    #[error("digest mismatch for {}: expected {expected}, got {actual}", .path.display())]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

/// Error from the circuit build pipeline.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Ceremony(#[from] CeremonyError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Error during proof generation.
#[derive(Error, Debug)]
pub enum ProveError {
    /// No proving key is loaded for the circuit.
    #[error("artifacts unavailable for {0}")]
    ArtifactsUnavailable(CircuitId),

    /// The caller's inputs could not be mapped to a witness.
    #[error("invalid inputs: {0}")]
    InvalidInputs(String),

    /// The witness does not satisfy the circuit (inputs out of range).
    #[error("witness does not satisfy {0}")]
    Unsatisfied(CircuitId),

    /// The proving algorithm failed.
    #[error("proof generation failed: {0}")]
    GenerationFailed(String),

    /// A mock fallback was requested under the production policy.
    #[error("mock proofs are disabled by the production proof policy")]
    MockDisabled,
}

/// Stable code for a verification failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerifyErrorCode {
    MalformedProof,
    SignalArityMismatch,
    UnknownClaimType,
    PublicSignalMismatch,
    PairingCheckFailed,
    ClaimNotSatisfied,
    MockProofRejected,
    ArtifactsUnavailable,
}

impl VerifyErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedProof => "MALFORMED_PROOF",
            Self::SignalArityMismatch => "SIGNAL_ARITY_MISMATCH",
            Self::UnknownClaimType => "UNKNOWN_CLAIM_TYPE",
            Self::PublicSignalMismatch => "PUBLIC_SIGNAL_MISMATCH",
            Self::PairingCheckFailed => "PAIRING_CHECK_FAILED",
            Self::ClaimNotSatisfied => "CLAIM_NOT_SATISFIED",
            Self::MockProofRejected => "MOCK_PROOF_REJECTED",
            Self::ArtifactsUnavailable => "ARTIFACTS_UNAVAILABLE",
        }
    }

    /// Whether the failure is attributable to malformed client input.
    ///
    /// `PairingCheckFailed` and `ClaimNotSatisfied` are rejected claims, and
    /// `ArtifactsUnavailable` is a deployment fault; none of those are
    /// client errors.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedProof
                | Self::SignalArityMismatch
                | Self::UnknownClaimType
                | Self::PublicSignalMismatch
                | Self::MockProofRejected
        )
    }
}

impl std::fmt::Display for VerifyErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error during proof verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The proof envelope or a signal is structurally invalid.
    #[error("malformed proof: {0}")]
    MalformedProof(String),

    /// Wrong number of public signals for the circuit.
    #[error("expected {expected} public signals, got {got}")]
    SignalArityMismatch { expected: usize, got: usize },

    /// The claim type is not in the claim table.
    #[error("unknown claim type: {0}")]
    UnknownClaimType(String),

    /// A public signal contradicts the claimed statement.
    #[error("public signal {index} ({name}) does not match the claim: {reason}")]
    PublicSignalMismatch {
        index: usize,
        name: &'static str,
        reason: String,
    },

    /// The Groth16 pairing equation does not hold.
    #[error("pairing check failed")]
    PairingCheckFailed,

    /// The proof is valid but its validity flag is not set.
    #[error("proof is valid but the claim is not satisfied")]
    ClaimNotSatisfied,

    /// A mock envelope was presented where mocks are not allowed.
    #[error("mock proof rejected: {0}")]
    MockProofRejected(String),

    /// No verification key is loaded for the circuit.
    #[error("artifacts unavailable for {0}")]
    ArtifactsUnavailable(CircuitId),
}

impl VerifyError {
    pub fn code(&self) -> VerifyErrorCode {
        match self {
            Self::MalformedProof(_) => VerifyErrorCode::MalformedProof,
            Self::SignalArityMismatch { .. } => VerifyErrorCode::SignalArityMismatch,
            Self::UnknownClaimType(_) => VerifyErrorCode::UnknownClaimType,
            Self::PublicSignalMismatch { .. } => VerifyErrorCode::PublicSignalMismatch,
            Self::PairingCheckFailed => VerifyErrorCode::PairingCheckFailed,
            Self::ClaimNotSatisfied => VerifyErrorCode::ClaimNotSatisfied,
            Self::MockProofRejected(_) => VerifyErrorCode::MockProofRejected,
            Self::ArtifactsUnavailable(_) => VerifyErrorCode::ArtifactsUnavailable,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.code().is_client_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_vs_rejections() {
        assert!(VerifyError::MalformedProof("x".into()).is_client_error());
        assert!(VerifyError::SignalArityMismatch { expected: 4, got: 3 }.is_client_error());
        assert!(VerifyError::UnknownClaimType("x".into()).is_client_error());
        assert!(!VerifyError::PairingCheckFailed.is_client_error());
        assert!(!VerifyError::ClaimNotSatisfied.is_client_error());
        assert!(!VerifyError::ArtifactsUnavailable(CircuitId::AgeVerification).is_client_error());
    }

    #[test]
    fn codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&VerifyErrorCode::PairingCheckFailed).unwrap();
        assert_eq!(json, "\"PAIRING_CHECK_FAILED\"");
        assert_eq!(VerifyErrorCode::PairingCheckFailed.as_str(), "PAIRING_CHECK_FAILED");
    }

    #[test]
    fn build_error_is_transparent() {
        let err: BuildError = CeremonyError::NoContributions(512).into();
        assert_eq!(err.to_string(), "ceremony for tier 512 has no entropy contributions");
    }
}
