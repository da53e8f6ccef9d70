//! Wire form of a proof and of a generated proof bundle.

use ark_bn254::{Bn254, G1Affine, G2Affine};
use ark_groth16::Proof;
use serde::{Deserialize, Serialize};
use zkid_core::CircuitId;

use crate::codec::{from_compressed_hex, to_compressed_hex};
use crate::error::VerifyError;
use crate::mock::MockProof;
use crate::policy::ProofBackend;

/// A proof as carried in tokens and API payloads.
///
/// `groth16` points are hex of their compressed arkworks encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "system", rename_all = "snake_case")]
pub enum ProofEnvelope {
    Groth16 { pi_a: String, pi_b: String, pi_c: String },
    Mock { digest: String },
}

impl ProofEnvelope {
    pub fn backend(&self) -> ProofBackend {
        match self {
            Self::Groth16 { .. } => ProofBackend::Groth16,
            Self::Mock { .. } => ProofBackend::Mock,
        }
    }

    pub fn from_groth16(proof: &Proof<Bn254>) -> Self {
        Self::Groth16 {
            pi_a: to_compressed_hex(&proof.a),
            pi_b: to_compressed_hex(&proof.b),
            pi_c: to_compressed_hex(&proof.c),
        }
    }

    pub fn from_mock(proof: MockProof) -> Self {
        Self::Mock { digest: proof.digest }
    }

    /// Decode a Groth16 envelope, validating every point.
    pub fn to_groth16(&self) -> Result<Proof<Bn254>, VerifyError> {
        match self {
            Self::Groth16 { pi_a, pi_b, pi_c } => {
                let malformed = |name: &str, e: String| VerifyError::MalformedProof(format!("{name}: {e}"));
                Ok(Proof {
                    a: from_compressed_hex::<G1Affine>(pi_a).map_err(|e| malformed("pi_a", e))?,
                    b: from_compressed_hex::<G2Affine>(pi_b).map_err(|e| malformed("pi_b", e))?,
                    c: from_compressed_hex::<G1Affine>(pi_c).map_err(|e| malformed("pi_c", e))?,
                })
            }
            Self::Mock { .. } => Err(VerifyError::MalformedProof("expected a groth16 envelope".into())),
        }
    }
}

/// Output of the prover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedProof {
    pub circuit_id: CircuitId,
    pub proof: ProofEnvelope,
    /// Decimal field elements in the circuit's declared order.
    pub public_signals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullifier_hash: Option<String>,
}

impl GeneratedProof {
    pub fn is_mock(&self) -> bool {
        self.proof.backend() == ProofBackend::Mock
    }
}
