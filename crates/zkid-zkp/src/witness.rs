//! # Proof Requests
//!
//! Typed, per-circuit inputs accepted by the prover, and their mapping to a
//! circuit witness. A fresh random salt is drawn for every request so two
//! proofs of the same fact carry unlinkable commitments.

use ark_bn254::Fr;
use ark_ff::UniformRand;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zkid_core::{CircuitId, Timestamp};

use crate::circuits::{
    AgeCircuit, AgeWitness, AnyCircuit, CitizenshipCircuit, CitizenshipWitness, MerklePath, MerkleTree, MERKLE_DEPTH,
};
use crate::error::ProveError;
use crate::field::{fr_from_decimal, fr_to_decimal};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgePublicInputs {
    /// Years.
    pub age_threshold: u64,
    /// Unix seconds.
    pub current_timestamp: i64,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgePrivateInputs {
    /// `YYYY-MM-DD`, interpreted as midnight UTC.
    pub birth_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitizenshipPublicInputs {
    /// Registry root as a decimal field element.
    pub merkle_root: String,
    /// `0` accepts any district.
    pub district_filter: u64,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitizenshipPrivateInputs {
    /// Decimal field element, see [`hash_to_field`](crate::field::hash_to_field).
    pub hashed_id: String,
    pub district: u64,
    /// Sibling hashes, leaf level first.
    pub merkle_path: Vec<String>,
    /// `1` when the node at that level is a right child.
    pub path_indices: Vec<u8>,
}

macro_rules! redacted_debug {
    ($($ty:ident),*) => {$(
        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(concat!(stringify!($ty), "([REDACTED])"))
            }
        }
    )*};
}

redacted_debug!(AgePrivateInputs, CitizenshipPrivateInputs);

/// Inputs for one proof, tagged by circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "circuit", rename_all = "snake_case")]
pub enum ProofRequest {
    AgeVerification {
        public: AgePublicInputs,
        private: AgePrivateInputs,
    },
    CitizenshipMembership {
        public: CitizenshipPublicInputs,
        private: CitizenshipPrivateInputs,
    },
}

impl ProofRequest {
    pub fn age(age_threshold: u64, current_timestamp: i64, birth_date: impl Into<String>) -> Self {
        Self::AgeVerification {
            public: AgePublicInputs {
                age_threshold,
                current_timestamp,
            },
            private: AgePrivateInputs {
                birth_date: birth_date.into(),
            },
        }
    }

    /// Membership request for the citizen at leaf `index` of `registry`.
    /// `None` if `index` is outside the tree.
    pub fn citizenship(
        registry: &MerkleTree,
        index: usize,
        hashed_id: &Fr,
        district: u64,
        district_filter: u64,
    ) -> Option<Self> {
        let path = registry.path(index)?;
        Some(Self::CitizenshipMembership {
            public: CitizenshipPublicInputs {
                merkle_root: fr_to_decimal(&registry.root()),
                district_filter,
            },
            private: CitizenshipPrivateInputs {
                hashed_id: fr_to_decimal(hashed_id),
                district,
                merkle_path: path.siblings.iter().map(fr_to_decimal).collect(),
                path_indices: path.indices.iter().map(|b| u8::from(*b)).collect(),
            },
        })
    }

    pub fn circuit_id(&self) -> CircuitId {
        match self {
            Self::AgeVerification { .. } => CircuitId::AgeVerification,
            Self::CitizenshipMembership { .. } => CircuitId::CitizenshipMembership,
        }
    }

    /// Build the circuit instance with a fresh salt from `rng`.
    pub fn into_circuit<R: RngCore + CryptoRng>(self, rng: &mut R) -> Result<AnyCircuit, ProveError> {
        let salt = Fr::rand(rng);
        match self {
            Self::AgeVerification { public, private } => {
                let birth = Timestamp::from_date_str(&private.birth_date)
                    .map_err(|e| ProveError::InvalidInputs(format!("birth_date: {e}")))?;
                let witness = AgeWitness {
                    age_threshold: public.age_threshold,
                    current_timestamp: public.current_timestamp,
                    birth_timestamp: birth.epoch_secs(),
                    salt,
                };
                if !witness.in_range() {
                    return Err(ProveError::InvalidInputs(
                        "age_threshold and current_timestamp put the age difference out of range".into(),
                    ));
                }
                Ok(AnyCircuit::Age(AgeCircuit::new(witness)))
            }
            Self::CitizenshipMembership { public, private } => {
                let field = |name: &str, s: &str| {
                    fr_from_decimal(s)
                        .ok_or_else(|| ProveError::InvalidInputs(format!("{name} is not a canonical field element")))
                };
                if private.merkle_path.len() != MERKLE_DEPTH || private.path_indices.len() != MERKLE_DEPTH {
                    return Err(ProveError::InvalidInputs(format!(
                        "merkle_path and path_indices must have {MERKLE_DEPTH} entries"
                    )));
                }
                let siblings = private
                    .merkle_path
                    .iter()
                    .map(|s| field("merkle_path", s))
                    .collect::<Result<Vec<_>, _>>()?;
                let indices = private
                    .path_indices
                    .iter()
                    .map(|i| match i {
                        0 => Ok(false),
                        1 => Ok(true),
                        _ => Err(ProveError::InvalidInputs("path_indices must be 0 or 1".into())),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(AnyCircuit::Citizenship(CitizenshipCircuit::new(CitizenshipWitness {
                    merkle_root: field("merkle_root", &public.merkle_root)?,
                    district_filter: public.district_filter,
                    hashed_id: field("hashed_id", &private.hashed_id)?,
                    district: private.district,
                    path: MerklePath { siblings, indices },
                    salt,
                })))
            }
        }
    }
}
