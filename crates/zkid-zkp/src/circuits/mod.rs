//! # Circuits
//!
//! The circuit families behind the claim table, and their shared descriptor:
//! identifier, version, default ceremony tier and the witness schema (ordered
//! public signal names and private input names).
//!
//! [`AnyCircuit`] is the tagged union the Groth16 backend synthesizes. Adding
//! a circuit is a variant here plus a [`CircuitId`] variant; every `match`
//! over either enum then has to handle it.

pub mod age;
pub mod citizenship;
pub mod merkle;
pub mod poseidon;

use ark_bn254::Fr;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use serde::{Deserialize, Serialize};
use zkid_core::CircuitId;

pub use age::{AgeCircuit, AgeWitness};
pub use citizenship::{CitizenshipCircuit, CitizenshipWitness};
pub use merkle::{citizen_leaf, MerklePath, MerkleTree, MERKLE_DEPTH};

/// Static description of a circuit family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitDescriptor {
    pub id: CircuitId,
    /// Bumped whenever the constraints change.
    pub version: u32,
    /// Smallest power-of-two ceremony tier the circuit's domain fits.
    pub default_tier: usize,
    pub public_signals: &'static [&'static str],
    pub private_inputs: &'static [&'static str],
    /// Index of the nullifier among the public signals, if the circuit has one.
    pub nullifier_signal: Option<usize>,
}

/// Index of the validity flag in every circuit's public signals.
pub const VALIDITY_SIGNAL: usize = 0;

pub fn descriptor(id: CircuitId) -> CircuitDescriptor {
    match id {
        CircuitId::AgeVerification => CircuitDescriptor {
            id,
            version: 1,
            default_tier: 512,
            public_signals: &age::PUBLIC_SIGNALS,
            private_inputs: &age::PRIVATE_INPUTS,
            nullifier_signal: None,
        },
        CircuitId::CitizenshipMembership => CircuitDescriptor {
            id,
            version: 1,
            default_tier: 4096,
            public_signals: &citizenship::PUBLIC_SIGNALS,
            private_inputs: &citizenship::PRIVATE_INPUTS,
            nullifier_signal: Some(citizenship::NULLIFIER_SIGNAL),
        },
    }
}

/// Witness-program interface written next to the compiled constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessSchema {
    pub circuit_id: CircuitId,
    pub version: u32,
    pub public_signals: Vec<String>,
    pub private_inputs: Vec<String>,
}

impl From<&CircuitDescriptor> for WitnessSchema {
    fn from(d: &CircuitDescriptor) -> Self {
        Self {
            circuit_id: d.id,
            version: d.version,
            public_signals: d.public_signals.iter().map(|s| s.to_string()).collect(),
            private_inputs: d.private_inputs.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A synthesizable instance of any supported circuit.
#[derive(Debug, Clone)]
pub enum AnyCircuit {
    Age(AgeCircuit),
    Citizenship(CitizenshipCircuit),
}

impl AnyCircuit {
    /// Shape-only instance for key generation.
    pub fn blank(id: CircuitId) -> Self {
        match id {
            CircuitId::AgeVerification => Self::Age(AgeCircuit::blank()),
            CircuitId::CitizenshipMembership => Self::Citizenship(CitizenshipCircuit::blank()),
        }
    }

    pub fn id(&self) -> CircuitId {
        match self {
            Self::Age(_) => CircuitId::AgeVerification,
            Self::Citizenship(_) => CircuitId::CitizenshipMembership,
        }
    }

    /// Public inputs in allocation order, or `None` for a blank instance.
    pub fn public_inputs(&self) -> Option<Vec<Fr>> {
        match self {
            Self::Age(c) => c.witness.as_ref().map(AgeWitness::public_inputs),
            Self::Citizenship(c) => c.witness.as_ref().map(CitizenshipWitness::public_inputs),
        }
    }
}

impl ConstraintSynthesizer<Fr> for AnyCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        match self {
            Self::Age(c) => c.generate_constraints(cs),
            Self::Citizenship(c) => c.generate_constraints(cs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_match_their_ids() {
        for id in CircuitId::ALL {
            let d = descriptor(id);
            assert_eq!(d.id, id);
            assert_eq!(d.public_signals[VALIDITY_SIGNAL], "is_valid");
            assert!(d.default_tier.is_power_of_two());
            assert_eq!(AnyCircuit::blank(id).id(), id);
        }
    }

    #[test]
    fn only_citizenship_has_a_nullifier() {
        assert_eq!(descriptor(CircuitId::AgeVerification).nullifier_signal, None);
        let d = descriptor(CircuitId::CitizenshipMembership);
        assert_eq!(d.public_signals[d.nullifier_signal.unwrap()], "nullifier_hash");
    }

    #[test]
    fn witness_schema_lists_signals_in_order() {
        let schema = WitnessSchema::from(&descriptor(CircuitId::AgeVerification));
        assert_eq!(
            schema.public_signals,
            vec!["is_valid", "age_threshold", "current_timestamp", "commitment"]
        );
        assert!(AnyCircuit::blank(CircuitId::AgeVerification).public_inputs().is_none());
    }
}
