//! # Citizenship Membership Circuit
//!
//! Proves that `Poseidon(hashed_id, district)` is a leaf of the registry tree
//! with root `merkle_root`, optionally restricted to one district, and binds a
//! nullifier so the same credential cannot be redeemed twice.
//!
//! ## Public signals (allocation order)
//!
//! | index | name | meaning |
//! |---|---|---|
//! | 0 | `is_valid` | root matches AND (`district_filter == 0` OR district matches) |
//! | 1 | `merkle_root` | registry root |
//! | 2 | `district_filter` | 0 for any district |
//! | 3 | `nullifier_hash` | `Poseidon(hashed_id, NULLIFIER_DOMAIN)` |
//! | 4 | `commitment` | `Poseidon(hashed_id, salt)` |

use ark_bn254::Fr;
use ark_ff::{One, Zero};
use ark_r1cs_std::alloc::AllocVar;
use ark_r1cs_std::boolean::Boolean;
use ark_r1cs_std::eq::EqGadget;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::fields::FieldVar;
use ark_r1cs_std::select::CondSelectGadget;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::merkle::{citizen_leaf, MerklePath, MERKLE_DEPTH};
use super::poseidon;

/// Domain separator hashed with the identifier to form the nullifier.
pub const NULLIFIER_DOMAIN: u64 = 0x7a6b_6964_6e75_6c6c; // "zkidnull"

pub const PUBLIC_SIGNALS: [&str; 5] = [
    "is_valid",
    "merkle_root",
    "district_filter",
    "nullifier_hash",
    "commitment",
];
pub const PRIVATE_INPUTS: [&str; 5] = ["hashed_id", "district", "merkle_path", "path_indices", "salt"];

/// Index of the nullifier among the public signals.
pub const NULLIFIER_SIGNAL: usize = 3;

/// Nullifier for an identifier.
pub fn nullifier_hash(hashed_id: &Fr) -> Fr {
    poseidon::hash2(hashed_id, &Fr::from(NULLIFIER_DOMAIN))
}

/// Concrete witness for one membership proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitizenshipWitness {
    pub merkle_root: Fr,
    pub district_filter: u64,
    pub hashed_id: Fr,
    pub district: u64,
    pub path: MerklePath,
    pub salt: Fr,
}

impl CitizenshipWitness {
    pub fn is_valid(&self) -> bool {
        let root_ok = self.path.root_from(&citizen_leaf(&self.hashed_id, self.district)) == self.merkle_root;
        let district_ok = self.district_filter == 0 || self.district == self.district_filter;
        root_ok && district_ok
    }

    pub fn public_inputs(&self) -> Vec<Fr> {
        vec![
            if self.is_valid() { Fr::one() } else { Fr::zero() },
            self.merkle_root,
            Fr::from(self.district_filter),
            nullifier_hash(&self.hashed_id),
            poseidon::hash2(&self.hashed_id, &self.salt),
        ]
    }
}

/// The membership circuit. `witness = None` synthesizes the shape only.
#[derive(Debug, Clone, Default)]
pub struct CitizenshipCircuit {
    pub witness: Option<CitizenshipWitness>,
}

impl CitizenshipCircuit {
    pub fn blank() -> Self {
        Self { witness: None }
    }

    pub fn new(witness: CitizenshipWitness) -> Self {
        Self { witness: Some(witness) }
    }
}

impl ConstraintSynthesizer<Fr> for CitizenshipCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let w = self.witness.as_ref();
        let public = w.map(CitizenshipWitness::public_inputs);
        let input = |i: usize| public.as_ref().map(|p| p[i]).ok_or(SynthesisError::AssignmentMissing);
        let missing = || SynthesisError::AssignmentMissing;

        let is_valid = FpVar::new_input(cs.clone(), || input(0))?;
        let root = FpVar::new_input(cs.clone(), || input(1))?;
        let filter = FpVar::new_input(cs.clone(), || input(2))?;
        let nullifier = FpVar::new_input(cs.clone(), || input(3))?;
        let commitment = FpVar::new_input(cs.clone(), || input(4))?;

        let hashed_id = FpVar::new_witness(cs.clone(), || w.map(|w| w.hashed_id).ok_or_else(missing))?;
        let district = FpVar::new_witness(cs.clone(), || {
            w.map(|w| Fr::from(w.district)).ok_or_else(missing)
        })?;
        let salt = FpVar::new_witness(cs.clone(), || w.map(|w| w.salt).ok_or_else(missing))?;

        let mut node = poseidon::hash2_var(cs.clone(), &hashed_id, &district)?;
        for level in 0..MERKLE_DEPTH {
            let sibling = FpVar::new_witness(cs.clone(), || {
                w.and_then(|w| w.path.siblings.get(level).copied()).ok_or_else(missing)
            })?;
            let is_right = Boolean::new_witness(cs.clone(), || {
                w.and_then(|w| w.path.indices.get(level).copied()).ok_or_else(missing)
            })?;
            let left = FpVar::conditionally_select(&is_right, &sibling, &node)?;
            let right = FpVar::conditionally_select(&is_right, &node, &sibling)?;
            node = poseidon::hash2_var(cs.clone(), &left, &right)?;
        }

        let root_ok = node.is_eq(&root)?;
        let any_district = filter.is_eq(&FpVar::zero())?;
        let district_ok = any_district.or(&district.is_eq(&filter)?)?;
        let valid = root_ok.and(&district_ok)?;
        is_valid.enforce_equal(&FpVar::from(valid))?;

        let domain = FpVar::constant(Fr::from(NULLIFIER_DOMAIN));
        poseidon::hash2_var(cs.clone(), &hashed_id, &domain)?.enforce_equal(&nullifier)?;
        poseidon::hash2_var(cs, &hashed_id, &salt)?.enforce_equal(&commitment)?;
        Ok(())
    }
}
