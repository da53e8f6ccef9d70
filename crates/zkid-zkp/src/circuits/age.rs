//! # Age Verification Circuit
//!
//! Proves that a committed birth timestamp lies at least `age_threshold`
//! years before `current_timestamp`, without revealing the birth timestamp.
//!
//! ## Public signals (allocation order)
//!
//! | index | name | meaning |
//! |---|---|---|
//! | 0 | `is_valid` | 1 when `current - birth >= threshold * YEAR_SECS` |
//! | 1 | `age_threshold` | threshold in years |
//! | 2 | `current_timestamp` | Unix seconds at proving time |
//! | 3 | `commitment` | `Poseidon(birth_timestamp, salt)` |
//!
//! ## Constraints
//!
//! `birth + 2^62` is decomposed into 63 bits, bounding the birth timestamp to
//! `[-2^62, 2^62)`. `d = current - birth - threshold * YEAR_SECS + 2^64` is
//! decomposed into 65 bits; bit 64 is the comparison result. A witness whose
//! difference falls outside `[-2^64, 2^64)` has no decomposition, so no proof
//! can be produced for it.

use ark_bn254::Fr;
use ark_ff::{One, Zero};
use ark_r1cs_std::alloc::AllocVar;
use ark_r1cs_std::boolean::Boolean;
use ark_r1cs_std::eq::EqGadget;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::fields::FieldVar;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::poseidon;
use crate::field::fr_from_i64;

/// Seconds per Julian year (365.25 days).
pub const YEAR_SECS: i64 = 31_557_600;

const BIRTH_SHIFT_BITS: usize = 62;
const BIRTH_RANGE_BITS: usize = 63;
const DIFF_BITS: usize = 65;

pub const PUBLIC_SIGNALS: [&str; 4] = ["is_valid", "age_threshold", "current_timestamp", "commitment"];
pub const PRIVATE_INPUTS: [&str; 2] = ["birth_timestamp", "salt"];

/// Concrete witness for one age proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeWitness {
    pub age_threshold: u64,
    pub current_timestamp: i64,
    pub birth_timestamp: i64,
    pub salt: Fr,
}

impl AgeWitness {
    /// Whether the integer inputs admit a satisfying assignment.
    pub fn in_range(&self) -> bool {
        let bound = 1i128 << BIRTH_SHIFT_BITS;
        let birth = self.birth_timestamp as i128;
        if birth < -bound || birth >= bound {
            return false;
        }
        let diff = self.difference();
        (-(1i128 << 64)..(1i128 << 64)).contains(&diff)
    }

    fn difference(&self) -> i128 {
        self.current_timestamp as i128
            - self.birth_timestamp as i128
            - self.age_threshold as i128 * YEAR_SECS as i128
    }

    /// Native evaluation of the validity flag.
    pub fn is_valid(&self) -> bool {
        self.difference() >= 0
    }

    pub fn commitment(&self) -> Fr {
        poseidon::hash2(&fr_from_i64(self.birth_timestamp), &self.salt)
    }

    /// Public signals in allocation order.
    pub fn public_inputs(&self) -> Vec<Fr> {
        vec![
            if self.is_valid() { Fr::one() } else { Fr::zero() },
            Fr::from(self.age_threshold),
            fr_from_i64(self.current_timestamp),
            self.commitment(),
        ]
    }
}

/// The age circuit. `witness = None` synthesizes the constraint shape only.
#[derive(Debug, Clone, Default)]
pub struct AgeCircuit {
    pub witness: Option<AgeWitness>,
}

impl AgeCircuit {
    pub fn blank() -> Self {
        Self { witness: None }
    }

    pub fn new(witness: AgeWitness) -> Self {
        Self { witness: Some(witness) }
    }
}

fn bits_of(value: Option<u128>, n: usize) -> Vec<Option<bool>> {
    (0..n).map(|i| value.map(|v| (v >> i) & 1 == 1)).collect()
}

/// Allocate `n` witness bits and constrain them to sum to `target`.
fn enforce_bit_decomposition(
    cs: ConstraintSystemRef<Fr>,
    target: &FpVar<Fr>,
    value: Option<u128>,
    n: usize,
) -> Result<Vec<Boolean<Fr>>, SynthesisError> {
    let mut bits = Vec::with_capacity(n);
    let mut sum = FpVar::<Fr>::zero();
    let mut coeff = Fr::one();
    for bit in bits_of(value, n) {
        let b = Boolean::new_witness(cs.clone(), || bit.ok_or(SynthesisError::AssignmentMissing))?;
        sum += FpVar::from(b.clone()) * coeff;
        coeff += coeff;
        bits.push(b);
    }
    sum.enforce_equal(target)?;
    Ok(bits)
}

impl ConstraintSynthesizer<Fr> for AgeCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let w = self.witness.as_ref();
        let public = w.map(AgeWitness::public_inputs);
        let input = |i: usize| public.as_ref().map(|p| p[i]).ok_or(SynthesisError::AssignmentMissing);

        let is_valid = FpVar::new_input(cs.clone(), || input(0))?;
        let threshold = FpVar::new_input(cs.clone(), || input(1))?;
        let current = FpVar::new_input(cs.clone(), || input(2))?;
        let commitment = FpVar::new_input(cs.clone(), || input(3))?;

        let birth = FpVar::new_witness(cs.clone(), || {
            w.map(|w| fr_from_i64(w.birth_timestamp)).ok_or(SynthesisError::AssignmentMissing)
        })?;
        let salt = FpVar::new_witness(cs.clone(), || {
            w.map(|w| w.salt).ok_or(SynthesisError::AssignmentMissing)
        })?;

        // birth + 2^62 in [0, 2^63)
        let shift = Fr::from(1u64 << BIRTH_SHIFT_BITS);
        let shifted_birth = &birth + shift;
        let shifted_value = w.map(|w| (w.birth_timestamp as i128 + (1i128 << BIRTH_SHIFT_BITS)) as u128);
        enforce_bit_decomposition(cs.clone(), &shifted_birth, shifted_value, BIRTH_RANGE_BITS)?;

        // d = current - birth - threshold * YEAR + 2^64 in [0, 2^65)
        let offset = Fr::from(u64::MAX) + Fr::one();
        let d = &current - &birth - &threshold * Fr::from(YEAR_SECS as u64) + offset;
        let d_value = w.map(|w| (w.difference() + (1i128 << 64)) as u128);
        let bits = enforce_bit_decomposition(cs.clone(), &d, d_value, DIFF_BITS)?;
        is_valid.enforce_equal(&FpVar::from(bits[DIFF_BITS - 1].clone()))?;

        let computed = poseidon::hash2_var(cs, &birth, &salt)?;
        computed.enforce_equal(&commitment)?;
        Ok(())
    }
}
