//! # Poseidon Hash
//!
//! Two-to-one Poseidon over the BN254 scalar field, native and in-circuit.
//! Both sides use the same `PoseidonConfig`: width 3 (rate 2, capacity 1),
//! 8 full rounds, 57 partial rounds, S-box `x^5`, round constants and MDS
//! matrix from the Grain LFSR.
//!
//! ## Security Invariant
//!
//! `hash2` and `hash2_var` must agree on every input. A leaf computed by an
//! issuer with `hash2` is only provable if the circuit recomputes it with
//! `hash2_var`; the `native_and_gadget_agree` test pins that.

use std::sync::OnceLock;

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::constraints::CryptographicSpongeVar;
use ark_crypto_primitives::sponge::poseidon::constraints::PoseidonSpongeVar;
use ark_crypto_primitives::sponge::poseidon::{find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge};
use ark_crypto_primitives::sponge::{CryptographicSponge, FieldBasedCryptographicSponge};
use ark_ff::PrimeField;
use ark_r1cs_std::fields::fp::FpVar;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

const FULL_ROUNDS: usize = 8;
const PARTIAL_ROUNDS: usize = 57;
const ALPHA: u64 = 5;
const RATE: usize = 2;
const CAPACITY: usize = 1;

/// The shared parameter set, generated once per process.
pub fn config() -> &'static PoseidonConfig<Fr> {
    static CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();
    CONFIG.get_or_init(|| {
        let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
            Fr::MODULUS_BIT_SIZE as u64,
            RATE,
            FULL_ROUNDS as u64,
            PARTIAL_ROUNDS as u64,
            0,
        );
        PoseidonConfig::new(FULL_ROUNDS, PARTIAL_ROUNDS, ALPHA, mds, ark, RATE, CAPACITY)
    })
}

/// `Poseidon(a, b)` natively.
pub fn hash2(a: &Fr, b: &Fr) -> Fr {
    let mut sponge = PoseidonSponge::<Fr>::new(config());
    sponge.absorb(a);
    sponge.absorb(b);
    sponge.squeeze_native_field_elements(1)[0]
}

/// `Poseidon(a, b)` as constraints.
pub fn hash2_var(
    cs: ConstraintSystemRef<Fr>,
    a: &FpVar<Fr>,
    b: &FpVar<Fr>,
) -> Result<FpVar<Fr>, SynthesisError> {
    let mut sponge = PoseidonSpongeVar::<Fr>::new(cs, config());
    sponge.absorb(a)?;
    sponge.absorb(b)?;
    let mut out = sponge.squeeze_field_elements(1)?;
    out.pop().ok_or(SynthesisError::Unsatisfiable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_r1cs_std::alloc::AllocVar;
    use ark_r1cs_std::R1CSVar;
    use ark_relations::r1cs::ConstraintSystem;

    #[test]
    fn native_and_gadget_agree() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let (a, b) = (Fr::from(20_000_101u64), Fr::from(42u64));
        let av = FpVar::new_witness(cs.clone(), || Ok(a)).unwrap();
        let bv = FpVar::new_witness(cs.clone(), || Ok(b)).unwrap();
        let out = hash2_var(cs.clone(), &av, &bv).unwrap();
        assert_eq!(out.value().unwrap(), hash2(&a, &b));
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn order_matters() {
        let (a, b) = (Fr::from(1u64), Fr::from(2u64));
        assert_ne!(hash2(&a, &b), hash2(&b, &a));
    }

    #[test]
    fn gadget_cost_is_bounded() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let av = FpVar::new_witness(cs.clone(), || Ok(Fr::from(3u64))).unwrap();
        let bv = FpVar::new_witness(cs.clone(), || Ok(Fr::from(4u64))).unwrap();
        hash2_var(cs.clone(), &av, &bv).unwrap();
        assert!(cs.num_constraints() < 400, "{} constraints", cs.num_constraints());
    }
}
