//! # Phase 2: Circuit-Specific Keys
//!
//! [`PreparedSetup`] is the phase-1 accumulator plus its Lagrange basis in
//! the exponent. [`derive_proving_key`] combines it with a circuit's R1CS
//! matrices into an arkworks Groth16 proving key with `δ = γ = 1`;
//! [`contribute_delta`] then multiplies in a secret `δ'` so the final key
//! depends on entropy nobody retains.
//!
//! The key layout follows the libsnark QAP reduction used by `ark-groth16`:
//! over a domain of size `m = |constraints| + |instance|`, instance variable
//! `j` additionally owns `L_{constraints + j}` in its `A` polynomial.

use ark_bn254::{Bn254, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ff::{Field, One, UniformRand, Zero};
use ark_groth16::{ProvingKey, VerifyingKey};
use ark_poly::{EvaluationDomain, GeneralEvaluationDomain};
use ark_relations::r1cs::ConstraintMatrices;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

use super::fft::lagrange_basis;
use super::phase1::{same_ratio, Accumulator};
use crate::error::CeremonyError;

/// The universal setup, prepared for circuit-specific derivation.
#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct PreparedSetup {
    pub accumulator: Accumulator,
    pub basis: LagrangeBasis,
}

/// `L_k(τ)` in each group, for a fixed domain size.
#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct LagrangeBasis {
    pub g1: Vec<G1Affine>,
    pub g2: Vec<G2Affine>,
    pub alpha_g1: Vec<G1Affine>,
    pub beta_g1: Vec<G1Affine>,
}

impl LagrangeBasis {
    fn from_accumulator(acc: &Accumulator, size: usize) -> Result<Self, CeremonyError> {
        Ok(Self {
            g1: lagrange_basis::<G1Projective>(&acc.tau_g1, size)?,
            g2: lagrange_basis::<G2Projective>(&acc.tau_g2, size)?,
            alpha_g1: lagrange_basis::<G1Projective>(&acc.alpha_tau_g1, size)?,
            beta_g1: lagrange_basis::<G1Projective>(&acc.beta_tau_g1, size)?,
        })
    }

    pub fn size(&self) -> usize {
        self.g1.len()
    }
}

impl PreparedSetup {
    /// Compute the tier-sized Lagrange basis.
    pub fn prepare(accumulator: Accumulator) -> Result<Self, CeremonyError> {
        let basis = LagrangeBasis::from_accumulator(&accumulator, accumulator.tier())?;
        Ok(Self { accumulator, basis })
    }

    pub fn tier(&self) -> usize {
        self.accumulator.tier()
    }

    /// Basis for a circuit domain of `size <= tier`.
    pub fn basis_for(&self, size: usize) -> Result<LagrangeBasis, CeremonyError> {
        if size == self.basis.size() {
            return Ok(self.basis.clone());
        }
        if size > self.tier() {
            return Err(CeremonyError::KeyDerivation(format!(
                "domain {size} exceeds tier {}",
                self.tier()
            )));
        }
        LagrangeBasis::from_accumulator(&self.accumulator, size)
    }
}

/// Domain size the Groth16 QAP reduction uses for these matrices.
pub fn qap_domain_size(matrices: &ConstraintMatrices<Fr>) -> Option<usize> {
    GeneralEvaluationDomain::<Fr>::new(matrices.num_constraints + matrices.num_instance_variables)
        .map(|d| d.size())
}

fn accumulate(acc: &mut [G1Projective], index: usize, base: &G1Affine, coeff: &Fr) {
    if coeff.is_one() {
        acc[index] += *base;
    } else {
        acc[index] += *base * coeff;
    }
}

/// Derive the initial proving key (`δ = 1`).
pub fn derive_proving_key(
    setup: &PreparedSetup,
    matrices: &ConstraintMatrices<Fr>,
) -> Result<ProvingKey<Bn254>, CeremonyError> {
    let m = qap_domain_size(matrices)
        .ok_or_else(|| CeremonyError::KeyDerivation("no evaluation domain for circuit".into()))?;
    let basis = setup.basis_for(m)?;
    let acc = &setup.accumulator;

    let num_instance = matrices.num_instance_variables;
    let num_vars = num_instance + matrices.num_witness_variables;
    let nc = matrices.num_constraints;

    let zero_g1 = G1Projective::zero();
    let mut a_g1 = vec![zero_g1; num_vars];
    let mut b_g1 = vec![zero_g1; num_vars];
    let mut b_g2 = vec![G2Projective::zero(); num_vars];
    // (β·a_j + α·b_j + c_j)(τ) · G1
    let mut abc_g1 = vec![zero_g1; num_vars];

    for j in 0..num_instance {
        a_g1[j] += basis.g1[nc + j];
        abc_g1[j] += basis.beta_g1[nc + j];
    }
    for k in 0..nc {
        for (coeff, j) in &matrices.a[k] {
            accumulate(&mut a_g1, *j, &basis.g1[k], coeff);
            accumulate(&mut abc_g1, *j, &basis.beta_g1[k], coeff);
        }
        for (coeff, j) in &matrices.b[k] {
            accumulate(&mut b_g1, *j, &basis.g1[k], coeff);
            accumulate(&mut abc_g1, *j, &basis.alpha_g1[k], coeff);
            if coeff.is_one() {
                b_g2[*j] += basis.g2[k];
            } else {
                b_g2[*j] += basis.g2[k] * coeff;
            }
        }
        for (coeff, j) in &matrices.c[k] {
            accumulate(&mut abc_g1, *j, &basis.g1[k], coeff);
        }
    }

    let abc = G1Projective::normalize_batch(&abc_g1);
    let h_query: Vec<G1Projective> = (0..m - 1)
        .map(|i| acc.tau_g1[i + m].into_group() - acc.tau_g1[i])
        .collect();

    let g1 = G1Affine::generator();
    let g2 = G2Affine::generator();
    let vk = VerifyingKey::<Bn254> {
        alpha_g1: acc.alpha_tau_g1[0],
        beta_g2: acc.beta_g2,
        gamma_g2: g2,
        delta_g2: g2,
        gamma_abc_g1: abc[..num_instance].to_vec(),
    };
    Ok(ProvingKey {
        vk,
        beta_g1: acc.beta_tau_g1[0],
        delta_g1: g1,
        a_query: G1Projective::normalize_batch(&a_g1),
        b_g1_query: G1Projective::normalize_batch(&b_g1),
        b_g2_query: G2Projective::normalize_batch(&b_g2),
        h_query: G1Projective::normalize_batch(&h_query),
        l_query: abc[num_instance..].to_vec(),
    })
}

/// Multiply a fresh secret `δ'` into the key.
pub fn contribute_delta<R: RngCore + CryptoRng>(pk: &ProvingKey<Bn254>, rng: &mut R) -> ProvingKey<Bn254> {
    let mut delta = loop {
        let d = Fr::rand(rng);
        if !d.is_zero() && !d.is_one() {
            break d;
        }
    };
    // Non-zero, so the inverse exists.
    let mut delta_inv = delta.inverse().unwrap_or_else(Fr::one);

    let scale = |points: &[G1Affine]| -> Vec<G1Affine> {
        let scaled: Vec<G1Projective> = points.iter().map(|p| *p * delta_inv).collect();
        G1Projective::normalize_batch(&scaled)
    };
    let mut next = pk.clone();
    next.delta_g1 = (pk.delta_g1 * delta).into_affine();
    next.vk.delta_g2 = (pk.vk.delta_g2 * delta).into_affine();
    next.h_query = scale(&pk.h_query);
    next.l_query = scale(&pk.l_query);

    delta.zeroize();
    delta_inv.zeroize();
    next
}

/// Check that `next` is `prev` with one valid `δ` update applied.
pub fn verify_delta_contribution<R: RngCore + CryptoRng>(
    prev: &ProvingKey<Bn254>,
    next: &ProvingKey<Bn254>,
    rng: &mut R,
) -> Result<(), CeremonyError> {
    let invalid = |reason: &str| {
        Err(CeremonyError::InvalidContribution {
            index: 1,
            reason: reason.to_string(),
        })
    };
    let g1 = G1Affine::generator();
    let g2 = G2Affine::generator();

    if next.delta_g1 == prev.delta_g1 || next.delta_g1.is_zero() {
        return invalid("delta was not updated");
    }
    if next.h_query.len() != prev.h_query.len() || next.l_query.len() != prev.l_query.len() {
        return invalid("query lengths changed");
    }
    if next.a_query != prev.a_query
        || next.b_g1_query != prev.b_g1_query
        || next.b_g2_query != prev.b_g2_query
        || next.vk.gamma_abc_g1 != prev.vk.gamma_abc_g1
        || next.vk.alpha_g1 != prev.vk.alpha_g1
        || next.vk.beta_g2 != prev.vk.beta_g2
        || next.beta_g1 != prev.beta_g1
    {
        return invalid("delta-independent elements changed");
    }
    if !same_ratio(next.delta_g1, g2, g1, next.vk.delta_g2) {
        return invalid("delta_g1 and delta_g2 disagree");
    }
    // l and h scale by 1/δ', δ by δ': e(l_next, δ_next) == e(l_prev, δ_prev).
    for (name, p, n) in [
        ("l_query", &prev.l_query, &next.l_query),
        ("h_query", &prev.h_query, &next.h_query),
    ] {
        if p.is_empty() {
            continue;
        }
        let r: Vec<Fr> = (0..p.len()).map(|_| Fr::rand(rng)).collect();
        let prev_comb = G1Projective::msm_unchecked(p, &r).into_affine();
        let next_comb = G1Projective::msm_unchecked(n, &r).into_affine();
        if !same_ratio(next_comb, next.vk.delta_g2, prev_comb, prev.vk.delta_g2) {
            return invalid(&format!("{name} not scaled by the delta update"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_groth16::Groth16;
    use ark_r1cs_std::alloc::AllocVar;
    use ark_r1cs_std::eq::EqGadget;
    use ark_r1cs_std::fields::fp::FpVar;
    use ark_relations::r1cs::{
        ConstraintSynthesizer, ConstraintSystem, ConstraintSystemRef, OptimizationGoal, SynthesisError,
        SynthesisMode,
    };
    use ark_snark::SNARK;
    use rand_core::OsRng;

    /// `x * y == z` and `x + z == w` with public z and w.
    #[derive(Clone)]
    struct Toy {
        x: Option<Fr>,
        y: Option<Fr>,
    }

    impl ConstraintSynthesizer<Fr> for Toy {
        fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
            let z_val = self.x.zip(self.y).map(|(x, y)| x * y);
            let w_val = self.x.zip(z_val).map(|(x, z)| x + z);
            let z = FpVar::new_input(cs.clone(), || z_val.ok_or(SynthesisError::AssignmentMissing))?;
            let w = FpVar::new_input(cs.clone(), || w_val.ok_or(SynthesisError::AssignmentMissing))?;
            let x = FpVar::new_witness(cs.clone(), || self.x.ok_or(SynthesisError::AssignmentMissing))?;
            let y = FpVar::new_witness(cs.clone(), || self.y.ok_or(SynthesisError::AssignmentMissing))?;
            (&x * &y).enforce_equal(&z)?;
            (&x + &z).enforce_equal(&w)?;
            Ok(())
        }
    }

    fn matrices() -> ConstraintMatrices<Fr> {
        let cs = ConstraintSystem::new_ref();
        cs.set_optimization_goal(OptimizationGoal::Constraints);
        cs.set_mode(SynthesisMode::Setup);
        Toy { x: None, y: None }.generate_constraints(cs.clone()).unwrap();
        cs.finalize();
        cs.to_matrices().unwrap()
    }

    fn setup(tier: usize) -> PreparedSetup {
        let (acc, _) = Accumulator::new(tier).unwrap().contribute(&mut OsRng);
        PreparedSetup::prepare(acc).unwrap()
    }

    fn prove_and_verify(pk: &ProvingKey<Bn254>, x: u64, y: u64, public: [Fr; 2]) -> bool {
        let circuit = Toy {
            x: Some(Fr::from(x)),
            y: Some(Fr::from(y)),
        };
        let proof = Groth16::<Bn254>::prove(pk, circuit, &mut OsRng).unwrap();
        let pvk = Groth16::<Bn254>::process_vk(&pk.vk).unwrap();
        Groth16::<Bn254>::verify_with_processed_vk(&pvk, &public, &proof).unwrap()
    }

    #[test]
    fn derived_key_proves_and_verifies() {
        let mats = matrices();
        let pk = derive_proving_key(&setup(8), &mats).unwrap();
        let pk = contribute_delta(&pk, &mut OsRng);
        assert!(prove_and_verify(&pk, 3, 5, [Fr::from(15u64), Fr::from(18u64)]));
        assert!(!prove_and_verify(&pk, 3, 5, [Fr::from(16u64), Fr::from(18u64)]));
    }

    #[test]
    fn smaller_domain_recomputes_basis() {
        let mats = matrices();
        let m = qap_domain_size(&mats).unwrap();
        let prepared = setup(16);
        assert!(m < prepared.tier());
        assert_eq!(prepared.basis_for(m).unwrap().size(), m);
        let pk = derive_proving_key(&prepared, &mats).unwrap();
        assert!(prove_and_verify(&pk, 2, 7, [Fr::from(14u64), Fr::from(16u64)]));
    }

    #[test]
    fn domain_larger_than_tier_rejected() {
        let prepared = setup(2);
        assert!(matches!(
            derive_proving_key(&prepared, &matrices()),
            Err(CeremonyError::KeyDerivation(_))
        ));
    }

    #[test]
    fn delta_contribution_verifies() {
        let pk0 = derive_proving_key(&setup(8), &matrices()).unwrap();
        let pk1 = contribute_delta(&pk0, &mut OsRng);
        verify_delta_contribution(&pk0, &pk1, &mut OsRng).unwrap();
        assert!(verify_delta_contribution(&pk0, &pk0, &mut OsRng).is_err());

        let mut forged = pk1.clone();
        forged.l_query[0] = pk0.l_query[0];
        assert!(verify_delta_contribution(&pk0, &forged, &mut OsRng).is_err());
    }
}
