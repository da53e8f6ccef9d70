//! # Phase 1: Powers of Tau
//!
//! A universal accumulator for a power-of-two `tier`:
//!
//! ```text
//! tau_g1       = [τ^i · G1]   i < 2·tier − 1
//! tau_g2       = [τ^i · G2]   i < tier
//! alpha_tau_g1 = [α·τ^i · G1] i < tier
//! beta_tau_g1  = [β·τ^i · G1] i < tier
//! beta_g2      = β · G2
//! ```
//!
//! Initialization sets τ = α = β = 1. A contribution multiplies in fresh
//! secrets drawn from the caller's CSPRNG and publishes `τ'·G2`, `α'·G2`,
//! `β'·G2` so anyone can check the update with pairings. The secrets are
//! zeroized before `contribute` returns.
//!
//! ## Security Invariant
//!
//! The final parameters are sound if at least one contributor discarded their
//! secrets. An accumulator with zero contributions has τ = 1 and is rejected
//! by [`Accumulator::verify_well_formed`]'s non-degeneracy check.

use ark_bn254::{Bn254, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ff::{One, UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::error::CeremonyError;

/// Largest supported tier (2^20 constraints).
pub const MAX_TIER: usize = 1 << 20;

pub fn validate_tier(tier: usize) -> Result<(), CeremonyError> {
    if tier < 2 || tier > MAX_TIER || !tier.is_power_of_two() {
        return Err(CeremonyError::InvalidTier(tier));
    }
    Ok(())
}

/// The phase-1 accumulator.
#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Accumulator {
    pub tier: u64,
    pub tau_g1: Vec<G1Affine>,
    pub tau_g2: Vec<G2Affine>,
    pub alpha_tau_g1: Vec<G1Affine>,
    pub beta_tau_g1: Vec<G1Affine>,
    pub beta_g2: G2Affine,
}

/// Public evidence of one contribution.
#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct ContributionKey {
    pub tau_g2: G2Affine,
    pub alpha_g2: G2Affine,
    pub beta_g2: G2Affine,
}

/// Draw a scalar that is neither zero nor one.
fn nontrivial_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Fr {
    loop {
        let s = Fr::rand(rng);
        if !s.is_zero() && !s.is_one() {
            return s;
        }
    }
}

/// `e(a, b) == e(c, d)`.
pub(crate) fn same_ratio(a: G1Affine, b: G2Affine, c: G1Affine, d: G2Affine) -> bool {
    let neg_c: G1Affine = (-c.into_group()).into_affine();
    Bn254::multi_pairing([a, neg_c], [b, d]).is_zero()
}

fn random_scalars<R: RngCore + CryptoRng>(n: usize, rng: &mut R) -> Vec<Fr> {
    (0..n).map(|_| Fr::rand(rng)).collect()
}

impl Accumulator {
    /// Initial accumulator: every element is a generator.
    pub fn new(tier: usize) -> Result<Self, CeremonyError> {
        validate_tier(tier)?;
        let g1 = G1Affine::generator();
        let g2 = G2Affine::generator();
        Ok(Self {
            tier: tier as u64,
            tau_g1: vec![g1; 2 * tier - 1],
            tau_g2: vec![g2; tier],
            alpha_tau_g1: vec![g1; tier],
            beta_tau_g1: vec![g1; tier],
            beta_g2: g2,
        })
    }

    pub fn tier(&self) -> usize {
        self.tier as usize
    }

    /// Apply one random contribution.
    pub fn contribute<R: RngCore + CryptoRng>(&self, rng: &mut R) -> (Self, ContributionKey) {
        let mut tau = nontrivial_scalar(rng);
        let mut alpha = nontrivial_scalar(rng);
        let mut beta = nontrivial_scalar(rng);

        let mut powers = Vec::with_capacity(self.tau_g1.len());
        let mut acc = Fr::one();
        for _ in 0..self.tau_g1.len() {
            powers.push(acc);
            acc *= tau;
        }

        let scale_g1 = |points: &[G1Affine], factor: Fr| -> Vec<G1Affine> {
            let scaled: Vec<G1Projective> = points
                .iter()
                .zip(&powers)
                .map(|(p, s)| *p * (*s * factor))
                .collect();
            G1Projective::normalize_batch(&scaled)
        };
        let tau_g2: Vec<G2Projective> = self.tau_g2.iter().zip(&powers).map(|(p, s)| *p * s).collect();

        let next = Self {
            tier: self.tier,
            tau_g1: scale_g1(&self.tau_g1, Fr::one()),
            tau_g2: G2Projective::normalize_batch(&tau_g2),
            alpha_tau_g1: scale_g1(&self.alpha_tau_g1, alpha),
            beta_tau_g1: scale_g1(&self.beta_tau_g1, beta),
            beta_g2: (self.beta_g2 * beta).into_affine(),
        };
        let g2 = G2Affine::generator();
        let key = ContributionKey {
            tau_g2: (g2 * tau).into_affine(),
            alpha_g2: (g2 * alpha).into_affine(),
            beta_g2: (g2 * beta).into_affine(),
        };

        tau.zeroize();
        alpha.zeroize();
        beta.zeroize();
        acc.zeroize();
        powers.iter_mut().for_each(Zeroize::zeroize);
        (next, key)
    }

    /// Check that the accumulator is a consistent, non-degenerate sequence of
    /// powers, using random linear combinations so the cost is a handful of
    /// pairings plus multi-scalar multiplications.
    pub fn verify_well_formed<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<(), CeremonyError> {
        let n = self.tier();
        validate_tier(n)?;
        let malformed = |m: &str| Err(CeremonyError::MalformedAccumulator(m.to_string()));

        if self.tau_g1.len() != 2 * n - 1
            || self.tau_g2.len() != n
            || self.alpha_tau_g1.len() != n
            || self.beta_tau_g1.len() != n
        {
            return malformed("vector lengths do not match the tier");
        }
        let g1 = G1Affine::generator();
        let g2 = G2Affine::generator();
        if self.tau_g1[0] != g1 || self.tau_g2[0] != g2 {
            return malformed("first powers must be the generators");
        }
        if self.tau_g1[1] == g1 || self.tau_g1[1].is_zero() {
            return malformed("degenerate tau: no effective contribution");
        }
        if self.alpha_tau_g1[0].is_zero() || self.beta_tau_g1[0].is_zero() {
            return malformed("degenerate alpha or beta");
        }

        // tau_g1[i+1] = τ · tau_g1[i]
        let r = random_scalars(self.tau_g1.len() - 1, rng);
        let lhs = G1Projective::msm_unchecked(&self.tau_g1[..self.tau_g1.len() - 1], &r).into_affine();
        let rhs = G1Projective::msm_unchecked(&self.tau_g1[1..], &r).into_affine();
        if !same_ratio(lhs, self.tau_g2[1], rhs, g2) {
            return malformed("tau_g1 is not a sequence of powers");
        }

        // tau_g2[i+1] = τ · tau_g2[i]
        let r = random_scalars(n - 1, rng);
        let lhs = G2Projective::msm_unchecked(&self.tau_g2[..n - 1], &r).into_affine();
        let rhs = G2Projective::msm_unchecked(&self.tau_g2[1..], &r).into_affine();
        if !same_ratio(self.tau_g1[1], lhs, g1, rhs) {
            return malformed("tau_g2 is not a sequence of powers");
        }

        // alpha_tau_g1[i] = α · τ^i · G1, beta_tau_g1[i] = β · τ^i · G1
        let r = random_scalars(n, rng);
        let tau_g2_comb = G2Projective::msm_unchecked(&self.tau_g2, &r).into_affine();
        let alpha_comb = G1Projective::msm_unchecked(&self.alpha_tau_g1, &r).into_affine();
        if !same_ratio(alpha_comb, g2, self.alpha_tau_g1[0], tau_g2_comb) {
            return malformed("alpha_tau_g1 is inconsistent with tau");
        }
        let beta_comb = G1Projective::msm_unchecked(&self.beta_tau_g1, &r).into_affine();
        if !same_ratio(beta_comb, g2, self.beta_tau_g1[0], tau_g2_comb) {
            return malformed("beta_tau_g1 is inconsistent with tau");
        }
        if !same_ratio(self.beta_tau_g1[0], g2, g1, self.beta_g2) {
            return malformed("beta_g2 is inconsistent with beta_tau_g1");
        }
        Ok(())
    }

    /// Check that `self` is `prev` updated by the secrets behind `key`.
    pub fn verify_transition(&self, prev: &Self, key: &ContributionKey, index: usize) -> Result<(), CeremonyError> {
        let invalid = |reason: &str| {
            Err(CeremonyError::InvalidContribution {
                index,
                reason: reason.to_string(),
            })
        };
        if self.tier != prev.tier {
            return invalid("tier changed");
        }
        let g2 = G2Affine::generator();
        for p in [key.tau_g2, key.alpha_g2, key.beta_g2] {
            if p.is_zero() || p == g2 {
                return invalid("contribution key is degenerate");
            }
        }
        if !same_ratio(self.tau_g1[1], g2, prev.tau_g1[1], key.tau_g2) {
            return invalid("tau update does not match the published key");
        }
        if !same_ratio(self.alpha_tau_g1[0], g2, prev.alpha_tau_g1[0], key.alpha_g2) {
            return invalid("alpha update does not match the published key");
        }
        if !same_ratio(self.beta_tau_g1[0], g2, prev.beta_tau_g1[0], key.beta_g2) {
            return invalid("beta update does not match the published key");
        }
        Ok(())
    }
}
