//! Inverse FFT over curve points.
//!
//! Given `[τ^0·G, …, τ^(n-1)·G]` this yields `[L_0(τ)·G, …, L_(n-1)(τ)·G]`,
//! the Lagrange basis of the size-`n` radix-2 domain in the exponent, without
//! anyone knowing `τ`. The domain generator is the one
//! `GeneralEvaluationDomain` picks, so the basis lines up with the QAP
//! reduction the Groth16 prover uses.

use ark_bn254::Fr;
use ark_ec::CurveGroup;
use ark_ff::{Field, One};
use ark_poly::{EvaluationDomain, Radix2EvaluationDomain};

use crate::error::CeremonyError;

/// The radix-2 domain of exactly `size` elements.
pub fn domain(size: usize) -> Result<Radix2EvaluationDomain<Fr>, CeremonyError> {
    let d = Radix2EvaluationDomain::<Fr>::new(size).ok_or(CeremonyError::InvalidTier(size))?;
    if d.size() != size {
        return Err(CeremonyError::InvalidTier(size));
    }
    Ok(d)
}

/// Lagrange basis in the exponent from the first `size` monomial powers.
pub fn lagrange_basis<G>(powers: &[G::Affine], size: usize) -> Result<Vec<G::Affine>, CeremonyError>
where
    G: CurveGroup<ScalarField = Fr>,
{
    if powers.len() < size {
        return Err(CeremonyError::MalformedAccumulator(format!(
            "need {size} powers for the basis, have {}",
            powers.len()
        )));
    }
    let d = domain(size)?;
    let mut points: Vec<G> = powers[..size].iter().map(|p| (*p).into()).collect();
    ifft_in_place(&mut points, &d);
    Ok(G::normalize_batch(&points))
}

fn ifft_in_place<G>(a: &mut [G], d: &Radix2EvaluationDomain<Fr>)
where
    G: CurveGroup<ScalarField = Fr>,
{
    let n = a.len();
    if n <= 1 {
        return;
    }
    let log_n = n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> (usize::BITS - log_n);
        if i < j {
            a.swap(i, j);
        }
    }

    let mut m = 1;
    while m < n {
        let w_m = d.group_gen_inv.pow([(n / (2 * m)) as u64]);
        for k in (0..n).step_by(2 * m) {
            let mut w = Fr::one();
            for j in 0..m {
                let t = if j == 0 { a[k + j + m] } else { a[k + j + m] * w };
                let u = a[k + j];
                a[k + j] = u + t;
                a[k + j + m] = u - t;
                w *= w_m;
            }
        }
        m *= 2;
    }

    for x in a.iter_mut() {
        *x *= d.size_inv;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{G1Projective, G2Projective};
    use ark_ec::Group;

    fn check_against_direct<G: CurveGroup<ScalarField = Fr>>(size: usize) {
        let tau = Fr::from(123_456_789u64);
        let g = G::generator();
        let mut powers = Vec::with_capacity(size);
        let mut acc = Fr::one();
        for _ in 0..size {
            powers.push(g * acc);
            acc *= tau;
        }
        let powers = G::normalize_batch(&powers);
        let basis = lagrange_basis::<G>(&powers, size).unwrap();
        let expected: Vec<G> = domain(size)
            .unwrap()
            .evaluate_all_lagrange_coefficients(tau)
            .into_iter()
            .map(|l| g * l)
            .collect();
        assert_eq!(basis, G::normalize_batch(&expected));
    }

    #[test]
    fn g1_basis_matches_direct_evaluation() {
        check_against_direct::<G1Projective>(16);
    }

    #[test]
    fn g2_basis_matches_direct_evaluation() {
        check_against_direct::<G2Projective>(8);
    }

    #[test]
    fn size_one_is_identity() {
        check_against_direct::<G1Projective>(1);
    }

    #[test]
    fn non_power_of_two_rejected() {
        assert!(matches!(domain(12), Err(CeremonyError::InvalidTier(12))));
    }
}
