//! Field-element codecs shared by the circuits, the envelope format and the
//! verifier.
//!
//! Public signals travel as canonical decimal strings: no sign, no leading
//! zeros, strictly below the BN254 scalar modulus. Anything else is rejected
//! rather than reduced, so two distinct strings never name the same element.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;
use sha2::{Digest, Sha256};

/// Render a field element as its canonical decimal string.
pub fn fr_to_decimal(value: &Fr) -> String {
    BigUint::from(value.into_bigint()).to_str_radix(10)
}

/// Parse a canonical decimal string. Returns `None` for anything non-canonical.
pub fn fr_from_decimal(s: &str) -> Option<Fr> {
    if s.is_empty() || s.len() > 78 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    let n = BigUint::parse_bytes(s.as_bytes(), 10)?;
    if n >= BigUint::from(Fr::MODULUS) {
        return None;
    }
    Some(Fr::from(n))
}

/// Embed a signed integer; negatives map to `p - |v|`.
pub fn fr_from_i64(v: i64) -> Fr {
    if v >= 0 {
        Fr::from(v as u64)
    } else {
        -Fr::from(v.unsigned_abs())
    }
}

/// Hash an arbitrary identifier (e.g. a national ID number) into the field.
///
/// Issuers build registry leaves from this value; holders prove knowledge of
/// it without revealing it.
pub fn hash_to_field(data: &[u8]) -> Fr {
    Fr::from_le_bytes_mod_order(&Sha256::digest(data))
}

/// Little-endian bytes of a field element.
pub fn fr_to_bytes(value: &Fr) -> Vec<u8> {
    value.into_bigint().to_bytes_le()
}
