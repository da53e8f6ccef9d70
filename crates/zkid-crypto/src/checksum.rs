//! # Ciphertext Checksum
//!
//! The first 16 hex characters of SHA-256 over the sealed token bytes. The
//! verifier compares it before attempting decryption so that garbage input is
//! dropped without any AEAD work. It is not a security boundary: anyone can
//! compute it.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Length of the checksum in hex characters.
pub const CHECKSUM_HEX_LEN: usize = 16;

/// Short checksum of `sealed`.
pub fn short_checksum(sealed: &[u8]) -> String {
    let digest = Sha256::digest(sealed);
    hex::encode(&digest[..CHECKSUM_HEX_LEN / 2])
}

/// Whether `claimed` is the checksum of `sealed`. Case-insensitive.
pub fn checksum_matches(sealed: &[u8], claimed: &str) -> bool {
    let expected = short_checksum(sealed);
    let claimed = claimed.to_ascii_lowercase();
    expected.len() == claimed.len() && bool::from(expected.as_bytes().ct_eq(claimed.as_bytes()))
}
