//! # Cryptographic Error Types

use thiserror::Error;

/// Errors from the token key schedule, MAC and cipher.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Master secret shorter than the minimum length.
    #[error("master secret too short: need at least {min} bytes, got {got}")]
    SecretTooShort { min: usize, got: usize },

    /// HKDF expansion failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// MAC tag had the wrong length or was not valid hex.
    #[error("invalid MAC tag: {0}")]
    InvalidMac(String),

    /// AEAD encryption failed.
    #[error("encryption failed")]
    Encryption,

    /// Sealed bytes shorter than nonce plus authentication tag.
    #[error("sealed token too short: {0} bytes")]
    CiphertextTooShort(usize),

    /// Authentication tag did not verify under the cipher key.
    #[error("decryption failed: authentication tag mismatch")]
    Decryption,

    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    HexDecode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_too_short_display() {
        let msg = CryptoError::SecretTooShort { min: 32, got: 8 }.to_string();
        assert!(msg.contains("32"));
        assert!(msg.contains('8'));
    }

    #[test]
    fn decryption_display_does_not_leak_detail() {
        assert_eq!(
            CryptoError::Decryption.to_string(),
            "decryption failed: authentication tag mismatch"
        );
    }
}
