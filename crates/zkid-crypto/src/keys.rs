//! # Token Key Schedule
//!
//! A deployment is configured with one master secret. HKDF-SHA256 expands it
//! into a MAC key and a cipher key under distinct info labels, so a
//! compromise of one derived key says nothing about the other.
//!
//! ## Security Invariant
//!
//! All secret bytes are `ZeroizeOnDrop`. `Debug` prints lengths, never bytes.
//! There is no process-wide key: every `TokenKeys` is built from an explicit
//! `MasterSecret` handed to a constructor.

use hkdf::Hkdf;
use rand_core::{OsRng, RngCore};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Minimum master secret length in bytes.
pub const MIN_MASTER_SECRET_LEN: usize = 32;

const HKDF_SALT: &[u8] = b"zkid/token/v1";
const MAC_INFO: &[u8] = b"zkid/token/hmac-sha256";
const CIPHER_INFO: &[u8] = b"zkid/token/chacha20poly1305";

/// The deployment's master token secret.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret(Vec<u8>);

impl MasterSecret {
    /// Wrap raw secret bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() < MIN_MASTER_SECRET_LEN {
            let got = bytes.len();
            let mut bytes = bytes;
            bytes.zeroize();
            return Err(CryptoError::SecretTooShort {
                min: MIN_MASTER_SECRET_LEN,
                got,
            });
        }
        Ok(Self(bytes))
    }

    /// Parse a hex-encoded secret, as supplied through configuration.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.trim()).map_err(|e| CryptoError::HexDecode(e.to_string()))?;
        Self::from_bytes(bytes)
    }

    /// A fresh 32-byte secret from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; MIN_MASTER_SECRET_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Hex rendering, for writing a freshly generated secret to configuration.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSecret")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

/// MAC and cipher keys derived from one master secret.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TokenKeys {
    mac_key: [u8; 32],
    cipher_key: [u8; 32],
}

impl TokenKeys {
    /// Run the HKDF-SHA256 key schedule.
    pub fn derive(master: &MasterSecret) -> Result<Self, CryptoError> {
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), master.expose());
        let mut keys = Self {
            mac_key: [0u8; 32],
            cipher_key: [0u8; 32],
        };
        hk.expand(MAC_INFO, &mut keys.mac_key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        hk.expand(CIPHER_INFO, &mut keys.cipher_key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(keys)
    }

    pub(crate) fn mac_key(&self) -> &[u8; 32] {
        &self.mac_key
    }

    pub(crate) fn cipher_key(&self) -> &[u8; 32] {
        &self.cipher_key
    }
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenKeys { .. }")
    }
}
