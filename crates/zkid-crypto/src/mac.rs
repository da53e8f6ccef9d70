//! # Payload MAC
//!
//! HMAC-SHA256 over canonical payload bytes. `PayloadMac::sign` only accepts
//! [`CanonicalBytes`], so a signature is always taken over the key-sorted JCS
//! form regardless of how the payload struct orders its fields.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zkid_core::CanonicalBytes;

use crate::error::CryptoError;
use crate::keys::TokenKeys;

type HmacSha256 = Hmac<Sha256>;

/// A 32-byte HMAC-SHA256 tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacTag([u8; 32]);

impl MacTag {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| CryptoError::InvalidMac(e.to_string()))?;
        Ok(Self(bytes))
    }
}

/// Signs and verifies canonical payloads with the derived MAC key.
#[derive(Clone)]
pub struct PayloadMac {
    mac: HmacSha256,
}

impl PayloadMac {
    pub fn new(keys: &TokenKeys) -> Result<Self, CryptoError> {
        let mac = <HmacSha256 as Mac>::new_from_slice(keys.mac_key())
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(Self { mac })
    }

    /// Compute the tag over `data`.
    pub fn sign(&self, data: &CanonicalBytes) -> MacTag {
        let mut mac = self.mac.clone();
        mac.update(data.as_bytes());
        let mut tag = [0u8; 32];
        tag.copy_from_slice(&mac.finalize().into_bytes());
        MacTag(tag)
    }

    /// Constant-time verification of `tag` over `data`.
    pub fn verify(&self, data: &CanonicalBytes, tag: &MacTag) -> bool {
        let mut mac = self.mac.clone();
        mac.update(data.as_bytes());
        mac.verify_slice(tag.as_bytes()).is_ok()
    }
}

impl std::fmt::Debug for PayloadMac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PayloadMac { .. }")
    }
}
