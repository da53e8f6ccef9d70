//! Token generation: `BuildPayload → Sign → Encrypt → ComputeChecksum → Emit`.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use url::Url;
use zkid_core::Timestamp;
use zkid_crypto::{short_checksum, PayloadMac, TokenCipher};

use crate::config::TokenConfig;
use crate::error::TokenError;
use crate::link::build_deep_link;
use crate::payload::{ClaimPayload, Issuer, SecureTokenPayload, TokenType, NONCE_BYTES, TOKEN_VERSION};

/// Caller-supplied fields of a new token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub token_type: TokenType,
    pub issuer: Issuer,
    pub payload: ClaimPayload,
    pub ttl: Duration,
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

impl TokenRequest {
    /// A request whose type follows the payload variant.
    pub fn new(issuer: Issuer, payload: ClaimPayload, ttl: Duration) -> Self {
        Self {
            token_type: payload.token_type(),
            issuer,
            payload,
            ttl,
            metadata: None,
        }
    }
}

/// What a QR code or link carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub checksum: String,
    pub deep_link: String,
    pub nonce: String,
    pub expires_at: Timestamp,
}

pub struct TokenIssuer {
    mac: PayloadMac,
    cipher: TokenCipher,
    max_ttl: Duration,
    base_url: Url,
}

impl TokenIssuer {
    pub fn new(config: &TokenConfig) -> Result<Self, TokenError> {
        let (mac, cipher) = config.primitives()?;
        Ok(Self {
            mac,
            cipher,
            max_ttl: config.max_ttl,
            base_url: config.base_url.clone(),
        })
    }

    pub fn generate(&self, request: TokenRequest) -> Result<IssuedToken, TokenError> {
        self.generate_at(request, Timestamp::now())
    }

    pub fn generate_at(&self, request: TokenRequest, now: Timestamp) -> Result<IssuedToken, TokenError> {
        let payload = self.build_payload(request, now)?;
        let sealed = self.seal(&payload)?;
        let token = STANDARD.encode(&sealed);
        let checksum = short_checksum(&sealed);
        let deep_link = build_deep_link(&self.base_url, &token, &checksum)?.to_string();
        tracing::debug!(
            issuer = %payload.issuer.id,
            token_type = ?payload.token_type,
            expires_at = %payload.expires_at,
            "issued token"
        );
        Ok(IssuedToken {
            token,
            checksum,
            deep_link,
            nonce: payload.nonce,
            expires_at: payload.expires_at,
        })
    }

    fn build_payload(&self, request: TokenRequest, now: Timestamp) -> Result<SecureTokenPayload, TokenError> {
        let invalid = |m: String| TokenError::InvalidClaim(m);
        if request.ttl.is_zero() || request.ttl > self.max_ttl {
            return Err(invalid(format!(
                "ttl must be between 1s and {}s",
                self.max_ttl.as_secs()
            )));
        }
        let expires_at = now
            .checked_add(request.ttl)
            .ok_or_else(|| invalid("expiry overflows".into()))?;

        let mut nonce = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut nonce);
        let mut payload = SecureTokenPayload {
            version: TOKEN_VERSION,
            token_type: request.token_type,
            nonce: hex::encode(nonce),
            issued_at: now,
            expires_at,
            issuer: request.issuer,
            payload: request.payload,
            signature: String::new(),
            metadata: request.metadata,
        };
        payload.validate_schema().map_err(invalid)?;
        payload.signature = self.mac.sign(&payload.signing_bytes()?).to_hex();
        Ok(payload)
    }

    fn seal(&self, payload: &SecureTokenPayload) -> Result<Vec<u8>, TokenError> {
        let plaintext = serde_json::to_vec(payload)
            .map_err(|e| TokenError::Canonicalization(e.into()))?;
        Ok(self.cipher.seal(&plaintext)?)
    }

    /// Seal an arbitrary payload without validation or signing.
    #[cfg(test)]
    pub(crate) fn seal_raw(&self, payload: &SecureTokenPayload) -> (String, String) {
        let sealed = self.seal(payload).unwrap();
        (STANDARD.encode(&sealed), short_checksum(&sealed))
    }
}
