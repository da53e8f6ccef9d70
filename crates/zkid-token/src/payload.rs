//! # Token Payload
//!
//! The plaintext a token seals. Wire field names are camelCase.
//!
//! ## Signature Invariant
//!
//! `signature` is `HMAC-SHA256(mac_key, JCS(payload without "signature"))`.
//! The signed view is derived from the serialized payload itself, so every
//! other top-level field, present or added later, is covered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use zkid_core::{CanonicalBytes, CanonicalizationError, Timestamp};
use zkid_zkp::ProofEnvelope;

/// Current payload format.
pub const TOKEN_VERSION: u32 = 1;
/// Versions this build can verify.
pub const SUPPORTED_VERSIONS: &[u32] = &[TOKEN_VERSION];
/// Random bytes per nonce.
pub const NONCE_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// A holder presents a proof to a relying party.
    ProofPresentation,
    /// A relying party asks a holder for claims.
    VerificationRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Issuer {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProofPresentation {
    /// Key into the claim table, e.g. `age_over_18`.
    pub claim_type: String,
    pub proof: ProofEnvelope,
    pub public_signals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullifier_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VerificationRequest {
    pub requested_claims: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// Claim-specific body. `kind` must agree with the payload's `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClaimPayload {
    ProofPresentation(ProofPresentation),
    VerificationRequest(VerificationRequest),
}

impl ClaimPayload {
    pub fn token_type(&self) -> TokenType {
        match self {
            Self::ProofPresentation(_) => TokenType::ProofPresentation,
            Self::VerificationRequest(_) => TokenType::VerificationRequest,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::ProofPresentation(p) => {
                if p.claim_type.trim().is_empty() {
                    return Err("claimType must not be empty".into());
                }
                if p.public_signals.is_empty() {
                    return Err("publicSignals must not be empty".into());
                }
            }
            Self::VerificationRequest(r) => {
                if r.requested_claims.is_empty() {
                    return Err("requestedClaims must not be empty".into());
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SecureTokenPayload {
    pub version: u32,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Hex of [`NONCE_BYTES`] random bytes.
    pub nonce: String,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    pub issuer: Issuer,
    pub payload: ClaimPayload,
    /// Hex HMAC tag; empty until signed.
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

impl SecureTokenPayload {
    /// Canonical bytes of every field except `signature`.
    pub fn signing_bytes(&self) -> Result<CanonicalBytes, CanonicalizationError> {
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            map.remove("signature");
        }
        CanonicalBytes::new(&value)
    }

    /// Structural checks that do not depend on keys or the clock.
    pub fn validate_schema(&self) -> Result<(), String> {
        if self.nonce.len() != NONCE_BYTES * 2 || !self.nonce.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(format!("nonce must be {} hex characters", NONCE_BYTES * 2));
        }
        if self.issuer.id.trim().is_empty() || self.issuer.name.trim().is_empty() {
            return Err("issuer id and name must not be empty".into());
        }
        if self.payload.token_type() != self.token_type {
            return Err("payload kind does not match token type".into());
        }
        if self.expires_at <= self.issued_at {
            return Err("expiresAt must be after issuedAt".into());
        }
        self.payload.validate()
    }

    pub fn presentation(&self) -> Option<&ProofPresentation> {
        match &self.payload {
            ClaimPayload::ProofPresentation(p) => Some(p),
            ClaimPayload::VerificationRequest(_) => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn sample() -> SecureTokenPayload {
        SecureTokenPayload {
            version: TOKEN_VERSION,
            token_type: TokenType::ProofPresentation,
            nonce: "ab".repeat(NONCE_BYTES),
            issued_at: Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
            expires_at: Timestamp::parse("2026-01-01T00:15:00Z").unwrap(),
            issuer: Issuer {
                id: "acme".into(),
                name: "Acme ID".into(),
                domain: None,
            },
            payload: ClaimPayload::ProofPresentation(ProofPresentation {
                claim_type: "age_over_18".into(),
                proof: ProofEnvelope::Mock { digest: "00".into() },
                public_signals: vec!["1".into(), "18".into()],
                nullifier_hash: None,
            }),
            signature: String::new(),
            metadata: None,
        }
    }

    #[test]
    fn wire_names_are_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "proof_presentation");
        assert_eq!(json["expiresAt"], "2026-01-01T00:15:00Z");
        assert_eq!(json["payload"]["kind"], "proof_presentation");
        assert_eq!(json["payload"]["claimType"], "age_over_18");
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn signing_bytes_exclude_signature_only() {
        let mut p = sample();
        let unsigned = p.signing_bytes().unwrap();
        p.signature = "ff".repeat(32);
        assert_eq!(p.signing_bytes().unwrap(), unsigned);

        p.issuer.name = "Acme Identity".into();
        assert_ne!(p.signing_bytes().unwrap(), unsigned);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["extra"] = serde_json::json!(1);
        assert!(serde_json::from_value::<SecureTokenPayload>(json).is_err());
    }

    #[test]
    fn schema_checks() {
        assert!(sample().validate_schema().is_ok());

        let mut short_nonce = sample();
        short_nonce.nonce = "abcd".into();
        assert!(short_nonce.validate_schema().is_err());

        let mut mismatched = sample();
        mismatched.token_type = TokenType::VerificationRequest;
        assert!(mismatched.validate_schema().is_err());

        let mut backwards = sample();
        backwards.expires_at = backwards.issued_at;
        assert!(backwards.validate_schema().is_err());

        let mut anonymous = sample();
        anonymous.issuer.name = " ".into();
        assert!(anonymous.validate_schema().is_err());
    }
}
