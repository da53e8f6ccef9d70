use serde::{Deserialize, Serialize};
use thiserror::Error;
use zkid_core::CanonicalizationError;
use zkid_crypto::CryptoError;

/// Terminal rejection codes of token verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenErrorCode {
    InvalidFormat,
    UnsupportedVersion,
    Expired,
    InvalidSignature,
    ReplayAttack,
}

impl TokenErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::UnsupportedVersion => "UNSUPPORTED_VERSION",
            Self::Expired => "EXPIRED",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::ReplayAttack => "REPLAY_ATTACK",
        }
    }

    /// Message shown to the person who scanned the code.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "This code could not be read. It may be damaged or was not issued by this service.",
            Self::UnsupportedVersion => "This code was created by an incompatible version. Ask the issuer for a new one.",
            Self::Expired => "This code has expired. Ask the issuer for a new one.",
            Self::InvalidSignature => "This code failed its authenticity check and may have been tampered with.",
            Self::ReplayAttack => "This code has already been used.",
        }
    }
}

impl std::fmt::Display for TokenErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token generation failure.
#[derive(Error, Debug)]
pub enum TokenError {
    /// A caller-supplied claim field is invalid.
    #[error("invalid claim: {0}")]
    InvalidClaim(String),

    /// The configuration is unusable.
    #[error("invalid token configuration: {0}")]
    Config(String),

    /// The payload could not be canonicalized for signing.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// Key derivation or sealing failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A deep link could not be built or parsed.
    #[error("invalid deep link: {0}")]
    DeepLink(String),
}
