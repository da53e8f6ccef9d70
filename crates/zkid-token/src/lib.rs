//! # zkid-token: Secure Token Protocol
//!
//! Carries a claim (a proof presentation or a verification request) through a
//! QR code or deep link.
//!
//! ```text
//! issue:  BuildPayload → Sign (HMAC) → Encrypt (ChaCha20-Poly1305) → Checksum → Emit
//! verify: Checksum → Decrypt → Schema → Version → Expiry → Signature → Nonce → Accepted
//! ```
//!
//! Both sides are constructed from a [`TokenConfig`] holding the master
//! secret. The verifier is generic over a [`zkid_ledger::NonceLedger`] so the
//! same state machine runs against the in-memory ledger in tests and the
//! filesystem ledger across processes.

pub mod config;
pub mod error;
pub mod issuer;
pub mod link;
pub mod payload;
pub mod verifier;

pub use config::{TokenConfig, DEFAULT_CLOCK_SKEW, DEFAULT_MAX_TTL, MAX_TOKEN_LEN};
pub use error::{TokenError, TokenErrorCode};
pub use issuer::{IssuedToken, TokenIssuer, TokenRequest};
pub use link::{build_deep_link, parse_deep_link, DeepLink};
pub use payload::{
    ClaimPayload, Issuer, ProofPresentation, SecureTokenPayload, TokenType, VerificationRequest, TOKEN_VERSION,
};
pub use verifier::{TokenVerifier, VerificationOutcome};
