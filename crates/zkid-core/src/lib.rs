//! # zkid-core: Foundational Types
//!
//! Leaf crate of the zkid workspace. Everything that must agree byte-for-byte
//! between an issuer and a relying party lives here:
//!
//! 1. **`CanonicalBytes`.** The only input accepted by signing and digest
//!    functions. Produced by JCS (RFC 8785) serialization with float rejection,
//!    so the same payload always signs to the same MAC.
//!
//! 2. **`Timestamp`.** UTC, second precision, `Z` suffix. Token expiry and
//!    issuance times are carried in this form.
//!
//! 3. **`ClaimType` / `CircuitId`.** The static table mapping a relying party's
//!    claim ("age_over_18") to the circuit family that proves it. Adding a claim
//!    is a variant addition; every `match` in the workspace must handle it.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `zkid-*` crates.
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests.

pub mod canonical;
pub mod claim;
pub mod digest;
pub mod error;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use claim::{CircuitId, ClaimType, CLAIM_TYPES};
pub use digest::{sha256_digest, sha256_hex, ContentDigest};
pub use error::{CanonicalizationError, ZkidError};
pub use temporal::Timestamp;
