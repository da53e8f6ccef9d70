//! # Error Types
//!
//! Errors shared by every zkid crate. Component-specific failures (ceremony,
//! proving, token verification) live in their own crates and wrap these where
//! they need canonicalization or timestamp parsing.

use thiserror::Error;

/// Top-level error for foundational operations.
#[derive(Error, Debug)]
pub enum ZkidError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// A value failed structural validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// An identifier did not name a known claim type or circuit.
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
