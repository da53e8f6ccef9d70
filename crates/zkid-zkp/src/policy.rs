//! # Proof Backend Policy
//!
//! Decides whether the transparent mock backend may be used. Mock proofs are
//! recomputable by anyone from the public signals; a verifier that accepts
//! one in production accepts a claim nobody proved.
//!
//! ## Configuration
//!
//! 1. `ZKID_PROOF_POLICY` (`production`/`prod` or `development`/`dev`)
//! 2. Release builds (`not(debug_assertions)`) default to `Production`
//! 3. Debug builds default to `Development`
//!
//! Every mock acceptance or generation is logged at `warn` so it is auditable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable consulted by [`ProofPolicy::from_environment`].
pub const POLICY_ENV_VAR: &str = "ZKID_PROOF_POLICY";

/// Errors from proof policy enforcement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// Mock backend rejected in production mode.
    #[error("mock proof rejected: production mode requires a real proof backend ({backend})")]
    MockProofRejected {
        /// The proof backend that was rejected.
        backend: String,
    },
}

/// The backend that produced a proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofBackend {
    /// Deterministic SHA-256 digest. No cryptographic security.
    Mock,
    /// Groth16 over BN254.
    Groth16,
}

impl ProofBackend {
    pub fn is_real(self) -> bool {
        matches!(self, ProofBackend::Groth16)
    }

    pub fn name(self) -> &'static str {
        match self {
            ProofBackend::Mock => "mock-sha256",
            ProofBackend::Groth16 => "groth16",
        }
    }
}

/// Proof policy mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Reject mock proofs unconditionally.
    Production,
    /// Allow logged mock proofs for local development and tests.
    Development,
}

impl std::str::FromStr for PolicyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(format!("unknown proof policy: {other}")),
        }
    }
}

/// Runtime proof policy.
///
/// ```rust
/// use zkid_zkp::policy::{ProofBackend, ProofPolicy};
///
/// let policy = ProofPolicy::production();
/// assert!(policy.validate(ProofBackend::Groth16).is_ok());
/// assert!(policy.validate(ProofBackend::Mock).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPolicy {
    mode: PolicyMode,
}

impl ProofPolicy {
    pub fn new(mode: PolicyMode) -> Self {
        Self { mode }
    }

    pub fn production() -> Self {
        Self::new(PolicyMode::Production)
    }

    pub fn development() -> Self {
        Self::new(PolicyMode::Development)
    }

    /// Policy from `ZKID_PROOF_POLICY`, else the build-profile default.
    pub fn from_environment() -> Self {
        Self::from_env_value(std::env::var(POLICY_ENV_VAR).ok().as_deref())
    }

    /// Resolve a policy from an optional override value.
    ///
    /// Unrecognized values fall through to the build-profile default.
    pub fn from_env_value(value: Option<&str>) -> Self {
        if let Some(mode) = value.and_then(|v| v.parse::<PolicyMode>().ok()) {
            return Self::new(mode);
        }
        if cfg!(not(debug_assertions)) {
            Self::production()
        } else {
            Self::development()
        }
    }

    /// Whether `backend` is acceptable under this policy.
    pub fn validate(&self, backend: ProofBackend) -> Result<(), PolicyError> {
        match (self.mode, backend) {
            (PolicyMode::Production, ProofBackend::Mock) => Err(PolicyError::MockProofRejected {
                backend: backend.name().to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub fn allows_mock(&self) -> bool {
        self.mode == PolicyMode::Development
    }

    pub fn mode(&self) -> PolicyMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_rejects_mock() {
        let policy = ProofPolicy::production();
        assert!(policy.validate(ProofBackend::Mock).is_err());
        assert!(policy.validate(ProofBackend::Groth16).is_ok());
        assert!(!policy.allows_mock());
    }

    #[test]
    fn development_accepts_both() {
        let policy = ProofPolicy::development();
        assert!(policy.validate(ProofBackend::Mock).is_ok());
        assert!(policy.validate(ProofBackend::Groth16).is_ok());
        assert!(policy.allows_mock());
    }

    #[test]
    fn env_value_overrides_profile() {
        assert_eq!(ProofPolicy::from_env_value(Some("prod")).mode(), PolicyMode::Production);
        assert_eq!(ProofPolicy::from_env_value(Some("Development")).mode(), PolicyMode::Development);
    }

    #[test]
    fn unrecognized_value_uses_profile_default() {
        let expected = if cfg!(debug_assertions) {
            PolicyMode::Development
        } else {
            PolicyMode::Production
        };
        assert_eq!(ProofPolicy::from_env_value(Some("maybe")).mode(), expected);
        assert_eq!(ProofPolicy::from_env_value(None).mode(), expected);
    }

    #[test]
    fn mock_backend_is_not_real() {
        assert!(!ProofBackend::Mock.is_real());
        assert!(ProofBackend::Groth16.is_real());
        assert_eq!(ProofBackend::Mock.name(), "mock-sha256");
    }

    #[test]
    fn error_message_includes_backend() {
        let err = ProofPolicy::production().validate(ProofBackend::Mock).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("mock-sha256"));
        assert!(msg.contains("production mode"));
    }
}
