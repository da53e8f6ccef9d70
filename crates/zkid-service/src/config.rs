//! # Service Configuration
//!
//! Loaded from YAML, then overridden from the environment:
//!
//! | Variable            | Overrides          |
//! |---------------------|--------------------|
//! | `ZKID_TOKEN_SECRET` | `token.secret_hex` |
//! | `ZKID_PROOF_POLICY` | `proof_policy`     |
//!
//! ```yaml
//! artifacts_dir: /var/lib/zkid/artifacts
//! ledger_dir: /var/lib/zkid/ledger
//! proof_policy: production
//! token:
//!   base_url: https://verify.example.org
//!   max_ttl_secs: 900
//!   clock_skew_secs: 30
//! pool:
//!   queue_timeout: 30000
//! redeem:
//!   max_proof_age_secs: 300
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;
use zkid_crypto::MasterSecret;
use zkid_token::{TokenConfig, DEFAULT_CLOCK_SKEW, DEFAULT_MAX_TTL};
use zkid_zkp::policy::{PolicyMode, POLICY_ENV_VAR};
use zkid_zkp::ProofPolicy;

use crate::error::ConfigError;
use crate::pool::PoolConfig;
use crate::redeem::RedeemConfig;

pub const TOKEN_SECRET_ENV_VAR: &str = "ZKID_TOKEN_SECRET";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenSection {
    pub base_url: Url,
    #[serde(default = "default_max_ttl_secs")]
    pub max_ttl_secs: u64,
    #[serde(default = "default_clock_skew_secs")]
    pub clock_skew_secs: u64,
    /// Hex master secret. Prefer `ZKID_TOKEN_SECRET`.
    #[serde(default, skip_serializing)]
    pub secret_hex: Option<String>,
}

fn default_max_ttl_secs() -> u64 {
    DEFAULT_MAX_TTL.as_secs()
}

fn default_clock_skew_secs() -> u64 {
    DEFAULT_CLOCK_SKEW.as_secs()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub artifacts_dir: PathBuf,
    pub ledger_dir: PathBuf,
    /// `None` falls back to the build-profile default.
    #[serde(default)]
    pub proof_policy: Option<PolicyMode>,
    pub token: TokenSection,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub redeem: RedeemConfig,
}

impl ServiceConfig {
    /// Read `path` and apply process environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&text)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        tracing::info!(path = %path.display(), "loaded service configuration");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply overrides from `lookup`, normally the process environment.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(secret) = lookup(TOKEN_SECRET_ENV_VAR) {
            self.token.secret_hex = Some(secret);
        }
        if let Some(policy) = lookup(POLICY_ENV_VAR) {
            let mode = policy.parse::<PolicyMode>().map_err(|reason| ConfigError::Invalid {
                field: POLICY_ENV_VAR,
                reason,
            })?;
            self.proof_policy = Some(mode);
        }
        Ok(())
    }

    pub fn policy(&self) -> ProofPolicy {
        match self.proof_policy {
            Some(mode) => ProofPolicy::new(mode),
            None => ProofPolicy::from_env_value(None),
        }
    }

    pub fn token_config(&self) -> Result<TokenConfig, ConfigError> {
        let hex = self.token.secret_hex.as_deref().ok_or(ConfigError::MissingSecret)?;
        let secret = MasterSecret::from_hex(hex).map_err(|e| ConfigError::Invalid {
            field: "token.secret_hex",
            reason: e.to_string(),
        })?;
        if self.token.max_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "token.max_ttl_secs",
                reason: "must be positive".into(),
            });
        }
        Ok(TokenConfig::new(secret, self.token.base_url.clone())
            .with_max_ttl(Duration::from_secs(self.token.max_ttl_secs))
            .with_clock_skew(Duration::from_secs(self.token.clock_skew_secs)))
    }
}
