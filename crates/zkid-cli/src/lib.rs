//! # zkid-cli: The `zkid` Tool
//!
//! ```bash
//! zkid circuit build age_verification
//! zkid prove --input request.json --out proof.json
//! zkid verify-proof --claim age_over_18 --proof proof.json
//! zkid token issue --proof proof.json --claim age_over_18 --issuer-id wallet --issuer-name Wallet
//! zkid token verify <token-or-deep-link>
//! zkid redeem <token-or-deep-link>
//! zkid ledger gc
//! ```
//!
//! Every command prints JSON on stdout and logs on stderr. Exit code 0 means
//! success, 2 means the input was checked and rejected, 1 means the command
//! itself failed.

pub mod circuit;
pub mod ledger;
pub mod proof;
pub mod redeem;
pub mod token;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use url::Url;
use zkid_crypto::MasterSecret;
use zkid_service::{ServiceConfig, TOKEN_SECRET_ENV_VAR};
use zkid_token::TokenConfig;
use zkid_zkp::{PolicyMode, ProofPolicy};

/// Exit code for a well-formed input that failed verification.
pub const EXIT_REJECTED: u8 = 2;

const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";
const DEFAULT_LEDGER_DIR: &str = "ledger";
const DEFAULT_BASE_URL: &str = "https://localhost/zkid";

/// Resolved global options.
#[derive(Debug, Clone)]
pub struct Settings {
    pub artifacts_dir: PathBuf,
    pub ledger_dir: PathBuf,
    pub policy: ProofPolicy,
    pub service: Option<ServiceConfig>,
}

impl Settings {
    /// Command-line flags win over the config file, which wins over defaults.
    pub fn resolve(
        config: Option<&Path>,
        artifacts_dir: Option<PathBuf>,
        policy: Option<PolicyMode>,
    ) -> Result<Self> {
        let service = config
            .map(|path| ServiceConfig::load(path).with_context(|| format!("loading {}", path.display())))
            .transpose()?;
        let policy = match (policy, &service) {
            (Some(mode), _) => ProofPolicy::new(mode),
            (None, Some(service)) => service.policy(),
            (None, None) => ProofPolicy::from_environment(),
        };
        Ok(Self {
            artifacts_dir: artifacts_dir
                .or_else(|| service.as_ref().map(|s| s.artifacts_dir.clone()))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS_DIR)),
            ledger_dir: service
                .as_ref()
                .map(|s| s.ledger_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_DIR)),
            policy,
            service,
        })
    }

    /// Token configuration from the config file, else from
    /// `ZKID_TOKEN_SECRET` with default limits.
    pub fn token_config(&self) -> Result<TokenConfig> {
        if let Some(service) = &self.service {
            return Ok(service.token_config()?);
        }
        let hex = std::env::var(TOKEN_SECRET_ENV_VAR)
            .with_context(|| format!("no --config given and {TOKEN_SECRET_ENV_VAR} is not set"))?;
        let secret = MasterSecret::from_hex(&hex).context(TOKEN_SECRET_ENV_VAR)?;
        Ok(TokenConfig::new(secret, Url::parse(DEFAULT_BASE_URL)?))
    }
}

pub fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

pub fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

/// Split a command-line token argument into `(token, checksum)`. Deep links
/// carry their own checksum.
pub fn token_argument(arg: &str, checksum: Option<&str>) -> Result<(String, Option<String>)> {
    if arg.starts_with("https://") || arg.starts_with("http://") {
        let link = zkid_token::parse_deep_link(arg)?;
        return Ok((link.token, checksum.map(str::to_string).or(link.checksum)));
    }
    Ok((arg.trim().to_string(), checksum.map(str::to_string)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_config() {
        let settings = Settings::resolve(None, None, Some(PolicyMode::Development)).unwrap();
        assert_eq!(settings.artifacts_dir, PathBuf::from("artifacts"));
        assert_eq!(settings.ledger_dir, PathBuf::from("ledger"));
        assert!(settings.policy.allows_mock());
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zkid.yaml");
        std::fs::write(
            &path,
            "artifacts_dir: /srv/a\nledger_dir: /srv/l\nproof_policy: development\ntoken:\n  base_url: https://v.example\n  secret_hex: \"0101010101010101010101010101010101010101010101010101010101010101\"\n",
        )
        .unwrap();
        let settings = Settings::resolve(Some(&path), Some(PathBuf::from("/tmp/a")), None).unwrap();
        assert_eq!(settings.artifacts_dir, PathBuf::from("/tmp/a"));
        assert_eq!(settings.ledger_dir, PathBuf::from("/srv/l"));
        assert_eq!(settings.token_config().unwrap().base_url.as_str(), "https://v.example/");
    }

    #[test]
    fn token_argument_accepts_links() {
        let (token, checksum) =
            token_argument("https://v.example/verify/ab%2Bcd?c=0011223344556677", None).unwrap();
        assert_eq!(token, "ab+cd");
        assert_eq!(checksum.as_deref(), Some("0011223344556677"));

        let (token, checksum) = token_argument(" abcd \n", Some("ff")).unwrap();
        assert_eq!(token, "abcd");
        assert_eq!(checksum.as_deref(), Some("ff"));
    }
}
