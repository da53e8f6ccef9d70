//! Token protocol configuration. Passed explicitly to the issuer and the
//! verifier; there is no process-global key.

use std::time::Duration;

use url::Url;
use zkid_crypto::{MasterSecret, PayloadMac, TokenCipher, TokenKeys};

use crate::error::TokenError;

/// Default upper bound on a token's lifetime.
pub const DEFAULT_MAX_TTL: Duration = Duration::from_secs(15 * 60);
/// Default tolerance for issuer/verifier clock disagreement.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(30);
/// Tokens longer than this are rejected before decoding.
pub const MAX_TOKEN_LEN: usize = 16 * 1024;

pub struct TokenConfig {
    pub master_secret: MasterSecret,
    /// Longest accepted `expiresAt - issuedAt`.
    pub max_ttl: Duration,
    pub clock_skew: Duration,
    /// Prefix of emitted deep links, e.g. `https://verify.example.org`.
    pub base_url: Url,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("master_secret", &self.master_secret)
            .field("max_ttl", &self.max_ttl)
            .field("clock_skew", &self.clock_skew)
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl TokenConfig {
    pub fn new(master_secret: MasterSecret, base_url: Url) -> Self {
        Self {
            master_secret,
            max_ttl: DEFAULT_MAX_TTL,
            clock_skew: DEFAULT_CLOCK_SKEW,
            base_url,
        }
    }

    pub fn with_max_ttl(mut self, max_ttl: Duration) -> Self {
        self.max_ttl = max_ttl;
        self
    }

    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), TokenError> {
        if self.max_ttl.is_zero() {
            return Err(TokenError::Config("max_ttl must be positive".into()));
        }
        if self.base_url.cannot_be_a_base() {
            return Err(TokenError::Config(format!("{} cannot be a base URL", self.base_url)));
        }
        Ok(())
    }

    /// Derive the MAC and cipher instances shared by issuer and verifier.
    pub(crate) fn primitives(&self) -> Result<(PayloadMac, TokenCipher), TokenError> {
        self.validate()?;
        let keys = TokenKeys::derive(&self.master_secret)?;
        Ok((PayloadMac::new(&keys)?, TokenCipher::new(&keys)))
    }
}
