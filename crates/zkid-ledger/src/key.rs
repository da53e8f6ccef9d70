//! Namespaced ledger keys: `nonce:<hex>` for token nonces and
//! `nullifier:<decimal>` for proof nullifiers, so the two can share one
//! backend without colliding.

use std::fmt;

use crate::error::LedgerError;

const MAX_VALUE_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Nonce,
    Nullifier,
}

impl Namespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Nonce => "nonce:",
            Self::Nullifier => "nullifier:",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    namespace: Namespace,
    full: String,
}

impl LedgerKey {
    pub fn new(namespace: Namespace, value: &str) -> Result<Self, LedgerError> {
        if value.is_empty() || value.len() > MAX_VALUE_LEN {
            return Err(LedgerError::InvalidKey(format!(
                "{}value must be 1..={MAX_VALUE_LEN} bytes",
                namespace.prefix()
            )));
        }
        Ok(Self {
            namespace,
            full: format!("{}{value}", namespace.prefix()),
        })
    }

    pub fn nonce(value: &str) -> Result<Self, LedgerError> {
        Self::new(Namespace::Nonce, value)
    }

    pub fn nullifier(value: &str) -> Result<Self, LedgerError> {
        Self::new(Namespace::Nullifier, value)
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}
