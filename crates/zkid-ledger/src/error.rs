use std::path::PathBuf;

use thiserror::Error;

/// Ledger failure. Callers treat every variant as "not provably fresh".
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The key is empty or too long.
    #[error("invalid ledger key: {0}")]
    InvalidKey(String),

    /// `now + ttl` is not representable.
    #[error("nonce TTL overflows the timestamp range")]
    TtlOverflow,

    /// Filesystem I/O failed.
    #[error("ledger I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record file could not be decoded.
    #[error("corrupt ledger record {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },
}
