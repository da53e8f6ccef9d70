use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Worker pool failure. A job that fails with `QueueTimeout` or `Closed`
/// never started.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// No worker became free within the queue timeout.
    #[error("no worker available within {0:?}")]
    QueueTimeout(Duration),

    /// The pool was shut down.
    #[error("worker pool is closed")]
    Closed,

    /// The job panicked on its worker thread.
    #[error("job panicked on worker thread")]
    Panicked,

    /// The pool configuration is unusable.
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),
}

/// Service configuration failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The YAML did not match the configuration schema.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A field or environment override holds an unusable value.
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// No token secret in the file or the environment.
    #[error("token secret missing: set ZKID_TOKEN_SECRET or token.secret_hex")]
    MissingSecret,
}

/// Failure to produce a presentation token.
#[derive(Error, Debug)]
pub enum PresentError {
    /// The claim is not proven by the requested circuit.
    #[error("claim {claim} is not proven by circuit {circuit}")]
    ClaimMismatch { claim: String, circuit: String },

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Prove(#[from] zkid_zkp::ProveError),

    #[error(transparent)]
    Token(#[from] zkid_token::TokenError),
}
