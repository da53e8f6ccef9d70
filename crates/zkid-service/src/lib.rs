//! # zkid-service: Redemption Orchestration
//!
//! Async layer over the synchronous protocol crates. Proving and pairing
//! checks go through one bounded [`WorkerPool`]; the [`Redeemer`] sequences
//! token verification, proof verification and the nullifier check; the
//! [`Presenter`] does the holder's half. [`ServiceConfig`] assembles all of it
//! from YAML plus environment overrides.

pub mod config;
pub mod error;
pub mod pool;
pub mod present;
pub mod redeem;

pub use config::{ServiceConfig, TokenSection, TOKEN_SECRET_ENV_VAR};
pub use error::{ConfigError, PoolError, PresentError};
pub use pool::{PoolConfig, WorkerPool};
pub use present::Presenter;
pub use redeem::{RedeemConfig, RedeemStatus, Redeemer, RedemptionOutcome};
