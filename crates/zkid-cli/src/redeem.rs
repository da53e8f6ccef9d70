//! `zkid redeem`: full relying-party check of a presentation token.

use anyhow::{Context, Result};
use clap::Args;
use zkid_ledger::FsNonceLedger;
use zkid_service::{PoolConfig, RedeemConfig, Redeemer, WorkerPool};
use zkid_token::TokenVerifier;
use zkid_zkp::{ArtifactStore, Verifier};

use crate::{print_json, token_argument, Settings, EXIT_REJECTED};

#[derive(Args, Debug)]
pub struct RedeemArgs {
    /// Base64 token or deep link.
    pub token: String,

    #[arg(long)]
    pub checksum: Option<String>,
}

pub fn run_redeem(args: &RedeemArgs, settings: &Settings) -> Result<u8> {
    let (token, checksum) = token_argument(&args.token, args.checksum.as_deref())?;
    let token_config = settings.token_config()?;
    let (pool_config, redeem_config) = match &settings.service {
        Some(s) => (s.pool.clone(), s.redeem.clone()),
        None => (PoolConfig::default(), RedeemConfig::default()),
    };
    let store = ArtifactStore::new(&settings.artifacts_dir);
    let redeemer = Redeemer::new(
        TokenVerifier::new(&token_config, FsNonceLedger::open(&settings.ledger_dir)?)?,
        Verifier::load(&store, settings.policy).context("loading verification keys")?,
        WorkerPool::new(&pool_config)?,
        &redeem_config,
    );
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;
    let outcome = runtime.block_on(redeemer.redeem(token, checksum));
    print_json(&outcome)?;
    Ok(if outcome.is_accepted() { 0 } else { EXIT_REJECTED })
}
