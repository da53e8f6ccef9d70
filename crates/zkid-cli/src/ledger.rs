//! `zkid ledger gc`.

use anyhow::Result;
use clap::{Args, Subcommand};
use zkid_core::Timestamp;
use zkid_ledger::{FsNonceLedger, NonceLedger};

use crate::{print_json, Settings};

#[derive(Args, Debug)]
pub struct LedgerArgs {
    #[command(subcommand)]
    pub command: LedgerCommand,
}

#[derive(Subcommand, Debug)]
pub enum LedgerCommand {
    /// Delete expired nonce records. Nullifiers never expire.
    Gc,
}

pub fn run_ledger(args: &LedgerArgs, settings: &Settings) -> Result<u8> {
    match args.command {
        LedgerCommand::Gc => {
            let ledger = FsNonceLedger::open(&settings.ledger_dir)?;
            let removed = ledger.purge_expired(Timestamp::now())?;
            tracing::info!(removed, dir = %settings.ledger_dir.display(), "ledger garbage collected");
            print_json(&serde_json::json!({ "removed": removed }))?;
            Ok(0)
        }
    }
}
