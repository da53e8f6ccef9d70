//! # zkid CLI entry point
//!
//! Parses arguments, initializes logging, and dispatches to the subcommand
//! handlers in the library crate.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use zkid_cli::circuit::{run_circuit, CircuitArgs};
use zkid_cli::ledger::{run_ledger, LedgerArgs};
use zkid_cli::proof::{run_prove, run_verify_proof, ProveArgs, VerifyProofArgs};
use zkid_cli::redeem::{run_redeem, RedeemArgs};
use zkid_cli::token::{run_token, TokenArgs};
use zkid_cli::Settings;
use zkid_zkp::PolicyMode;

/// Zero-knowledge claim proofs and secure QR tokens.
#[derive(Parser, Debug)]
#[command(name = "zkid", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Service configuration file (YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Artifact root. Overrides the config file.
    #[arg(long, global = true)]
    artifacts_dir: Option<PathBuf>,

    /// Proof policy (`production` or `development`). Overrides the config file
    /// and `ZKID_PROOF_POLICY`.
    #[arg(long, global = true)]
    policy: Option<PolicyMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Circuit compilation and key builds.
    Circuit(CircuitArgs),

    /// Generate a proof from a JSON proof request.
    Prove(ProveArgs),

    /// Verify a proof against a claim.
    VerifyProof(VerifyProofArgs),

    /// Issue and verify secure tokens.
    Token(TokenArgs),

    /// Verify a presentation token, its proof and its nullifier.
    Redeem(RedeemArgs),

    /// Nonce ledger maintenance.
    Ledger(LedgerArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let settings = match Settings::resolve(cli.config.as_deref(), cli.artifacts_dir.clone(), cli.policy) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(1);
        }
    };
    tracing::debug!(policy = ?settings.policy.mode(), artifacts = %settings.artifacts_dir.display(), "zkid starting");

    let result = match &cli.command {
        Commands::Circuit(args) => run_circuit(args, &settings),
        Commands::Prove(args) => run_prove(args, &settings),
        Commands::VerifyProof(args) => run_verify_proof(args, &settings),
        Commands::Token(args) => run_token(args, &settings),
        Commands::Redeem(args) => run_redeem(args, &settings),
        Commands::Ledger(args) => run_ledger(args, &settings),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
