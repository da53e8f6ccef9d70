//! `zkid token issue` and `zkid token verify`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use zkid_core::ClaimType;
use zkid_ledger::FsNonceLedger;
use zkid_token::{
    ClaimPayload, IssuedToken, Issuer, ProofPresentation, TokenConfig, TokenIssuer, TokenRequest, TokenVerifier,
    VerificationOutcome,
};
use zkid_zkp::GeneratedProof;

use crate::{print_json, read_json, token_argument, Settings, EXIT_REJECTED};

#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Sign, encrypt and checksum a claim payload.
    Issue(IssueArgs),

    /// Verify a token or deep link and consume its nonce.
    Verify {
        /// Base64 token or `<base>/verify/<token>?c=<checksum>` link.
        token: String,

        #[arg(long)]
        checksum: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct IssueArgs {
    /// Proof written by `zkid prove`; wrapped in a presentation.
    #[arg(long, conflicts_with = "payload", requires = "claim")]
    pub proof: Option<PathBuf>,

    /// Claim the proof presents, e.g. `age_over_18`.
    #[arg(long)]
    pub claim: Option<String>,

    /// Raw `ClaimPayload` JSON, tagged by `kind`.
    #[arg(long, required_unless_present = "proof")]
    pub payload: Option<PathBuf>,

    #[arg(long)]
    pub issuer_id: String,

    #[arg(long)]
    pub issuer_name: String,

    #[arg(long)]
    pub issuer_domain: Option<String>,

    /// Token lifetime in seconds.
    #[arg(long, default_value_t = 300)]
    pub ttl_secs: u64,
}

pub fn run_token(args: &TokenArgs, settings: &Settings) -> Result<u8> {
    let config = settings.token_config()?;
    match &args.command {
        TokenCommand::Issue(issue_args) => {
            let issued = issue(issue_args, &config)?;
            print_json(&issued)?;
            Ok(0)
        }
        TokenCommand::Verify { token, checksum } => {
            let outcome = verify(token, checksum.as_deref(), &config, settings)?;
            print_json(&outcome)?;
            Ok(if outcome.success { 0 } else { EXIT_REJECTED })
        }
    }
}

pub fn issue(args: &IssueArgs, config: &TokenConfig) -> Result<IssuedToken> {
    let payload = match (&args.proof, &args.payload) {
        (Some(proof), _) => {
            let proof: GeneratedProof = read_json(proof)?;
            let claim: ClaimType = args.claim.as_deref().unwrap_or_default().parse()?;
            if claim.circuit() != proof.circuit_id {
                bail!("claim {claim} is not proven by circuit {}", proof.circuit_id);
            }
            ClaimPayload::ProofPresentation(ProofPresentation {
                claim_type: claim.to_string(),
                proof: proof.proof,
                public_signals: proof.public_signals,
                nullifier_hash: proof.nullifier_hash,
            })
        }
        (None, Some(payload)) => read_json(payload)?,
        (None, None) => bail!("either --proof or --payload is required"),
    };
    let issuer = Issuer {
        id: args.issuer_id.clone(),
        name: args.issuer_name.clone(),
        domain: args.issuer_domain.clone(),
    };
    let request = TokenRequest::new(issuer, payload, Duration::from_secs(args.ttl_secs));
    Ok(TokenIssuer::new(config)?.generate(request)?)
}

pub fn verify(
    token: &str,
    checksum: Option<&str>,
    config: &TokenConfig,
    settings: &Settings,
) -> Result<VerificationOutcome> {
    let (token, checksum) = token_argument(token, checksum)?;
    let ledger = FsNonceLedger::open(&settings.ledger_dir)?;
    let verifier = TokenVerifier::new(config, ledger)?;
    Ok(verifier.verify(&token, checksum.as_deref()))
}
