//! `zkid prove` and `zkid verify-proof`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use zkid_zkp::{ArtifactStore, GeneratedProof, ProofRequest, Prover, Verifier};

use crate::{print_json, read_json, write_json, Settings, EXIT_REJECTED};

#[derive(Args, Debug)]
pub struct ProveArgs {
    /// JSON `ProofRequest`, tagged by `circuit`.
    #[arg(long)]
    pub input: PathBuf,

    /// Write the proof here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VerifyProofArgs {
    /// Claim to check, e.g. `age_over_18`.
    #[arg(long)]
    pub claim: String,

    /// JSON `GeneratedProof` written by `zkid prove`.
    #[arg(long)]
    pub proof: PathBuf,
}

pub fn run_prove(args: &ProveArgs, settings: &Settings) -> Result<u8> {
    let request: ProofRequest = read_json(&args.input)?;
    let store = ArtifactStore::new(&settings.artifacts_dir);
    let prover = Prover::load(&store, settings.policy).context("loading proving keys")?;
    let proof = prover.generate_with_fallback(request)?;
    if proof.is_mock() {
        tracing::warn!("emitted a MOCK proof; it will be rejected under the production policy");
    }
    match &args.out {
        Some(out) => {
            write_json(out, &proof)?;
            tracing::info!(path = %out.display(), "proof written");
        }
        None => print_json(&proof)?,
    }
    Ok(0)
}

pub fn run_verify_proof(args: &VerifyProofArgs, settings: &Settings) -> Result<u8> {
    let proof: GeneratedProof = read_json(&args.proof)?;
    let store = ArtifactStore::new(&settings.artifacts_dir);
    let verifier = Verifier::load(&store, settings.policy).context("loading verification keys")?;
    let outcome = verifier.verify_proof(&args.claim, &proof.proof, &proof.public_signals);
    print_json(&outcome.report())?;
    Ok(if outcome.is_valid() { 0 } else { EXIT_REJECTED })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use zkid_zkp::ProofPolicy;

    use super::*;

    fn dev_settings(artifacts: &Path) -> Settings {
        Settings {
            artifacts_dir: artifacts.to_path_buf(),
            ledger_dir: artifacts.join("ledger"),
            policy: ProofPolicy::development(),
            service: None,
        }
    }

    #[test]
    fn mock_prove_then_verify_in_development() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dev_settings(dir.path());
        let input = dir.path().join("request.json");
        let out = dir.path().join("proof.json");
        write_json(&input, &ProofRequest::age(18, 1_780_000_000, "2001-04-02")).unwrap();

        let code = run_prove(&ProveArgs { input, out: Some(out.clone()) }, &settings).unwrap();
        assert_eq!(code, 0);
        let proof: GeneratedProof = read_json(&out).unwrap();
        assert!(proof.is_mock());

        let verify = |claim: &str| {
            run_verify_proof(
                &VerifyProofArgs {
                    claim: claim.into(),
                    proof: out.clone(),
                },
                &settings,
            )
            .unwrap()
        };
        assert_eq!(verify("age_over_18"), 0);
        assert_eq!(verify("age_over_21"), EXIT_REJECTED);
    }

    #[test]
    fn production_without_keys_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = dev_settings(dir.path());
        settings.policy = ProofPolicy::production();
        let input = dir.path().join("request.json");
        write_json(&input, &ProofRequest::age(18, 1_780_000_000, "2001-04-02")).unwrap();
        assert!(run_prove(&ProveArgs { input, out: None }, &settings).is_err());
    }
}
