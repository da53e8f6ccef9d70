//! `zkid circuit`: compile circuits and build their keys.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use zkid_core::CircuitId;
use zkid_zkp::{build, compile, ArtifactStore, BuildConfig};

use crate::{print_json, Settings};

#[derive(Args, Debug)]
pub struct CircuitArgs {
    #[command(subcommand)]
    pub command: CircuitCommand,
}

#[derive(Subcommand, Debug)]
pub enum CircuitCommand {
    /// Compile, run or reuse the ceremony, and export proving and verification keys.
    Build {
        /// Circuit identifier, e.g. `age_verification`.
        circuit: String,

        /// Ceremony tier (power of two). Defaults to the circuit's own.
        #[arg(long)]
        tier: Option<usize>,

        /// Name recorded on this build's contributions.
        #[arg(long, default_value = "zkid-build")]
        contribution_name: String,
    },

    /// Print the compiled manifest without touching artifacts.
    Inspect {
        circuit: String,
    },
}

pub fn run_circuit(args: &CircuitArgs, settings: &Settings) -> Result<u8> {
    match &args.command {
        CircuitCommand::Build {
            circuit,
            tier,
            contribution_name,
        } => {
            let id = parse_circuit(circuit)?;
            let store = ArtifactStore::new(&settings.artifacts_dir);
            let config = BuildConfig {
                tier: *tier,
                contribution_name: contribution_name.clone(),
            };
            tracing::info!(circuit = %id, root = %settings.artifacts_dir.display(), "building circuit");
            let output = build(&store, id, &config).with_context(|| format!("building {id}"))?;
            print_json(&output)?;
            Ok(0)
        }
        CircuitCommand::Inspect { circuit } => {
            let (manifest, _) = compile(parse_circuit(circuit)?)?;
            print_json(&manifest)?;
            Ok(0)
        }
    }
}

fn parse_circuit(s: &str) -> Result<CircuitId> {
    s.parse::<CircuitId>()
        .with_context(|| format!("known circuits: {}", CircuitId::ALL.map(|c| c.as_str()).join(", ")))
}
