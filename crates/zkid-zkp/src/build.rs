//! # Circuit Build Pipeline
//!
//! `compile → ensure universal setup → derive key (δ = 1) → δ contribution →
//! export`. Each step is skipped when its output already exists, so a build is
//! idempotent and an interrupted build resumes.
//!
//! ## Integrity Invariant
//!
//! A `(circuit_id, version)` pair names one constraint system forever. If the
//! synthesized matrices no longer match the stored manifest, the build fails
//! with [`CompileError::ManifestDrift`] instead of silently re-keying.

use std::path::PathBuf;

use ark_bn254::{Bn254, Fr};
use ark_groth16::{ProvingKey, VerifyingKey};
use ark_relations::r1cs::{
    ConstraintMatrices, ConstraintSynthesizer, ConstraintSystem, OptimizationGoal, SynthesisMode,
};
use ark_serialize::{CanonicalSerialize, Compress};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use zkid_core::{sha256_digest, CanonicalBytes, CircuitId, ContentDigest, Timestamp};

use crate::artifacts::{ArtifactStore, CircuitFile};
use crate::ceremony::{
    self, contribute_delta, derive_proving_key, qap_domain_size, verify_delta_contribution, CeremonyTranscript,
};
use crate::circuits::{descriptor, AnyCircuit, WitnessSchema};
use crate::error::{ArtifactError, BuildError, CompileError};

/// Identity of a compiled constraint system, written as `circuit.r1cs.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitManifest {
    pub circuit_id: CircuitId,
    pub version: u32,
    pub constraint_count: usize,
    /// Excludes the constant-one variable.
    pub num_public_inputs: usize,
    pub num_witness_variables: usize,
    pub domain_size: usize,
    /// Ordered public signal names.
    pub input_schema: Vec<String>,
    /// SHA-256 over the serialized A, B, C matrices.
    pub matrix_digest: ContentDigest,
}

/// Written as `build.json` once both keys are in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub circuit_id: CircuitId,
    pub version: u32,
    pub tier: usize,
    pub ceremony_contributions: usize,
    pub contribution_name: String,
    pub built_at: Timestamp,
    pub manifest_digest: ContentDigest,
    pub proving_key_digest: ContentDigest,
    pub verification_key_digest: ContentDigest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Ceremony tier; the circuit's default tier when `None`.
    pub tier: Option<usize>,
    /// Recorded on the δ contribution and, for new ceremonies, the phase-1
    /// contribution.
    pub contribution_name: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            tier: None,
            contribution_name: "zkid-build".to_string(),
        }
    }
}

/// References to the exported keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOutput {
    pub proving_key_ref: PathBuf,
    pub verification_key_ref: PathBuf,
    pub record: BuildRecord,
}

// ---------------------------------------------------------------------------
// Compile
// ---------------------------------------------------------------------------

/// Synthesize the circuit shape into R1CS matrices.
pub fn compile(circuit_id: CircuitId) -> Result<(CircuitManifest, ConstraintMatrices<Fr>), CompileError> {
    let desc = descriptor(circuit_id);
    let synthesis = |reason: String| CompileError::Synthesis {
        circuit: circuit_id,
        reason,
    };

    let cs = ConstraintSystem::<Fr>::new_ref();
    cs.set_optimization_goal(OptimizationGoal::Constraints);
    cs.set_mode(SynthesisMode::Setup);
    AnyCircuit::blank(circuit_id)
        .generate_constraints(cs.clone())
        .map_err(|e| synthesis(e.to_string()))?;
    cs.finalize();
    let matrices = cs
        .to_matrices()
        .ok_or_else(|| synthesis("constraint system has no matrices".into()))?;

    let num_public_inputs = matrices.num_instance_variables.saturating_sub(1);
    if num_public_inputs != desc.public_signals.len() {
        return Err(CompileError::PublicArityMismatch {
            circuit: circuit_id,
            expected: desc.public_signals.len(),
            got: num_public_inputs,
        });
    }
    let domain_size =
        qap_domain_size(&matrices).ok_or_else(|| synthesis("no evaluation domain for constraint count".into()))?;

    let mut bytes = Vec::new();
    for matrix in [&matrices.a, &matrices.b, &matrices.c] {
        matrix
            .serialize_with_mode(&mut bytes, Compress::Yes)
            .map_err(|e| synthesis(e.to_string()))?;
    }

    let manifest = CircuitManifest {
        circuit_id,
        version: desc.version,
        constraint_count: matrices.num_constraints,
        num_public_inputs,
        num_witness_variables: matrices.num_witness_variables,
        domain_size,
        input_schema: desc.public_signals.iter().map(|s| s.to_string()).collect(),
        matrix_digest: ContentDigest::of_bytes(&bytes),
    };
    Ok((manifest, matrices))
}

fn manifest_digest(manifest: &CircuitManifest) -> Result<ContentDigest, BuildError> {
    let canonical = CanonicalBytes::new(manifest).map_err(|e| CompileError::Synthesis {
        circuit: manifest.circuit_id,
        reason: e.to_string(),
    })?;
    Ok(sha256_digest(&canonical))
}

/// Write the manifest and witness schema, or check them against disk.
fn persist_manifest(store: &ArtifactStore, manifest: &CircuitManifest) -> Result<(), BuildError> {
    let id = manifest.circuit_id;
    let path = store.circuit_file(id, manifest.version, CircuitFile::Constraints);
    if store.exists(&path) {
        let stored: CircuitManifest = store.read_json(&path)?;
        if &stored != manifest {
            return Err(CompileError::ManifestDrift {
                circuit: id,
                version: manifest.version,
            }
            .into());
        }
        return Ok(());
    }
    store.write_json(&path, manifest)?;
    let schema = WitnessSchema::from(&descriptor(id));
    store.write_json(&store.circuit_file(id, manifest.version, CircuitFile::WitnessSchema), &schema)?;
    tracing::info!(
        circuit = %id,
        version = manifest.version,
        constraints = manifest.constraint_count,
        domain = manifest.domain_size,
        "compiled circuit"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Build (or reuse) the proving and verification keys for `circuit_id`.
pub fn build(store: &ArtifactStore, circuit_id: CircuitId, config: &BuildConfig) -> Result<BuildOutput, BuildError> {
    let desc = descriptor(circuit_id);
    let tier = config.tier.unwrap_or(desc.default_tier);
    let (manifest, matrices) = compile(circuit_id)?;
    if manifest.domain_size > tier {
        return Err(CompileError::DomainExceedsTier {
            circuit: circuit_id,
            domain: manifest.domain_size,
            tier,
        }
        .into());
    }
    persist_manifest(store, &manifest)?;
    let version = manifest.version;

    let pk_path = store.circuit_file(circuit_id, version, CircuitFile::ProvingKey);
    let vk_path = store.circuit_file(circuit_id, version, CircuitFile::VerificationKey);
    let record_path = store.circuit_file(circuit_id, version, CircuitFile::BuildRecord);
    if store.exists(&record_path) && store.exists(&pk_path) && store.exists(&vk_path) {
        let record: BuildRecord = store.read_json(&record_path)?;
        tracing::debug!(circuit = %circuit_id, version, "keys already built");
        return Ok(BuildOutput {
            proving_key_ref: pk_path,
            verification_key_ref: vk_path,
            record,
        });
    }

    let setup = ceremony::ensure_universal_setup(store, tier, &config.contribution_name, &mut OsRng)?;
    let transcript: CeremonyTranscript = store.read_json(&store.transcript_path(tier))?;

    let initial = derive_proving_key(&setup, &matrices)?;
    let zkey0 = store.zkey_path(circuit_id, version, 0);
    store.write_ark(&zkey0, &initial)?;

    let keyed = contribute_delta(&initial, &mut OsRng);
    verify_delta_contribution(&initial, &keyed, &mut OsRng)?;
    let zkey1 = store.zkey_path(circuit_id, version, 1);
    store.write_ark(&zkey1, &keyed)?;
    tracing::info!(circuit = %circuit_id, contributor = %config.contribution_name, "applied delta contribution");

    let proving_key_digest = store.write_ark(&pk_path, &keyed)?;
    let verification_key_digest = store.write_ark(&vk_path, &keyed.vk)?;
    let record = BuildRecord {
        circuit_id,
        version,
        tier,
        ceremony_contributions: transcript.contributions.len(),
        contribution_name: config.contribution_name.clone(),
        built_at: Timestamp::now(),
        manifest_digest: manifest_digest(&manifest)?,
        proving_key_digest,
        verification_key_digest,
    };
    store.write_json(&record_path, &record)?;
    store.remove(&zkey0)?;
    store.remove(&zkey1)?;

    tracing::info!(
        circuit = %circuit_id,
        version,
        tier,
        vk = %verification_key_digest,
        "exported circuit keys"
    );
    Ok(BuildOutput {
        proving_key_ref: pk_path,
        verification_key_ref: vk_path,
        record,
    })
}

/// Load the build record of the current version, if built.
pub fn load_record(store: &ArtifactStore, circuit_id: CircuitId) -> Result<Option<BuildRecord>, ArtifactError> {
    let path = store.circuit_file(circuit_id, descriptor(circuit_id).version, CircuitFile::BuildRecord);
    if !store.exists(&path) {
        return Ok(None);
    }
    store.read_json(&path).map(Some)
}

/// Proving key pinned to the digest in its build record.
pub fn load_proving_key(
    store: &ArtifactStore,
    record: &BuildRecord,
) -> Result<ProvingKey<Bn254>, ArtifactError> {
    let path = store.circuit_file(record.circuit_id, record.version, CircuitFile::ProvingKey);
    store.read_ark_pinned(&path, &record.proving_key_digest)
}

/// Verification key, fully validated and checked against its build record.
pub fn load_verification_key(
    store: &ArtifactStore,
    record: &BuildRecord,
) -> Result<VerifyingKey<Bn254>, ArtifactError> {
    let path = store.circuit_file(record.circuit_id, record.version, CircuitFile::VerificationKey);
    let actual = ContentDigest::of_bytes(&store.read(&path)?);
    if actual != record.verification_key_digest {
        return Err(ArtifactError::DigestMismatch {
            path,
            expected: record.verification_key_digest.to_hex(),
            actual: actual.to_hex(),
        });
    }
    store.read_ark(&path)
}
