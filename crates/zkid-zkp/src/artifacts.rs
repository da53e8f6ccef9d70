//! # Artifact Store
//!
//! Filesystem layout shared by the build pipeline (writer) and the prover and
//! verifier (readers):
//!
//! ```text
//! <root>/ceremony/pot<tier>_final.ptau          prepared universal setup
//! <root>/ceremony/pot<tier>_transcript.json     contribution transcript
//! <root>/circuits/<id>/v<version>/circuit.r1cs.json
//! <root>/circuits/<id>/v<version>/witness_schema.json
//! <root>/circuits/<id>/v<version>/proving_key.bin      issuer only
//! <root>/circuits/<id>/v<version>/verification_key.bin publishable
//! <root>/circuits/<id>/v<version>/build.json
//! ```
//!
//! Intermediates (`pot<tier>_0000.ptau`, `<id>_0001.zkey`, ...) live next to
//! their finals and are removed once the final artifact is in place.
//!
//! ## Integrity Invariant
//!
//! Every write goes to a uniquely named temp file in the destination
//! directory, is synced, and is then renamed over the final path. A reader
//! sees either no file or a complete one; a crash mid-build never leaves a
//! truncated key under a final name.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, Compress, Validate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use zkid_core::{CircuitId, ContentDigest};

use crate::error::ArtifactError;

/// Files in a circuit's versioned directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitFile {
    Constraints,
    WitnessSchema,
    ProvingKey,
    VerificationKey,
    BuildRecord,
}

impl CircuitFile {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Constraints => "circuit.r1cs.json",
            Self::WitnessSchema => "witness_schema.json",
            Self::ProvingKey => "proving_key.bin",
            Self::VerificationKey => "verification_key.bin",
            Self::BuildRecord => "build.json",
        }
    }
}

/// Stage of a powers-of-tau file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtauStage {
    /// Output of contribution `n`; `0` is the initial accumulator.
    Contribution(usize),
    /// Prepared for the circuit-specific phase.
    Final,
}

/// Rooted artifact layout with atomic writes.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// The directory does not need to exist until the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // -----------------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------------

    pub fn ceremony_dir(&self) -> PathBuf {
        self.root.join("ceremony")
    }

    pub fn ptau_path(&self, tier: usize, stage: PtauStage) -> PathBuf {
        let name = match stage {
            PtauStage::Contribution(n) => format!("pot{tier}_{n:04}.ptau"),
            PtauStage::Final => format!("pot{tier}_final.ptau"),
        };
        self.ceremony_dir().join(name)
    }

    pub fn transcript_path(&self, tier: usize) -> PathBuf {
        self.ceremony_dir().join(format!("pot{tier}_transcript.json"))
    }

    pub fn circuit_dir(&self, id: CircuitId, version: u32) -> PathBuf {
        self.root.join("circuits").join(id.as_str()).join(format!("v{version}"))
    }

    pub fn circuit_file(&self, id: CircuitId, version: u32, file: CircuitFile) -> PathBuf {
        self.circuit_dir(id, version).join(file.file_name())
    }

    pub fn zkey_path(&self, id: CircuitId, version: u32, n: usize) -> PathBuf {
        self.circuit_dir(id, version).join(format!("{}_{n:04}.zkey", id.as_str()))
    }

    // -----------------------------------------------------------------------
    // I/O
    // -----------------------------------------------------------------------

    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Write `bytes` to `path` via temp file and rename.
    pub fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = dir.join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4()));

        let result = (|| {
            let mut f = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp)?;
            f.write_all(bytes)?;
            f.sync_all()?;
            fs::rename(&tmp, path)
        })();
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(path, e));
        }
        Ok(())
    }

    pub fn read(&self, path: &Path) -> Result<Vec<u8>, ArtifactError> {
        fs::read(path).map_err(|e| io_err(path, e))
    }

    /// Remove `path`; a missing file is not an error.
    pub fn remove(&self, path: &Path) -> Result<(), ArtifactError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(path, e)),
        }
    }

    /// Pretty JSON, atomically.
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), ArtifactError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| corrupt(path, e))?;
        self.write_atomic(path, &bytes)
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, ArtifactError> {
        let bytes = self.read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| corrupt(path, e))
    }

    /// Compressed arkworks encoding, atomically. Returns the file digest.
    pub fn write_ark<T: CanonicalSerialize>(
        &self,
        path: &Path,
        value: &T,
    ) -> Result<ContentDigest, ArtifactError> {
        let mut bytes = Vec::with_capacity(value.serialized_size(Compress::Yes));
        value
            .serialize_with_mode(&mut bytes, Compress::Yes)
            .map_err(|e| corrupt(path, e))?;
        self.write_atomic(path, &bytes)?;
        Ok(ContentDigest::of_bytes(&bytes))
    }

    /// Read an arkworks artifact with full point validation.
    pub fn read_ark<T: CanonicalDeserialize>(&self, path: &Path) -> Result<T, ArtifactError> {
        let bytes = self.read(path)?;
        T::deserialize_with_mode(bytes.as_slice(), Compress::Yes, Validate::Yes)
            .map_err(|e| corrupt(path, e))
    }

    /// Read an arkworks artifact whose bytes must hash to `expected`.
    ///
    /// The digest check replaces per-point subgroup validation, which
    /// dominates load time for proving keys.
    pub fn read_ark_pinned<T: CanonicalDeserialize>(
        &self,
        path: &Path,
        expected: &ContentDigest,
    ) -> Result<T, ArtifactError> {
        let bytes = self.read(path)?;
        let actual = ContentDigest::of_bytes(&bytes);
        if &actual != expected {
            return Err(ArtifactError::DigestMismatch {
                path: path.to_path_buf(),
                expected: expected.to_hex(),
                actual: actual.to_hex(),
            });
        }
        T::deserialize_with_mode(bytes.as_slice(), Compress::Yes, Validate::No)
            .map_err(|e| corrupt(path, e))
    }
}

fn io_err(path: &Path, source: std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn corrupt(path: &Path, e: impl std::fmt::Display) -> ArtifactError {
    ArtifactError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}
