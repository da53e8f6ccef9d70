//! Filesystem ledger: one JSON record per key under a shared directory.
//!
//! A key is marked by creating `<sha256(key)>.json` with `create_new`
//! (`O_CREAT | O_EXCL`), which the kernel guarantees succeeds for exactly
//! one caller, across processes. Expired records are reclaimed by renaming
//! them aside first; `rename` of a given source also succeeds at most once,
//! so two reclaimers cannot both win. Within one process, reclaim and the
//! create that follows it run under a lock shared by every clone of the
//! ledger, so a stale reader cannot rename away a record that was just
//! re-marked.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use zkid_core::Timestamp;

use crate::error::LedgerError;
use crate::key::LedgerKey;
use crate::{MarkOutcome, NonceLedger, NonceRecord};

const RECORD_EXT: &str = "json";
const RECLAIM_ATTEMPTS: usize = 4;

static RECLAIM_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
enum Reclaim {
    Reclaimed,
    Live(NonceRecord),
    Gone,
}

#[derive(Debug, Clone)]
pub struct FsNonceLedger {
    dir: PathBuf,
    reclaim_lock: Arc<Mutex<()>>,
}

impl FsNonceLedger {
    /// Open (creating if needed) a ledger rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        Ok(Self {
            dir,
            reclaim_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &LedgerKey) -> PathBuf {
        let name = hex::encode(Sha256::digest(key.as_str().as_bytes()));
        self.dir.join(format!("{name}.{RECORD_EXT}"))
    }

    fn try_create(&self, path: &Path, record: &NonceRecord) -> Result<bool, LedgerError> {
        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(io_err(path, e)),
        };
        let bytes = serde_json::to_vec(record).map_err(|e| corrupt(path, e))?;
        file.write_all(&bytes)
            .and_then(|()| file.sync_all())
            .map_err(|e| io_err(path, e))?;
        Ok(true)
    }

    /// `None` while the creating writer has not finished.
    fn read_record(path: &Path) -> Result<Option<NonceRecord>, LedgerError> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(path, e)),
        };
        if bytes.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&bytes).map(Some).map_err(|e| corrupt(path, e))
    }

    /// Move an expired record out of the way. `false` if another caller did.
    fn reclaim(&self, path: &Path) -> Result<bool, LedgerError> {
        let seq = RECLAIM_SEQ.fetch_add(1, Ordering::Relaxed);
        let tomb = path.with_extension(format!("{RECORD_EXT}.{}-{seq}.expired", std::process::id()));
        match fs::rename(path, &tomb) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io_err(path, e)),
        }
        fs::remove_file(&tomb).map_err(|e| io_err(&tomb, e))?;
        Ok(true)
    }

    /// Re-read `path` and reclaim it only if the record there is still
    /// expired. The caller holds `reclaim_lock`, so a record seen expired
    /// before the lock was taken may since have been re-marked.
    fn reclaim_if_expired(&self, path: &Path, now: Timestamp) -> Result<Reclaim, LedgerError> {
        match Self::read_record(path)? {
            Some(current) if current.is_expired(now) => Ok(if self.reclaim(path)? {
                Reclaim::Reclaimed
            } else {
                Reclaim::Gone
            }),
            Some(current) => Ok(Reclaim::Live(current)),
            None => Ok(Reclaim::Gone),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

impl NonceLedger for FsNonceLedger {
    fn check_and_mark_at(
        &self,
        key: &LedgerKey,
        ttl: Option<Duration>,
        now: Timestamp,
    ) -> Result<MarkOutcome, LedgerError> {
        let record = NonceRecord::new(key, now, ttl)?;
        let path = self.record_path(key);
        for _ in 0..RECLAIM_ATTEMPTS {
            if self.try_create(&path, &record)? {
                return Ok(MarkOutcome::Fresh(record));
            }
            match Self::read_record(&path) {
                Ok(Some(existing)) if existing.is_expired(now) => {
                    let _guard = self.reclaim_lock.lock();
                    match self.reclaim_if_expired(&path, now)? {
                        Reclaim::Reclaimed => {
                            if self.try_create(&path, &record)? {
                                return Ok(MarkOutcome::Fresh(record));
                            }
                        }
                        Reclaim::Live(current) => {
                            return Ok(MarkOutcome::Replayed {
                                first_seen_at: Some(current.first_seen_at),
                            })
                        }
                        Reclaim::Gone => {}
                    }
                }
                Ok(Some(existing)) => {
                    return Ok(MarkOutcome::Replayed {
                        first_seen_at: Some(existing.first_seen_at),
                    })
                }
                // Being written by the winner of a concurrent create.
                Ok(None) | Err(LedgerError::Corrupt { .. }) if self.exists(&path) => {
                    return Ok(MarkOutcome::Replayed { first_seen_at: None })
                }
                Ok(None) => {}
                Err(e) => return Err(e),
            }
        }
        tracing::warn!(key = %key, "ledger record kept changing during reclaim");
        Ok(MarkOutcome::Replayed { first_seen_at: None })
    }

    fn purge_expired(&self, now: Timestamp) -> Result<usize, LedgerError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(|e| io_err(&self.dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            match Self::read_record(&path) {
                Ok(Some(record)) if record.is_expired(now) => {
                    let _guard = self.reclaim_lock.lock();
                    match self.reclaim_if_expired(&path, now) {
                        Ok(Reclaim::Reclaimed) => removed += 1,
                        Ok(Reclaim::Live(_) | Reclaim::Gone) => {}
                        Err(LedgerError::Corrupt { path, reason }) => {
                            tracing::warn!(path = %path.display(), %reason, "skipping unreadable ledger record");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(_) => {}
                Err(LedgerError::Corrupt { path, reason }) => {
                    tracing::warn!(path = %path.display(), %reason, "skipping unreadable ledger record");
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!(removed, dir = %self.dir.display(), "purged expired ledger records");
        Ok(removed)
    }
}

fn io_err(path: &Path, source: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn corrupt(path: &Path, e: impl std::fmt::Display) -> LedgerError {
    LedgerError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}
