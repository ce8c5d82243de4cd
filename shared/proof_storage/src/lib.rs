//! Durable, append-only log of received proofs
//!
//! Every proof delivered to the service is wrapped with its server-side arrival time and
//! appended to a single JSON document on disk. Appends to one log file are serialized
//! through a process-wide lock keyed by the file's canonical path, and each write lands
//! through a temporary file that atomically replaces the log, so a concurrent reader never
//! sees a half-written file.

mod error;

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

pub use error::{ProofStorageError, ProofStorageResult};

/// Contents written when the log is created
const EMPTY_LOG: &[u8] = b"[]";

/// Writer locks, one per canonical log path
static WRITE_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(Mutex::default);

/// A proof as recorded by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredProof {
    /// Server-side arrival time (RFC 3339, UTC)
    #[schemars(with = "String")]
    pub received_at: DateTime<Utc>,
    /// Payload exactly as it was received
    pub data: serde_json::Value,
}

/// File-backed proof log
///
/// The handle is meant to be shared (`Arc<ProofStorage>`) between every component that
/// writes or lists proofs. Handles opened on the same file share one writer lock.
pub struct ProofStorage {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl ProofStorage {
    /// Opens the proof log at `path`, creating an empty one if it does not exist
    ///
    /// Creation links a fully written temporary file into place without replacing an
    /// existing file, so it cannot clobber a log created concurrently by another process.
    /// Opening the same file twice in one process yields handles that serialize their
    /// appends against each other; separate processes must not write the same file.
    ///
    /// # Errors
    ///
    /// Returns `ProofStorageError::StoreUnavailable` if the parent directory or the log
    /// cannot be created
    pub async fn open(path: impl Into<PathBuf>) -> ProofStorageResult<Self> {
        let path = path.into();
        let unavailable = |source: std::io::Error| ProofStorageError::StoreUnavailable {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(parent_dir(&path))
            .await
            .map_err(unavailable)?;

        let (created, canonical) = {
            let path = path.clone();
            run_blocking(move || -> std::io::Result<(bool, PathBuf)> {
                let created = create_if_missing(&path)?;
                Ok((created, std::fs::canonicalize(&path)?))
            })
            .await
            .map_err(unavailable)?
            .map_err(unavailable)?
        };

        if created {
            tracing::info!("Created empty proof store at {}", path.display());
        } else {
            tracing::debug!("Using existing proof store at {}", path.display());
        }

        Ok(Self {
            path,
            write_lock: write_lock_for(canonical),
        })
    }

    /// Location of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a proof to the log and returns the stored entry
    ///
    /// The arrival timestamp is assigned while the write lock is held, so timestamps are
    /// strictly increasing in log order. The read-modify-write runs on a blocking thread
    /// that holds the lock until the log has been replaced; dropping the returned future
    /// does not interrupt it.
    ///
    /// If the backing file disappeared after [`ProofStorage::open`], the append fails with
    /// `StoreUnavailable` and the log is not recreated.
    ///
    /// # Errors
    ///
    /// - `ProofStorageError::StoreUnavailable` - the current log cannot be read
    /// - `ProofStorageError::StoreCorrupted` - the current log is not a valid proof list
    /// - `ProofStorageError::PersistFailure` - the updated log cannot be written
    pub async fn append(&self, data: serde_json::Value) -> ProofStorageResult<StoredProof> {
        let path = self.path.clone();
        let write_lock = Arc::clone(&self.write_lock);

        let (entry, count) = run_blocking(move || -> ProofStorageResult<(StoredProof, usize)> {
            let _guard = write_lock.lock().unwrap_or_else(PoisonError::into_inner);

            let mut proofs = read_log(&path)?;
            let entry = StoredProof {
                received_at: next_arrival_time(proofs.last(), Utc::now()),
                data,
            };
            proofs.push(entry.clone());

            replace_log(&path, &proofs)?;
            Ok((entry, proofs.len()))
        })
        .await
        .map_err(|source| ProofStorageError::PersistFailure {
            path: self.path.clone(),
            source,
        })??;

        tracing::debug!(
            "Appended proof #{count} received at {}",
            entry.received_at
        );

        Ok(entry)
    }

    /// Returns every stored proof in arrival order
    ///
    /// # Errors
    ///
    /// - `ProofStorageError::StoreUnavailable` - the log cannot be read
    /// - `ProofStorageError::StoreCorrupted` - the log is not a valid proof list
    pub async fn load_all(&self) -> ProofStorageResult<Vec<StoredProof>> {
        let path = self.path.clone();

        run_blocking(move || read_log(&path))
            .await
            .map_err(|source| ProofStorageError::StoreUnavailable {
                path: self.path.clone(),
                source,
            })?
    }
}

fn write_lock_for(canonical: PathBuf) -> Arc<Mutex<()>> {
    let mut locks = WRITE_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(canonical).or_default())
}

fn read_log(path: &Path) -> ProofStorageResult<Vec<StoredProof>> {
    let raw = std::fs::read(path).map_err(|source| ProofStorageError::StoreUnavailable {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_slice(&raw).map_err(|source| ProofStorageError::StoreCorrupted {
        path: path.to_path_buf(),
        source,
    })
}

fn replace_log(path: &Path, proofs: &[StoredProof]) -> ProofStorageResult<()> {
    write_atomically(path, proofs).map_err(|source| ProofStorageError::PersistFailure {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes the full log to a temporary sibling file and renames it over `path`
fn write_atomically(path: &Path, proofs: &[StoredProof]) -> std::io::Result<()> {
    let contents = serde_json::to_vec_pretty(proofs)?;

    let mut tmp = NamedTempFile::new_in(parent_dir(path))?;
    tmp.write_all(&contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Arrival time for a new entry, never earlier than or equal to the previous entry
fn next_arrival_time(last: Option<&StoredProof>, now: DateTime<Utc>) -> DateTime<Utc> {
    match last {
        Some(last) if last.received_at >= now => last.received_at + TimeDelta::microseconds(1),
        _ => now,
    }
}

/// Creates the log with an empty list; returns `false` if it already existed
fn create_if_missing(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    let mut tmp = NamedTempFile::new_in(parent_dir(path))?;
    tmp.write_all(EMPTY_LOG)?;
    tmp.as_file().sync_all()?;

    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Runs blocking file work to completion on the blocking pool
///
/// The work keeps running even if the returned future is dropped.
async fn run_blocking<T, F>(f: F) -> std::io::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(std::io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored_at(received_at: DateTime<Utc>) -> StoredProof {
        StoredProof {
            received_at,
            data: json!({}),
        }
    }

    #[test]
    fn test_next_arrival_time_uses_clock_when_ahead() {
        let now = Utc::now();
        let last = stored_at(now - TimeDelta::seconds(1));

        assert_eq!(next_arrival_time(Some(&last), now), now);
        assert_eq!(next_arrival_time(None, now), now);
    }

    #[test]
    fn test_next_arrival_time_is_strictly_increasing() {
        let now = Utc::now();

        // Same instant as the previous entry
        let last = stored_at(now);
        assert!(next_arrival_time(Some(&last), now) > now);

        // Clock went backwards
        let last = stored_at(now + TimeDelta::seconds(5));
        assert!(next_arrival_time(Some(&last), now) > last.received_at);
    }

    #[test]
    fn test_stored_proof_wire_format() {
        let proof = StoredProof {
            received_at: DateTime::parse_from_rfc3339("2025-01-02T03:04:05.678Z")
                .unwrap()
                .with_timezone(&Utc),
            data: json!({"foo": "bar"}),
        };

        let value = serde_json::to_value(&proof).unwrap();
        assert_eq!(value["data"], json!({"foo": "bar"}));
        assert!(value["receivedAt"]
            .as_str()
            .unwrap()
            .starts_with("2025-01-02T03:04:05.678"));
    }

    #[test]
    fn test_parent_dir_of_bare_file_name() {
        assert_eq!(parent_dir(Path::new("proofs.json")), PathBuf::from("."));
        assert_eq!(
            parent_dir(Path::new("/var/lib/proofs.json")),
            PathBuf::from("/var/lib")
        );
    }
}
