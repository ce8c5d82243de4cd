//! Error types for proof storage operations

use std::path::PathBuf;

use thiserror::Error;

/// Result type for proof storage operations
pub type ProofStorageResult<T> = Result<T, ProofStorageError>;

/// Errors that can occur during proof storage operations
#[derive(Error, Debug)]
pub enum ProofStorageError {
    /// The backing file could not be read (missing, permissions, I/O)
    #[error("Proof store {} is unavailable: {source}", path.display())]
    StoreUnavailable {
        /// Location of the backing file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The backing file was read but does not contain a well-formed proof log
    #[error("Proof store {} is corrupted: {source}", path.display())]
    StoreCorrupted {
        /// Location of the backing file
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Writing the updated proof log failed
    #[error("Failed to persist proof store {}: {source}", path.display())]
    PersistFailure {
        /// Location of the backing file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
