//! Error types for preference storage.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A namespace document could not be parsed.
    #[error("preferences corrupted in {path}: {message}")]
    Corrupted {
        /// The namespace document that failed to parse.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// Another process holds the preference directory.
    #[error("preference directory is locked by another process: {0}")]
    Locked(PathBuf),

    /// The namespace name cannot be used as a file name.
    #[error("invalid namespace: {0:?}")]
    InvalidNamespace(String),

    /// A namespace document could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
