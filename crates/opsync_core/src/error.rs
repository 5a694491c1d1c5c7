//! Error types for opsync core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in model and store operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Preference storage error.
    #[error("storage error: {0}")]
    Storage(#[from] opsync_storage::StorageError),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A JSON value could not be turned into a model.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// A model without an id was added to a store.
    #[error("model added to store {store:?} has no id")]
    MissingModelId {
        /// Name of the store.
        store: String,
    },
}
