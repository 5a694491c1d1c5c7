//! Error types for the operation engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the operation repo.
///
/// Expected executor failures never appear here; they are resolved inside
/// the queue and reported only through `enqueue_and_wait`.
#[derive(Error, Debug)]
pub enum EngineError {
    /// An operation name has no executor.
    #[error("no executor registered for operation {name:?}")]
    MissingExecutor {
        /// Operation name.
        name: String,
    },

    /// Two executors claim the same operation name.
    #[error("operation {name:?} is claimed by more than one executor")]
    DuplicateExecutor {
        /// Operation name.
        name: String,
    },

    /// No tokio runtime was supplied or found.
    #[error("no tokio runtime available to run the operation worker")]
    NoRuntime,

    /// The repo was shut down.
    #[error("operation repo is shut down")]
    Shutdown,

    /// Model store error.
    #[error("store error: {0}")]
    Core(#[from] opsync_core::CoreError),

    /// Preference storage error.
    #[error("storage error: {0}")]
    Storage(#[from] opsync_storage::StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = EngineError::MissingExecutor {
            name: "set-tag".into(),
        };
        assert_eq!(
            err.to_string(),
            "no executor registered for operation \"set-tag\""
        );
        assert_eq!(EngineError::Shutdown.to_string(), "operation repo is shut down");
    }

    #[test]
    fn core_errors_convert() {
        let core = opsync_core::CoreError::InvalidModel("x".into());
        let err: EngineError = core.into();
        assert!(matches!(err, EngineError::Core(_)));
    }
}
