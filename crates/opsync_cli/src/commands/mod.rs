//! CLI command implementations.

pub mod dump_queue;
pub mod edit;
pub mod inspect;

use opsync_engine::{OperationStore, OPERATION_STORE_NAME};
use opsync_storage::{FilePreferences, PreferenceStore};
use opsync_user::UserOperation;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Errors specific to the CLI.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The directory holds no preferences.
    #[error("no preference directory found at {0}")]
    NotFound(PathBuf),

    /// No pending operation has the given id.
    #[error("no pending operation with id {0}")]
    UnknownOperation(String),

    /// A destructive command ran without `--yes`.
    #[error("refusing to clear the queue without --yes")]
    ConfirmationRequired,
}

/// Opens an existing preference directory.
pub fn open_prefs(path: &Path) -> Result<Arc<FilePreferences>, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(CliError::NotFound(path.to_path_buf()).into());
    }
    Ok(Arc::new(FilePreferences::open(path)?))
}

/// Opens and loads the operation queue.
pub fn open_queue(
    prefs: Arc<dyn PreferenceStore>,
) -> Result<Arc<OperationStore<UserOperation>>, Box<dyn std::error::Error>> {
    Ok(OperationStore::<UserOperation>::open(OPERATION_STORE_NAME, prefs)?)
}
