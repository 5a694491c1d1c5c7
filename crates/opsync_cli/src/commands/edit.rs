//! Queue editing commands.

use super::{open_prefs, open_queue, CliError};
use opsync_storage::PreferenceStore;
use std::path::Path;
use std::sync::Arc;

/// Runs the remove command.
pub fn remove(path: &Path, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let name = remove_operation(open_prefs(path)?, id)?;
    println!("Removed {name} operation {id}");
    Ok(())
}

/// Runs the clear command.
pub fn clear(path: &Path, confirmed: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !confirmed {
        return Err(CliError::ConfirmationRequired.into());
    }
    let count = clear_operations(open_prefs(path)?)?;
    println!("Removed {count} pending operations");
    Ok(())
}

/// Removes the operation `id`, returning its name.
pub fn remove_operation(
    prefs: Arc<dyn PreferenceStore>,
    id: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let queue = open_queue(prefs)?;
    let removed = queue
        .remove(id, false)?
        .ok_or_else(|| CliError::UnknownOperation(id.to_string()))?;
    let name = opsync_engine::Operation::name(&removed.operation).to_string();
    tracing::info!(id, name = %name, "operation removed");
    Ok(name)
}

/// Removes every pending operation, returning how many there were.
pub fn clear_operations(prefs: Arc<dyn PreferenceStore>) -> Result<usize, Box<dyn std::error::Error>> {
    let queue = open_queue(prefs)?;
    let count = queue.len();
    queue.clear(false)?;
    tracing::info!(count, "queue cleared");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsync_engine::{OperationStore, QueuedOperation, OPERATION_STORE_NAME};
    use opsync_storage::FilePreferences;
    use opsync_user::{SetTag, UserOperation};
    use tempfile::TempDir;

    fn seed(prefs: Arc<dyn PreferenceStore>) -> Vec<String> {
        let store = OperationStore::<UserOperation>::open(OPERATION_STORE_NAME, prefs).unwrap();
        (0..3)
            .map(|i| {
                let queued = QueuedOperation::new(UserOperation::from(SetTag::new(
                    "app",
                    "u",
                    &format!("k{i}"),
                    "v",
                )));
                let id = queued.id.clone();
                store.add(queued, false).unwrap();
                id
            })
            .collect()
    }

    #[test]
    fn remove_persists() {
        let dir = TempDir::new().unwrap();
        let ids = {
            let prefs = Arc::new(FilePreferences::open(dir.path()).unwrap());
            let ids = seed(prefs.clone());
            assert_eq!(remove_operation(prefs, &ids[1]).unwrap(), "set-tag");
            ids
        };

        let prefs = Arc::new(FilePreferences::open(dir.path()).unwrap());
        let queue = open_queue(prefs).unwrap();
        assert_eq!(queue.ids(), vec![ids[0].clone(), ids[2].clone()]);
    }

    #[test]
    fn unknown_id_is_an_error() {
        let prefs: Arc<dyn PreferenceStore> = Arc::new(opsync_storage::InMemoryPreferences::new());
        seed(prefs.clone());
        let err = remove_operation(prefs, "missing").unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn clear_empties_queue() {
        let prefs: Arc<dyn PreferenceStore> = Arc::new(opsync_storage::InMemoryPreferences::new());
        seed(prefs.clone());
        assert_eq!(clear_operations(prefs.clone()).unwrap(), 3);
        assert!(open_queue(prefs).unwrap().is_empty());
    }

    #[test]
    fn clear_needs_confirmation() {
        let dir = TempDir::new().unwrap();
        let err = clear(dir.path(), false).unwrap_err();
        assert!(err.to_string().contains("--yes"));
    }
}
