//! Preference store trait definition.

use crate::error::StorageResult;

/// A string key/value persistence surface.
///
/// Values are grouped by namespace. Stores never interpret the strings they
/// hold; model stores serialize themselves to JSON and hand the result over
/// as an opaque value.
///
/// # Invariants
///
/// - `get_string` returns exactly the last value saved under the same
///   namespace and key, or `None` if nothing was saved or it was removed
/// - `save_string` is durable for the backend's definition of durable once it
///   returns
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryPreferences`] - For testing
/// - [`super::FilePreferences`] - For persistent storage
pub trait PreferenceStore: Send + Sync {
    /// Reads the value stored under `key` in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get_string(&self, namespace: &str, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key` in `namespace`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written durably.
    fn save_string(&self, namespace: &str, key: &str, value: &str) -> StorageResult<()>;

    /// Removes the value stored under `key` in `namespace`.
    ///
    /// Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be written durably.
    fn remove(&self, namespace: &str, key: &str) -> StorageResult<()>;

    /// Returns the keys currently stored in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn keys(&self, namespace: &str) -> StorageResult<Vec<String>>;

    /// Reads the value stored under `key`, falling back to `default`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get_string_or(&self, namespace: &str, key: &str, default: &str) -> StorageResult<String> {
        Ok(self
            .get_string(namespace, key)?
            .unwrap_or_else(|| default.to_string()))
    }
}
