//! In-memory preference store for testing.

use crate::backend::PreferenceStore;
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// An in-memory preference store.
///
/// This store keeps all values in memory and is suitable for:
/// - Unit tests
/// - Integration tests that simulate a process restart by sharing the store
/// - Ephemeral sessions that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use opsync_storage::{InMemoryPreferences, PreferenceStore};
///
/// let prefs = InMemoryPreferences::new();
/// prefs.save_string("ns", "key", "value").unwrap();
/// assert_eq!(prefs.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryPreferences {
    data: RwLock<HashMap<String, BTreeMap<String, String>>>,
}

impl InMemoryPreferences {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with a single value.
    ///
    /// Useful for testing load paths against hand-written documents.
    #[must_use]
    pub fn with_value(namespace: &str, key: &str, value: &str) -> Self {
        let prefs = Self::new();
        prefs
            .data
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        prefs
    }

    /// Returns the total number of stored values across namespaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().values().map(BTreeMap::len).sum()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears every namespace.
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl PreferenceStore for InMemoryPreferences {
    fn get_string(&self, namespace: &str, key: &str) -> StorageResult<Option<String>> {
        Ok(self
            .data
            .read()
            .get(namespace)
            .and_then(|values| values.get(key))
            .cloned())
    }

    fn save_string(&self, namespace: &str, key: &str, value: &str) -> StorageResult<()> {
        self.data
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> StorageResult<()> {
        if let Some(values) = self.data.write().get_mut(namespace) {
            values.remove(key);
        }
        Ok(())
    }

    fn keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .data
            .read()
            .get(namespace)
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let prefs = InMemoryPreferences::new();
        assert!(prefs.is_empty());
        assert_eq!(prefs.get_string("ns", "missing").unwrap(), None);
    }

    #[test]
    fn memory_save_then_get() {
        let prefs = InMemoryPreferences::new();
        prefs.save_string("ns", "key", "one").unwrap();
        assert_eq!(prefs.get_string("ns", "key").unwrap().as_deref(), Some("one"));

        prefs.save_string("ns", "key", "two").unwrap();
        assert_eq!(prefs.get_string("ns", "key").unwrap().as_deref(), Some("two"));
        assert_eq!(prefs.len(), 1);
    }

    #[test]
    fn memory_namespaces_are_isolated() {
        let prefs = InMemoryPreferences::new();
        prefs.save_string("a", "key", "from-a").unwrap();
        prefs.save_string("b", "key", "from-b").unwrap();

        assert_eq!(prefs.get_string("a", "key").unwrap().as_deref(), Some("from-a"));
        assert_eq!(prefs.get_string("b", "key").unwrap().as_deref(), Some("from-b"));
        assert_eq!(prefs.keys("a").unwrap(), vec!["key".to_string()]);
    }

    #[test]
    fn memory_remove() {
        let prefs = InMemoryPreferences::with_value("ns", "key", "value");
        prefs.remove("ns", "key").unwrap();
        assert_eq!(prefs.get_string("ns", "key").unwrap(), None);

        // Removing again is fine
        prefs.remove("ns", "key").unwrap();
        prefs.remove("other", "key").unwrap();
    }

    #[test]
    fn memory_get_string_or_default() {
        let prefs = InMemoryPreferences::new();
        assert_eq!(prefs.get_string_or("ns", "key", "[]").unwrap(), "[]");

        prefs.save_string("ns", "key", "[1]").unwrap();
        assert_eq!(prefs.get_string_or("ns", "key", "[]").unwrap(), "[1]");
    }

    #[test]
    fn memory_clear() {
        let prefs = InMemoryPreferences::with_value("ns", "key", "value");
        prefs.clear();
        assert!(prefs.is_empty());
    }
}
