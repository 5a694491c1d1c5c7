//! Local identifiers and their translation to backend identifiers.

use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// Prefix carried by every identifier minted on this device.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Mints a new local identifier.
#[must_use]
pub fn create_local_id() -> String {
    format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4())
}

/// Returns true if `id` was minted locally and has no backend meaning.
#[must_use]
pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}

/// Maps locally-minted identifiers to backend-confirmed identifiers.
///
/// # Invariants
///
/// - A local id is distinguishable from a backend id by [`LOCAL_ID_PREFIX`]
/// - `resolve` returns the backend id if known, else its input
/// - A translation, once recorded, is never replaced or removed
#[derive(Debug, Default)]
pub struct IdTranslator {
    translations: RwLock<HashMap<String, Option<String>>>,
}

impl IdTranslator {
    /// Creates an empty translator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a local id and registers it as unresolved.
    pub fn create_local_id(&self) -> String {
        let id = create_local_id();
        self.translations.write().insert(id.clone(), None);
        id
    }

    /// Records that `local_id` is known to the backend as `backend_id`.
    ///
    /// Returns false if `local_id` already resolves to a different id; the
    /// existing translation is kept.
    pub fn set_translation(&self, local_id: &str, backend_id: &str) -> bool {
        let mut translations = self.translations.write();
        match translations.get(local_id) {
            Some(Some(existing)) if existing != backend_id => {
                tracing::warn!(
                    local_id,
                    existing = %existing,
                    rejected = backend_id,
                    "ignoring conflicting id translation"
                );
                false
            }
            Some(Some(_)) => true,
            _ => {
                translations.insert(local_id.to_string(), Some(backend_id.to_string()));
                tracing::debug!(local_id, backend_id, "id translated");
                true
            }
        }
    }

    /// Records every translation in `map` and returns the accepted ones.
    ///
    /// Entries that conflict with an existing translation are left out, so
    /// the result is safe to rewrite stored references with.
    pub fn apply(&self, map: &HashMap<String, String>) -> HashMap<String, String> {
        map.iter()
            .filter(|(local, backend)| self.set_translation(local, backend))
            .map(|(local, backend)| (local.clone(), backend.clone()))
            .collect()
    }

    /// Returns true iff `id` carries the local prefix.
    #[must_use]
    pub fn is_local_only(&self, id: &str) -> bool {
        is_local_id(id)
    }

    /// Returns true if `id` has a recorded backend translation.
    #[must_use]
    pub fn is_resolved(&self, id: &str) -> bool {
        matches!(self.translations.read().get(id), Some(Some(_)))
    }

    /// Returns the backend id for `id` if translated, else `id` itself.
    #[must_use]
    pub fn resolve(&self, id: &str) -> String {
        self.translations
            .read()
            .get(id)
            .and_then(Clone::clone)
            .unwrap_or_else(|| id.to_string())
    }

    /// Returns a snapshot of every resolved translation.
    #[must_use]
    pub fn resolved_map(&self) -> HashMap<String, String> {
        self.translations
            .read()
            .iter()
            .filter_map(|(local, backend)| backend.clone().map(|b| (local.clone(), b)))
            .collect()
    }

    /// Returns the number of registered ids, resolved or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.translations.read().len()
    }

    /// Returns true if no id was ever registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.translations.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_are_prefixed_and_unique() {
        let a = create_local_id();
        let b = create_local_id();
        assert!(is_local_id(&a));
        assert!(a.starts_with("local-"));
        assert_ne!(a, b);
        assert!(!is_local_id("5f1c0d2e-backend"));
    }

    #[test]
    fn minted_ids_start_unresolved() {
        let translator = IdTranslator::new();
        let id = translator.create_local_id();

        assert!(translator.is_local_only(&id));
        assert!(!translator.is_resolved(&id));
        assert_eq!(translator.resolve(&id), id);
        assert_eq!(translator.len(), 1);
    }

    #[test]
    fn resolve_returns_backend_id() {
        let translator = IdTranslator::new();
        let id = translator.create_local_id();

        assert!(translator.set_translation(&id, "backend-1"));
        assert_eq!(translator.resolve(&id), "backend-1");
        assert!(translator.is_resolved(&id));
        assert_eq!(translator.resolve("unrelated"), "unrelated");
    }

    #[test]
    fn translations_are_append_only() {
        let translator = IdTranslator::new();
        assert!(translator.set_translation("local-a", "backend-1"));
        assert!(translator.set_translation("local-a", "backend-1"));
        assert!(!translator.set_translation("local-a", "backend-2"));
        assert_eq!(translator.resolve("local-a"), "backend-1");
    }

    #[test]
    fn apply_returns_accepted_subset() {
        let translator = IdTranslator::new();
        translator.set_translation("local-a", "backend-1");

        let map = HashMap::from([
            ("local-a".to_string(), "backend-9".to_string()),
            ("local-b".to_string(), "backend-2".to_string()),
        ]);
        let accepted = translator.apply(&map);
        assert_eq!(
            accepted,
            HashMap::from([("local-b".to_string(), "backend-2".to_string())])
        );

        let resolved = translator.resolved_map();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved["local-a"], "backend-1");
        assert_eq!(resolved["local-b"], "backend-2");
    }
}
