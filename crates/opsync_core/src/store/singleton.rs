//! Store holding exactly one model.

use super::{ModelStore, StoreEvent};
use crate::change_feed::SubscriptionId;
use crate::error::CoreResult;
use crate::model::Model;
use opsync_storage::PreferenceStore;
use parking_lot::Mutex;
use std::sync::Arc;

/// Id of the single member of a [`SingletonStore`].
pub const SINGLETON_ID: &str = "-singleton-";

/// A store whose single model always exists.
///
/// The model is created on first access. [`SingletonStore::replace`] copies
/// new content onto the existing model so handles and subscribers stay valid.
pub struct SingletonStore {
    store: Arc<ModelStore<Model>>,
    create_lock: Mutex<()>,
}

impl SingletonStore {
    /// Wraps an existing model store.
    #[must_use]
    pub fn new(store: Arc<ModelStore<Model>>) -> Self {
        Self {
            store,
            create_lock: Mutex::new(()),
        }
    }

    /// Opens a persisted singleton store.
    pub fn open(name: &str, prefs: Arc<dyn PreferenceStore>) -> CoreResult<Self> {
        Ok(Self::new(ModelStore::open(name, prefs)?))
    }

    /// Creates a memory-only singleton store.
    #[must_use]
    pub fn in_memory(name: &str) -> Self {
        Self::new(ModelStore::in_memory(name))
    }

    /// Returns the singleton, creating it if needed.
    pub fn model(&self) -> Model {
        if let Some(model) = self.store.get(SINGLETON_ID) {
            return model;
        }
        let _guard = self.create_lock.lock();
        if let Some(model) = self.store.get(SINGLETON_ID) {
            return model;
        }

        let model = Model::with_id(SINGLETON_ID);
        if let Err(err) = self.store.add(model.clone(), false) {
            tracing::error!(store = %self.store.name(), error = %err, "singleton not persisted");
        }
        model
    }

    /// Copies every property of `model` onto the singleton.
    pub fn replace(&self, model: &Model, fire_event: bool) -> CoreResult<()> {
        let existing = self.model();
        existing.initialize_from(model);
        self.store.persist()?;
        if fire_event {
            self.store.emit(&StoreEvent::Replaced(existing));
        }
        Ok(())
    }

    /// Subscribes to store events: in-place updates and replacements.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent<Model>) + Send + Sync + 'static,
    {
        self.store.subscribe(handler)
    }

    /// Removes a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<ModelStore<Model>> {
        &self.store
    }
}

impl std::fmt::Debug for SingletonStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonStore")
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{storage_key, PREFS_NAMESPACE};
    use opsync_storage::InMemoryPreferences;

    #[test]
    fn model_is_created_once() {
        let singleton = SingletonStore::in_memory("config");
        let a = singleton.model();
        let b = singleton.model();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.id().as_deref(), Some(SINGLETON_ID));
        assert_eq!(singleton.store().len(), 1);
    }

    #[test]
    fn replace_keeps_handle_and_fires_replaced() {
        let singleton = SingletonStore::in_memory("identity");
        let handle = singleton.model();
        handle.set("externalId", "old").unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        singleton.subscribe(move |e| {
            sink.lock().push(matches!(e, StoreEvent::Replaced(_)));
        });

        let fresh = Model::new();
        fresh.set("externalId", "new").unwrap();
        singleton.replace(&fresh, true).unwrap();

        assert_eq!(handle.get::<String>("externalId").as_deref(), Some("new"));
        assert_eq!(handle.id().as_deref(), Some(SINGLETON_ID));
        assert_eq!(*events.lock(), vec![true]);
    }

    #[test]
    fn survives_reopen() {
        let prefs = Arc::new(InMemoryPreferences::new());
        {
            let singleton = SingletonStore::open("config", prefs.clone()).unwrap();
            singleton.model().set("opRepoExecutionInterval", 100).unwrap();
        }
        assert!(prefs
            .get_string(PREFS_NAMESPACE, &storage_key("config"))
            .unwrap()
            .is_some());

        let reopened = SingletonStore::open("config", prefs).unwrap();
        assert_eq!(reopened.model().get::<u64>("opRepoExecutionInterval"), Some(100));
    }
}
