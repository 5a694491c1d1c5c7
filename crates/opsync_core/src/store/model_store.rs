//! Keyed, persisted collection of models.

use super::{storage_key, StoreEvent, StoreModel, PREFS_NAMESPACE};
use crate::change_feed::{ChangeFeed, SubscriptionId};
use crate::error::{CoreError, CoreResult};
use crate::model::{ChangeHandler, ModelChange};
use opsync_storage::PreferenceStore;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::{Arc, Weak};

struct Member<M> {
    id: String,
    model: M,
    watch: Option<SubscriptionId>,
}

/// An ordered collection of models keyed by id.
///
/// # Invariants
///
/// - Ids are unique; adding an existing id replaces the old member
/// - Every add, remove and member change is persisted before events fire
/// - Without a preference backend the store is memory only
pub struct ModelStore<M: StoreModel> {
    name: String,
    key: String,
    prefs: Option<Arc<dyn PreferenceStore>>,
    members: Mutex<Vec<Member<M>>>,
    events: ChangeFeed<StoreEvent<M>>,
    persist_lock: Mutex<()>,
    this: Weak<Self>,
}

impl<M: StoreModel> ModelStore<M> {
    /// Creates an empty store. Nothing is loaded.
    pub fn new(name: &str, prefs: Option<Arc<dyn PreferenceStore>>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            name: name.to_string(),
            key: storage_key(name),
            prefs,
            members: Mutex::new(Vec::new()),
            events: ChangeFeed::new(),
            persist_lock: Mutex::new(()),
            this: this.clone(),
        })
    }

    /// Creates a store backed by `prefs` and loads its persisted members.
    pub fn open(name: &str, prefs: Arc<dyn PreferenceStore>) -> CoreResult<Arc<Self>> {
        let store = Self::new(name, Some(prefs));
        store.load()?;
        Ok(store)
    }

    /// Creates a memory-only store.
    pub fn in_memory(name: &str) -> Arc<Self> {
        Self::new(name, None)
    }

    /// Returns the store name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the preference key the store persists under.
    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.key
    }

    /// Loads persisted members in front of any in-memory ones.
    ///
    /// Elements that fail to deserialize, lack an id, or duplicate a member
    /// already in memory are skipped. Returns the number loaded.
    pub fn load(&self) -> CoreResult<usize> {
        let Some(prefs) = &self.prefs else {
            return Ok(0);
        };
        let Some(raw) = prefs.get_string(PREFS_NAMESPACE, &self.key)? else {
            return Ok(0);
        };
        let elements = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(elements)) => elements,
            Ok(_) => {
                tracing::warn!(store = %self.name, "persisted store is not an array, ignoring");
                return Ok(0);
            }
            Err(err) => {
                tracing::warn!(store = %self.name, error = %err, "persisted store is not valid JSON, ignoring");
                return Ok(0);
            }
        };

        let mut loaded: Vec<Member<M>> = Vec::with_capacity(elements.len());
        for element in elements {
            let model = match M::from_json(element) {
                Ok(model) => model,
                Err(err) => {
                    tracing::warn!(store = %self.name, error = %err, "dropping malformed persisted model");
                    continue;
                }
            };
            let Some(id) = model.model_id() else {
                tracing::warn!(store = %self.name, "dropping persisted model without id");
                continue;
            };
            if loaded.iter().any(|m| m.id == id) {
                continue;
            }
            let watch = self.watch_member(&id, &model);
            loaded.push(Member { id, model, watch });
        }

        let mut members = self.members.lock();
        let mut skipped = Vec::new();
        loaded.retain(|candidate| {
            let duplicate = members.iter().any(|m| m.id == candidate.id);
            if duplicate {
                skipped.extend(candidate.watch.map(|w| (candidate.model.clone(), w)));
            }
            !duplicate
        });
        let count = loaded.len();
        let in_memory = std::mem::replace(&mut *members, loaded);
        members.extend(in_memory);
        drop(members);

        for (model, watch) in skipped {
            model.unwatch(watch);
        }
        tracing::debug!(store = %self.name, count, "loaded persisted models");
        Ok(count)
    }

    /// Appends `model`, replacing any member with the same id.
    ///
    /// # Errors
    ///
    /// Fails if the model has no id or persisting fails. In the latter case
    /// the store is left as it was before the call.
    pub fn add(&self, model: M, fire_event: bool) -> CoreResult<()> {
        self.put(None, model, fire_event)
    }

    /// Inserts `model` at `index` (clamped), replacing any member with the
    /// same id.
    pub fn insert(&self, index: usize, model: M, fire_event: bool) -> CoreResult<()> {
        self.put(Some(index), model, fire_event)
    }

    fn put(&self, index: Option<usize>, model: M, fire_event: bool) -> CoreResult<()> {
        let id = model.model_id().ok_or_else(|| CoreError::MissingModelId {
            store: self.name.clone(),
        })?;
        let watch = self.watch_member(&id, &model);

        let removed = {
            let mut members = self.members.lock();
            let removed = members
                .iter()
                .position(|m| m.id == id)
                .map(|pos| (pos, members.remove(pos)));
            let member = Member {
                id: id.clone(),
                model: model.clone(),
                watch,
            };
            match index {
                Some(i) => {
                    let i = i.min(members.len());
                    members.insert(i, member);
                }
                None => members.push(member),
            }
            removed
        };

        if let Err(err) = self.persist() {
            self.roll_back_put(&id, removed);
            return Err(err);
        }
        let removed = removed.map(|(_, old)| old);
        if let Some(old) = &removed {
            Self::unwatch_member(old);
        }

        if fire_event {
            if let Some(old) = removed {
                self.events.emit(&StoreEvent::Removed(old.model));
            }
            self.events.emit(&StoreEvent::Added(model));
        }
        Ok(())
    }

    /// Undoes an unpersisted `put`: drops the new member and restores the
    /// one it replaced at its old position.
    fn roll_back_put(&self, id: &str, replaced: Option<(usize, Member<M>)>) {
        let added = {
            let mut members = self.members.lock();
            let added = members
                .iter()
                .position(|m| m.id == id)
                .map(|pos| members.remove(pos));
            if let Some((pos, old)) = replaced {
                let pos = pos.min(members.len());
                members.insert(pos, old);
            }
            added
        };
        if let Some(added) = &added {
            Self::unwatch_member(added);
        }
        tracing::debug!(store = %self.name, id, "rolled back unpersisted add");
    }

    /// Returns the member with `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<M> {
        self.members
            .lock()
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.model.clone())
    }

    /// Returns true if a member with `id` exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.members.lock().iter().any(|m| m.id == id)
    }

    /// Returns all members in order.
    #[must_use]
    pub fn list(&self) -> Vec<M> {
        self.members.lock().iter().map(|m| m.model.clone()).collect()
    }

    /// Returns all member ids in order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.members.lock().iter().map(|m| m.id.clone()).collect()
    }

    /// Returns the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }

    /// Removes the member with `id`, returning it.
    pub fn remove(&self, id: &str, fire_event: bool) -> CoreResult<Option<M>> {
        let removed = {
            let mut members = self.members.lock();
            members
                .iter()
                .position(|m| m.id == id)
                .map(|pos| members.remove(pos))
        };
        let Some(removed) = removed else {
            return Ok(None);
        };
        Self::unwatch_member(&removed);

        self.persist()?;

        if fire_event {
            self.events.emit(&StoreEvent::Removed(removed.model.clone()));
        }
        Ok(Some(removed.model))
    }

    /// Replaces every member. Later duplicates in `models` win.
    pub fn replace_all(&self, models: Vec<M>, fire_event: bool) -> CoreResult<()> {
        let ids = models
            .iter()
            .map(|m| {
                m.model_id().ok_or_else(|| CoreError::MissingModelId {
                    store: self.name.clone(),
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;

        let mut incoming: Vec<Member<M>> = Vec::with_capacity(models.len());
        for (id, model) in ids.into_iter().zip(models) {
            if let Some(pos) = incoming.iter().position(|m| m.id == id) {
                let stale = incoming.remove(pos);
                Self::unwatch_member(&stale);
            }
            let watch = self.watch_member(&id, &model);
            incoming.push(Member { id, model, watch });
        }
        let added: Vec<M> = incoming.iter().map(|m| m.model.clone()).collect();

        let old = std::mem::replace(&mut *self.members.lock(), incoming);
        for member in &old {
            Self::unwatch_member(member);
        }

        self.persist()?;

        if fire_event {
            for member in old {
                self.events.emit(&StoreEvent::Removed(member.model));
            }
            for model in added {
                self.events.emit(&StoreEvent::Added(model));
            }
        }
        Ok(())
    }

    /// Removes every member.
    pub fn clear(&self, fire_event: bool) -> CoreResult<()> {
        self.replace_all(Vec::new(), fire_event)
    }

    /// Mutates the member with `id` and persists the result.
    ///
    /// `f` runs on a copy, so it may be used with value-type models. It must
    /// not change the id. Returns false if no such member exists.
    pub fn update<F>(&self, id: &str, f: F) -> CoreResult<bool>
    where
        F: FnOnce(&mut M),
    {
        let Some(mut model) = self.get(id) else {
            return Ok(false);
        };
        let before = model.to_json();
        f(&mut model);
        let after = model.to_json();

        {
            let mut members = self.members.lock();
            match members.iter_mut().find(|m| m.id == id) {
                Some(member) => member.model = model.clone(),
                None => return Ok(false),
            }
        }

        if before == after {
            return Ok(true);
        }
        self.persist()?;

        let change = ModelChange {
            model_id: Some(id.to_string()),
            path: String::new(),
            property: String::new(),
            old_value: Some(before),
            new_value: Some(after),
        };
        self.events.emit(&StoreEvent::Updated { model, change });
        Ok(true)
    }

    /// Writes the whole store to the preference backend.
    pub fn persist(&self) -> CoreResult<()> {
        let Some(prefs) = &self.prefs else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock();
        let snapshot: Vec<M> = self.members.lock().iter().map(|m| m.model.clone()).collect();
        let json = Value::Array(snapshot.iter().map(StoreModel::to_json).collect());

        prefs
            .save_string(PREFS_NAMESPACE, &self.key, &json.to_string())
            .map_err(|err| {
                tracing::error!(store = %self.name, error = %err, "failed to persist store");
                CoreError::from(err)
            })
    }

    /// Subscribes to store events.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent<M>) + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    /// Removes a store subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub(crate) fn emit(&self, event: &StoreEvent<M>) {
        self.events.emit(event);
    }

    fn watch_member(&self, id: &str, model: &M) -> Option<SubscriptionId> {
        let store = self.this.clone();
        let id = id.to_string();
        let handler: ChangeHandler = Arc::new(move |change: &ModelChange| {
            if let Some(store) = store.upgrade() {
                store.on_member_changed(&id, change);
            }
        });
        model.watch(handler)
    }

    fn unwatch_member(member: &Member<M>) {
        if let Some(watch) = member.watch {
            member.model.unwatch(watch);
        }
    }

    fn on_member_changed(&self, id: &str, change: &ModelChange) {
        let Some(model) = self.get(id) else {
            return;
        };
        if let Err(err) = self.persist() {
            tracing::error!(store = %self.name, id, error = %err, "change not persisted");
        }
        self.events.emit(&StoreEvent::Updated {
            model,
            change: change.clone(),
        });
    }
}

impl<M: StoreModel> Drop for ModelStore<M> {
    fn drop(&mut self) {
        for member in self.members.get_mut().iter() {
            Self::unwatch_member(member);
        }
    }
}

impl<M: StoreModel> std::fmt::Debug for ModelStore<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStore")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("persistent", &self.prefs.is_some())
            .finish()
    }
}
