//! Observable property bag.
//!
//! A [`Model`] holds named JSON values in insertion order. Reads go through
//! serde, so any `Serialize`/`DeserializeOwned` type can be stored. Writes
//! that change a value notify subscribers synchronously and bubble to the
//! parent model, if any, with the path prefixed by the owning property.
//!
//! ```rust,ignore
//! let user = Model::with_id("user-1");
//! user.subscribe(|change| println!("{} changed", change.path));
//! user.set("language", "en")?;
//! assert_eq!(user.get::<String>("language").as_deref(), Some("en"));
//! ```

use crate::change_feed::{ChangeFeed, SubscriptionId};
use crate::error::{CoreError, CoreResult};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Callback receiving model changes.
pub type ChangeHandler = Arc<dyn Fn(&ModelChange) + Send + Sync>;

/// A single property change.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelChange {
    /// Id of the model the event was delivered on.
    pub model_id: Option<String>,
    /// Dotted path from the receiving model to the changed property.
    pub path: String,
    /// Name of the changed property on the model that owns it.
    pub property: String,
    /// Previous value, `None` if the property was absent.
    pub old_value: Option<Value>,
    /// New value, `None` if the property was removed.
    pub new_value: Option<Value>,
}

impl ModelChange {
    /// Creates a change rooted at `property`.
    #[must_use]
    pub fn new(property: &str, old_value: Option<Value>, new_value: Option<Value>) -> Self {
        Self {
            model_id: None,
            path: property.to_string(),
            property: property.to_string(),
            old_value,
            new_value,
        }
    }
}

/// A mutable, observable, JSON-backed entity.
///
/// `Model` is a cheap handle; clones share the same state and subscribers.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

struct ModelInner {
    state: RwLock<ModelState>,
    changes: ChangeFeed<ModelChange>,
    parent: RwLock<Option<ParentLink>>,
}

#[derive(Default)]
struct ModelState {
    /// Property values. Child models keep a `Null` placeholder here so
    /// serialization preserves insertion order.
    data: Map<String, Value>,
    children: HashMap<String, Model>,
}

impl ModelState {
    fn current(&self, name: &str) -> Option<Value> {
        match self.children.get(name) {
            Some(child) => Some(child.to_json()),
            None => self.data.get(name).cloned(),
        }
    }
}

struct ParentLink {
    property: String,
    forward: ChangeHandler,
}

impl Model {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::from_map(Map::new())
    }

    /// Creates an empty model with the given id.
    #[must_use]
    pub fn with_id(id: &str) -> Self {
        let mut data = Map::new();
        data.insert("id".to_string(), Value::String(id.to_string()));
        Self::from_map(data)
    }

    fn from_map(data: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(ModelInner {
                state: RwLock::new(ModelState {
                    data,
                    children: HashMap::new(),
                }),
                changes: ChangeFeed::new(),
                parent: RwLock::new(None),
            }),
        }
    }

    /// Builds a model from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidModel`] if `value` is not an object.
    pub fn from_json(value: Value) -> CoreResult<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(CoreError::InvalidModel(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Returns the model id, if set.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.get("id")
    }

    /// Sets the model id.
    pub fn set_id(&self, id: &str) -> CoreResult<()> {
        self.set("id", id)
    }

    /// Reads a property, or `None` if absent or of a different type.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let value = self.inner.state.read().current(name)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(err) => {
                tracing::trace!(property = name, error = %err, "property has unexpected type");
                None
            }
        }
    }

    /// Reads a property, falling back to `default`.
    #[must_use]
    pub fn get_or<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        self.get(name).unwrap_or(default)
    }

    /// Returns the raw JSON value of a property.
    #[must_use]
    pub fn get_value(&self, name: &str) -> Option<Value> {
        self.inner.state.read().current(name)
    }

    /// Sets a property and notifies subscribers if it changed.
    pub fn set<T: Serialize>(&self, name: &str, value: T) -> CoreResult<()> {
        self.set_property(name, value, true)
    }

    /// Sets a property. A value serializing to `null` removes the key.
    ///
    /// Subscribers are notified only when `notify` is set and the stored
    /// value actually changed.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn set_property<T: Serialize>(&self, name: &str, value: T, notify: bool) -> CoreResult<()> {
        let new_value = serde_json::to_value(value)?;
        let new_value = (!new_value.is_null()).then_some(new_value);

        let (old_value, detached) = {
            let mut state = self.inner.state.write();
            let old_value = state.current(name);
            if old_value == new_value {
                return Ok(());
            }
            let detached = state.children.remove(name);
            match &new_value {
                Some(v) => {
                    state.data.insert(name.to_string(), v.clone());
                }
                None => {
                    state.data.remove(name);
                }
            }
            (old_value, detached)
        };

        if let Some(child) = detached {
            child.detach();
        }
        if notify {
            self.propagate(ModelChange::new(name, old_value, new_value));
        }
        Ok(())
    }

    /// Removes a property.
    pub fn remove(&self, name: &str, notify: bool) -> CoreResult<()> {
        self.set_property(name, Value::Null, notify)
    }

    /// Returns true if the property was set and not removed since.
    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.inner.state.read().data.contains_key(name)
    }

    /// Returns property names in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.state.read().data.keys().cloned().collect()
    }

    /// Attaches `child` under `name`. Changes on the child bubble up here.
    pub fn set_child(&self, name: &str, child: &Model, notify: bool) {
        let new_value = child.to_json();
        let (old_value, replaced) = {
            let mut state = self.inner.state.write();
            let old_value = state.current(name);
            let replaced = state.children.insert(name.to_string(), child.clone());
            state.data.insert(name.to_string(), Value::Null);
            (old_value, replaced)
        };

        if let Some(previous) = replaced {
            if !Arc::ptr_eq(&previous.inner, &child.inner) {
                previous.detach();
            }
        }
        child.attach(name, Arc::downgrade(&self.inner));

        if notify && old_value.as_ref() != Some(&new_value) {
            self.propagate(ModelChange::new(name, old_value, Some(new_value)));
        }
    }

    /// Returns the child model stored under `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<Model> {
        self.inner.state.read().children.get(name).cloned()
    }

    /// Subscribes to changes on this model and its children.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ModelChange) + Send + Sync + 'static,
    {
        self.inner.changes.subscribe(handler)
    }

    /// Subscribes an already shared handler.
    pub fn subscribe_handler(&self, handler: ChangeHandler) -> SubscriptionId {
        self.inner.changes.subscribe_handler(handler)
    }

    /// Removes a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.changes.unsubscribe(id)
    }

    /// Serializes the model, children inline.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(self.to_map())
    }

    fn to_map(&self) -> Map<String, Value> {
        let state = self.inner.state.read();
        state
            .data
            .iter()
            .map(|(key, value)| {
                let value = match state.children.get(key) {
                    Some(child) => child.to_json(),
                    None => value.clone(),
                };
                (key.clone(), value)
            })
            .collect()
    }

    /// Replaces every property with those of `other` without notifying.
    ///
    /// The model keeps its own id and its subscribers. Children of `other`
    /// are copied as plain values.
    pub fn initialize_from(&self, other: &Model) {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return;
        }
        let source = other.to_map();
        let detached: Vec<Model> = {
            let mut state = self.inner.state.write();
            let own_id = state.data.get("id").cloned();
            state.data = source;
            if let Some(id) = own_id {
                state.data.insert("id".to_string(), id);
            }
            state.children.drain().map(|(_, child)| child).collect()
        };
        for child in detached {
            child.detach();
        }
    }

    /// Returns true if both handles refer to the same model.
    #[must_use]
    pub fn ptr_eq(&self, other: &Model) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn attach(&self, property: &str, parent: Weak<ModelInner>) {
        let forward: ChangeHandler = Arc::new(move |change: &ModelChange| {
            if let Some(inner) = parent.upgrade() {
                Model { inner }.propagate(change.clone());
            }
        });
        *self.inner.parent.write() = Some(ParentLink {
            property: property.to_string(),
            forward,
        });
    }

    fn detach(&self) {
        *self.inner.parent.write() = None;
    }

    fn propagate(&self, mut change: ModelChange) {
        change.model_id = self.id();
        self.inner.changes.emit(&change);

        let link = self
            .inner
            .parent
            .read()
            .as_ref()
            .map(|link| (link.property.clone(), Arc::clone(&link.forward)));
        if let Some((property, forward)) = link {
            change.path = format!("{property}.{}", change.path);
            forward(&change);
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Model").field(&self.to_json()).finish()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
