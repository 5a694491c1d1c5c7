//! Persisted model collections.
//!
//! A store serializes all of its members to one JSON array under the key
//! `MODEL_STORE_<name>` in the [`PREFS_NAMESPACE`] namespace. Every committed
//! mutation is written through before events fire.

mod model_store;
mod singleton;

pub use model_store::ModelStore;
pub use singleton::{SingletonStore, SINGLETON_ID};

use crate::change_feed::SubscriptionId;
use crate::error::CoreResult;
use crate::model::{ChangeHandler, Model, ModelChange};
use serde_json::Value;

/// Preference namespace shared by every store.
pub const PREFS_NAMESPACE: &str = "opsync";

/// Prefix of every store's preference key.
pub const MODEL_STORE_PREFIX: &str = "MODEL_STORE_";

/// Returns the preference key for the store called `name`.
#[must_use]
pub fn storage_key(name: &str) -> String {
    format!("{MODEL_STORE_PREFIX}{name}")
}

/// Anything a [`ModelStore`] can hold.
pub trait StoreModel: Clone + Send + Sync + 'static {
    /// Key of this model within its store.
    fn model_id(&self) -> Option<String>;

    /// Serializes the model for persistence.
    fn to_json(&self) -> Value;

    /// Rebuilds a model from its persisted form.
    fn from_json(value: Value) -> CoreResult<Self>;

    /// Registers a change hook. Value types that never change in place
    /// keep the default, which registers nothing.
    fn watch(&self, _handler: ChangeHandler) -> Option<SubscriptionId> {
        None
    }

    /// Removes a hook registered by [`StoreModel::watch`].
    fn unwatch(&self, _subscription: SubscriptionId) {}
}

impl StoreModel for Model {
    fn model_id(&self) -> Option<String> {
        self.id()
    }

    fn to_json(&self) -> Value {
        Model::to_json(self)
    }

    fn from_json(value: Value) -> CoreResult<Self> {
        Model::from_json(value)
    }

    fn watch(&self, handler: ChangeHandler) -> Option<SubscriptionId> {
        Some(self.subscribe_handler(handler))
    }

    fn unwatch(&self, subscription: SubscriptionId) {
        self.unsubscribe(subscription);
    }
}

/// Events fired by a store after the mutation was persisted.
#[derive(Debug, Clone)]
pub enum StoreEvent<M> {
    /// A model was added.
    Added(M),
    /// A member changed in place.
    Updated {
        /// The member after the change.
        model: M,
        /// What changed.
        change: ModelChange,
    },
    /// A model was removed.
    Removed(M),
    /// A singleton's content was replaced wholesale.
    Replaced(M),
}

impl<M> StoreEvent<M> {
    /// Returns the model the event concerns.
    #[must_use]
    pub fn model(&self) -> &M {
        match self {
            Self::Added(m) | Self::Removed(m) | Self::Replaced(m) => m,
            Self::Updated { model, .. } => model,
        }
    }
}
