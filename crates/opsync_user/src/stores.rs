//! The user-domain stores.

use crate::models::{IdentityModel, PropertiesModel, SubscriptionModel};
use opsync_core::{CoreResult, Model, ModelStore, SingletonStore};
use opsync_storage::PreferenceStore;
use std::collections::HashMap;
use std::sync::Arc;

/// Store name of the identity singleton.
pub const IDENTITY_STORE_NAME: &str = "identity";
/// Store name of the properties singleton.
pub const PROPERTIES_STORE_NAME: &str = "properties";
/// Store name of the subscription collection.
pub const SUBSCRIPTION_STORE_NAME: &str = "subscriptions";
/// Store name of the remote configuration singleton.
pub const CONFIG_STORE_NAME: &str = "config";

/// Every store the user domain persists.
#[derive(Debug)]
pub struct UserStores {
    /// Identity singleton.
    pub identity: SingletonStore,
    /// Properties singleton.
    pub properties: SingletonStore,
    /// Subscriptions keyed by subscription id.
    pub subscriptions: Arc<ModelStore<Model>>,
    /// Remote configuration singleton, followed by the operation repo.
    pub config: SingletonStore,
}

impl UserStores {
    /// Opens and loads all stores from `prefs`.
    pub fn open(prefs: Arc<dyn PreferenceStore>) -> CoreResult<Self> {
        Ok(Self {
            identity: SingletonStore::open(IDENTITY_STORE_NAME, prefs.clone())?,
            properties: SingletonStore::open(PROPERTIES_STORE_NAME, prefs.clone())?,
            subscriptions: ModelStore::open(SUBSCRIPTION_STORE_NAME, prefs.clone())?,
            config: SingletonStore::open(CONFIG_STORE_NAME, prefs)?,
        })
    }

    /// Creates memory-only stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            identity: SingletonStore::in_memory(IDENTITY_STORE_NAME),
            properties: SingletonStore::in_memory(PROPERTIES_STORE_NAME),
            subscriptions: ModelStore::in_memory(SUBSCRIPTION_STORE_NAME),
            config: SingletonStore::in_memory(CONFIG_STORE_NAME),
        }
    }

    /// Returns the identity view.
    #[must_use]
    pub fn identity(&self) -> IdentityModel {
        IdentityModel::new(self.identity.model())
    }

    /// Returns the properties view.
    #[must_use]
    pub fn properties(&self) -> PropertiesModel {
        PropertiesModel::new(self.properties.model())
    }

    /// Returns the subscription with `id`.
    #[must_use]
    pub fn subscription(&self, id: &str) -> Option<SubscriptionModel> {
        self.subscriptions.get(id).map(SubscriptionModel::new)
    }

    /// Adds a subscription.
    pub fn add_subscription(&self, subscription: &SubscriptionModel) -> CoreResult<()> {
        self.subscriptions.add(subscription.model().clone(), true)
    }

    /// Rewrites local ids held by the stores. Returns the number of rewrites.
    ///
    /// Subscription members are re-keyed in place; their order is kept.
    pub fn apply_translations(&self, map: &HashMap<String, String>) -> CoreResult<usize> {
        let mut rewritten = 0;

        for view in [self.identity.model(), self.properties.model()] {
            let subject: Option<String> = view.get("subjectId");
            if let Some(backend) = subject.and_then(|id| map.get(&id)) {
                view.set("subjectId", backend)?;
                rewritten += 1;
            }
        }

        let members = self.subscriptions.list();
        if members
            .iter()
            .any(|m| m.id().is_some_and(|id| map.contains_key(&id)))
        {
            let mut renamed = Vec::with_capacity(members.len());
            for member in members {
                match member.id().and_then(|id| map.get(&id)) {
                    Some(backend) => {
                        let copy = Model::from_json(member.to_json())?;
                        copy.set_id(backend)?;
                        renamed.push(copy);
                        rewritten += 1;
                    }
                    None => renamed.push(member),
                }
            }
            self.subscriptions.replace_all(renamed, true)?;
        }

        if rewritten > 0 {
            tracing::debug!(rewritten, "applied translations to user stores");
        }
        Ok(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::SubscriptionType;
    use opsync_storage::InMemoryPreferences;

    #[test]
    fn translations_rewrite_subject_and_subscriptions() {
        let stores = UserStores::in_memory();
        stores.identity().set_subject_id("local-u").unwrap();
        stores.properties().set_subject_id("local-u").unwrap();
        let a = SubscriptionModel::create("local-a", SubscriptionType::Push, "t").unwrap();
        let b = SubscriptionModel::create("b", SubscriptionType::Email, "e").unwrap();
        stores.add_subscription(&a).unwrap();
        stores.add_subscription(&b).unwrap();

        let map = HashMap::from([
            ("local-u".to_string(), "u".to_string()),
            ("local-a".to_string(), "a".to_string()),
        ]);
        assert_eq!(stores.apply_translations(&map).unwrap(), 3);
        assert_eq!(stores.identity().subject_id().as_deref(), Some("u"));
        assert_eq!(stores.properties().subject_id().as_deref(), Some("u"));
        assert_eq!(stores.subscriptions.ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(stores.subscription("a").unwrap().address().as_deref(), Some("t"));

        assert_eq!(stores.apply_translations(&map).unwrap(), 0);
    }

    #[test]
    fn stores_reload_from_prefs() {
        let prefs: Arc<dyn PreferenceStore> = Arc::new(InMemoryPreferences::new());
        {
            let stores = UserStores::open(prefs.clone()).unwrap();
            stores.identity().set_external_id(Some("bob")).unwrap();
            stores.properties().set_tag("level", "3").unwrap();
        }
        let stores = UserStores::open(prefs).unwrap();
        assert_eq!(stores.identity().external_id().as_deref(), Some("bob"));
        assert_eq!(stores.properties().tag("level").unwrap().as_deref(), Some("3"));
    }
}
