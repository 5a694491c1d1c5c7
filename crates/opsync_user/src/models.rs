//! Typed views over user-domain models.
//!
//! Each view wraps a shared [`Model`] handle; writes go straight to the
//! model and therefore notify its store.

use crate::operations::{SubscriptionStatus, SubscriptionType};
use opsync_core::{CoreResult, Model};
use serde_json::{Map, Value};

const SUBJECT_ID: &str = "subjectId";
const EXTERNAL_ID: &str = "externalId";
const ALIASES: &str = "aliases";
const TAGS: &str = "tags";
const LANGUAGE: &str = "language";
const TIMEZONE: &str = "timezone";

/// The current user's identity: subject id, external id and aliases.
#[derive(Debug, Clone)]
pub struct IdentityModel(Model);

impl IdentityModel {
    /// Wraps `model`.
    #[must_use]
    pub fn new(model: Model) -> Self {
        Self(model)
    }

    /// Returns the underlying model.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.0
    }

    /// Returns the subject id, local or backend.
    #[must_use]
    pub fn subject_id(&self) -> Option<String> {
        self.0.get(SUBJECT_ID)
    }

    /// Sets the subject id.
    pub fn set_subject_id(&self, subject_id: &str) -> CoreResult<()> {
        self.0.set(SUBJECT_ID, subject_id)
    }

    /// Returns the external id.
    #[must_use]
    pub fn external_id(&self) -> Option<String> {
        self.0.get(EXTERNAL_ID)
    }

    /// Sets or clears the external id.
    pub fn set_external_id(&self, external_id: Option<&str>) -> CoreResult<()> {
        self.0.set(EXTERNAL_ID, external_id)
    }

    /// Returns the alias for `label`.
    #[must_use]
    pub fn alias(&self, label: &str) -> Option<String> {
        self.aliases()
            .get(label)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Sets or clears the alias for `label`.
    pub fn set_alias(&self, label: &str, value: Option<&str>) -> CoreResult<()> {
        let mut aliases = self.aliases();
        match value {
            Some(value) => aliases.insert(label.to_string(), Value::String(value.to_string())),
            None => aliases.remove(label),
        };
        self.0.set(ALIASES, Value::Object(aliases))
    }

    fn aliases(&self) -> Map<String, Value> {
        match self.0.get_value(ALIASES) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// The current user's properties. Tags live in a child model so tag edits
/// bubble up as `tags.<key>` changes.
#[derive(Debug, Clone)]
pub struct PropertiesModel(Model);

impl PropertiesModel {
    /// Wraps `model`.
    #[must_use]
    pub fn new(model: Model) -> Self {
        Self(model)
    }

    /// Returns the underlying model.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.0
    }

    /// Returns the subject id these properties belong to.
    #[must_use]
    pub fn subject_id(&self) -> Option<String> {
        self.0.get(SUBJECT_ID)
    }

    /// Sets the subject id.
    pub fn set_subject_id(&self, subject_id: &str) -> CoreResult<()> {
        self.0.set(SUBJECT_ID, subject_id)
    }

    /// Returns the language.
    #[must_use]
    pub fn language(&self) -> Option<String> {
        self.0.get(LANGUAGE)
    }

    /// Sets the language.
    pub fn set_language(&self, language: &str) -> CoreResult<()> {
        self.0.set(LANGUAGE, language)
    }

    /// Returns the timezone.
    #[must_use]
    pub fn timezone(&self) -> Option<String> {
        self.0.get(TIMEZONE)
    }

    /// Sets the timezone.
    pub fn set_timezone(&self, timezone: &str) -> CoreResult<()> {
        self.0.set(TIMEZONE, timezone)
    }

    /// Returns the tags child, attaching it on first use.
    pub fn tags(&self) -> CoreResult<Model> {
        if let Some(tags) = self.0.child(TAGS) {
            return Ok(tags);
        }
        let tags = match self.0.get_value(TAGS) {
            Some(value @ Value::Object(_)) => Model::from_json(value)?,
            _ => Model::new(),
        };
        self.0.set_child(TAGS, &tags, false);
        Ok(tags)
    }

    /// Returns the tag `key`.
    pub fn tag(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(self.tags()?.get(key))
    }

    /// Sets the tag `key`.
    pub fn set_tag(&self, key: &str, value: &str) -> CoreResult<()> {
        self.tags()?.set(key, value)
    }

    /// Removes the tag `key`.
    pub fn remove_tag(&self, key: &str) -> CoreResult<()> {
        self.tags()?.remove(key, true)
    }
}

/// One subscription of the current user. The model id is the subscription id.
#[derive(Debug, Clone)]
pub struct SubscriptionModel(Model);

impl SubscriptionModel {
    /// Creates a subscription model.
    pub fn create(id: &str, subscription_type: SubscriptionType, address: &str) -> CoreResult<Self> {
        let model = Model::with_id(id);
        model.set_property("type", subscription_type, false)?;
        model.set_property("address", address, false)?;
        model.set_property("enabled", true, false)?;
        model.set_property("status", SubscriptionStatus::Subscribed, false)?;
        Ok(Self(model))
    }

    /// Wraps `model`.
    #[must_use]
    pub fn new(model: Model) -> Self {
        Self(model)
    }

    /// Returns the underlying model.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.0
    }

    /// Returns the subscription id.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.0.id()
    }

    /// Returns the delivery channel.
    #[must_use]
    pub fn subscription_type(&self) -> Option<SubscriptionType> {
        self.0.get("type")
    }

    /// Returns the push token, email address or phone number.
    #[must_use]
    pub fn address(&self) -> Option<String> {
        self.0.get("address")
    }

    /// Sets the address.
    pub fn set_address(&self, address: &str) -> CoreResult<()> {
        self.0.set("address", address)
    }

    /// Returns whether delivery is enabled.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.0.get_or("enabled", false)
    }

    /// Returns the delivery status.
    #[must_use]
    pub fn status(&self) -> SubscriptionStatus {
        self.0.get_or("status", SubscriptionStatus::Subscribed)
    }

    /// Sets enabled flag and status together.
    pub fn set_status(&self, enabled: bool, status: SubscriptionStatus) -> CoreResult<()> {
        self.0.set("enabled", enabled)?;
        self.0.set("status", status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn tag_changes_bubble_with_path() {
        let properties = PropertiesModel::new(Model::with_id("p"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        properties.model().subscribe(move |change| sink.lock().push(change.path.clone()));

        properties.set_tag("level", "3").unwrap();
        assert_eq!(properties.tag("level").unwrap().as_deref(), Some("3"));
        assert_eq!(*seen.lock(), vec!["tags.level".to_string()]);
        assert_eq!(properties.model().to_json()["tags"]["level"], "3");
    }

    #[test]
    fn tags_reattach_from_persisted_json() {
        let model = Model::from_json(serde_json::json!({"id": "p", "tags": {"a": "1"}})).unwrap();
        let properties = PropertiesModel::new(model);
        assert_eq!(properties.tag("a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn aliases_set_and_clear() {
        let identity = IdentityModel::new(Model::with_id("i"));
        identity.set_alias("crm", Some("42")).unwrap();
        assert_eq!(identity.alias("crm").as_deref(), Some("42"));
        identity.set_alias("crm", None).unwrap();
        assert_eq!(identity.alias("crm"), None);
    }

    #[test]
    fn subscription_defaults() {
        let sub = SubscriptionModel::create("local-s", SubscriptionType::Email, "a@b.c").unwrap();
        assert!(sub.enabled());
        assert_eq!(sub.status(), SubscriptionStatus::Subscribed);
        assert_eq!(sub.subscription_type(), Some(SubscriptionType::Email));
        sub.set_status(false, SubscriptionStatus::Unsubscribed).unwrap();
        assert_eq!(sub.model().to_json()["status"], "UNSUBSCRIBED");
    }
}
