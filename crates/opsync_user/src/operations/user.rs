//! User-level operation kinds.

use super::{translate, user_key, OperationKind};
use opsync_core::is_local_id;
use opsync_engine::GroupComparisonType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Creates a user on the backend.
///
/// When `existing_subject_id` is set, the new identity is attached to that
/// user instead, so the operation waits until it is backend-confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    /// Application id.
    pub app_id: String,
    /// Local id of the user being created.
    pub subject_id: String,
    /// Caller-supplied external id, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// User to adopt, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_subject_id: Option<String>,
}

impl CreateUser {
    /// Creates a plain create.
    pub fn new(app_id: &str, subject_id: &str) -> Self {
        Self {
            app_id: app_id.into(),
            subject_id: subject_id.into(),
            external_id: None,
            existing_subject_id: None,
        }
    }

    /// Sets the external id.
    #[must_use]
    pub fn with_external_id(mut self, external_id: &str) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Adopts an existing user.
    #[must_use]
    pub fn with_existing_subject(mut self, existing_subject_id: &str) -> Self {
        self.existing_subject_id = Some(existing_subject_id.into());
        self
    }
}

impl OperationKind for CreateUser {
    fn name(&self) -> &'static str {
        "create-user"
    }

    fn create_comparison_key(&self) -> String {
        user_key(&self.app_id, &self.subject_id)
    }

    fn modify_comparison_key(&self) -> String {
        String::new()
    }

    fn group_comparison_type(&self) -> GroupComparisonType {
        GroupComparisonType::Create
    }

    fn can_start_execute(&self) -> bool {
        self.existing_subject_id
            .as_deref()
            .map_or(true, |existing| !is_local_id(existing))
    }

    fn apply_to_record_id(&self) -> String {
        self.existing_subject_id
            .clone()
            .unwrap_or_else(|| self.subject_id.clone())
    }

    fn translate_ids(&mut self, map: &HashMap<String, String>) {
        if let Some(existing) = &mut self.existing_subject_id {
            translate(existing, map);
        }
    }
}

/// Reloads a user from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshUser {
    /// Application id.
    pub app_id: String,
    /// User id.
    pub subject_id: String,
}

impl RefreshUser {
    /// Creates a refresh.
    pub fn new(app_id: &str, subject_id: &str) -> Self {
        Self {
            app_id: app_id.into(),
            subject_id: subject_id.into(),
        }
    }
}

impl OperationKind for RefreshUser {
    fn name(&self) -> &'static str {
        "refresh-user"
    }

    fn create_comparison_key(&self) -> String {
        user_key(&self.app_id, &self.subject_id)
    }

    fn modify_comparison_key(&self) -> String {
        user_key(&self.app_id, &self.subject_id)
    }

    fn group_comparison_type(&self) -> GroupComparisonType {
        GroupComparisonType::Create
    }

    fn can_start_execute(&self) -> bool {
        !is_local_id(&self.subject_id)
    }

    fn apply_to_record_id(&self) -> String {
        self.subject_id.clone()
    }

    fn translate_ids(&mut self, map: &HashMap<String, String>) {
        translate(&mut self.subject_id, map);
    }
}

/// Implements [`OperationKind`] for an ALTER operation on the user record.
macro_rules! user_alter_kind {
    ($kind:ty, $name:literal, |$op:ident| $modify_key:expr) => {
        impl OperationKind for $kind {
            fn name(&self) -> &'static str {
                $name
            }

            fn create_comparison_key(&self) -> String {
                user_key(&self.app_id, &self.subject_id)
            }

            fn modify_comparison_key(&self) -> String {
                let $op = self;
                $modify_key
            }

            fn group_comparison_type(&self) -> GroupComparisonType {
                GroupComparisonType::Alter
            }

            fn can_start_execute(&self) -> bool {
                !is_local_id(&self.subject_id)
            }

            fn apply_to_record_id(&self) -> String {
                self.subject_id.clone()
            }

            fn translate_ids(&mut self, map: &HashMap<String, String>) {
                translate(&mut self.subject_id, map);
            }
        }
    };
}

/// Sets a tag on a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTag {
    /// Application id.
    pub app_id: String,
    /// User id.
    pub subject_id: String,
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

impl SetTag {
    /// Creates a tag update.
    pub fn new(app_id: &str, subject_id: &str, key: &str, value: &str) -> Self {
        Self {
            app_id: app_id.into(),
            subject_id: subject_id.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

user_alter_kind!(SetTag, "set-tag", |op| user_key(&op.app_id, &op.subject_id));

/// Deletes a tag from a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTag {
    /// Application id.
    pub app_id: String,
    /// User id.
    pub subject_id: String,
    /// Tag key.
    pub key: String,
}

impl DeleteTag {
    /// Creates a tag deletion.
    pub fn new(app_id: &str, subject_id: &str, key: &str) -> Self {
        Self {
            app_id: app_id.into(),
            subject_id: subject_id.into(),
            key: key.into(),
        }
    }
}

user_alter_kind!(DeleteTag, "delete-tag", |op| user_key(&op.app_id, &op.subject_id));

/// Sets an alias on a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAlias {
    /// Application id.
    pub app_id: String,
    /// User id.
    pub subject_id: String,
    /// Alias label.
    pub label: String,
    /// Alias value.
    pub value: String,
}

impl SetAlias {
    /// Creates an alias update.
    pub fn new(app_id: &str, subject_id: &str, label: &str, value: &str) -> Self {
        Self {
            app_id: app_id.into(),
            subject_id: subject_id.into(),
            label: label.into(),
            value: value.into(),
        }
    }
}

user_alter_kind!(SetAlias, "set-alias", |op| format!(
    "{}.Alias.{}",
    user_key(&op.app_id, &op.subject_id),
    op.label
));

/// Deletes an alias from a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAlias {
    /// Application id.
    pub app_id: String,
    /// User id.
    pub subject_id: String,
    /// Alias label.
    pub label: String,
}

impl DeleteAlias {
    /// Creates an alias deletion.
    pub fn new(app_id: &str, subject_id: &str, label: &str) -> Self {
        Self {
            app_id: app_id.into(),
            subject_id: subject_id.into(),
            label: label.into(),
        }
    }
}

user_alter_kind!(DeleteAlias, "delete-alias", |op| format!(
    "{}.Alias.{}",
    user_key(&op.app_id, &op.subject_id),
    op.label
));

/// Sets a top-level property such as language or timezone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetProperty {
    /// Application id.
    pub app_id: String,
    /// User id.
    pub subject_id: String,
    /// Property name.
    pub property: String,
    /// New value; `null` clears the property.
    pub value: Value,
}

impl SetProperty {
    /// Creates a property update.
    pub fn new(app_id: &str, subject_id: &str, property: &str, value: Value) -> Self {
        Self {
            app_id: app_id.into(),
            subject_id: subject_id.into(),
            property: property.into(),
            value,
        }
    }
}

user_alter_kind!(SetProperty, "set-property", |op| user_key(&op.app_id, &op.subject_id));

/// One purchased item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseInfo {
    /// Product SKU.
    pub sku: String,
    /// ISO currency code.
    pub iso: String,
    /// Price paid.
    pub amount: Decimal,
}

/// Records purchases made by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPurchase {
    /// Application id.
    pub app_id: String,
    /// User id.
    pub subject_id: String,
    /// Whether purchases restored on a new install count as existing.
    pub treat_new_as_existing: bool,
    /// Total spent across `purchases`.
    pub amount_spent: Decimal,
    /// Individual purchases.
    pub purchases: Vec<PurchaseInfo>,
}

impl TrackPurchase {
    /// Creates a purchase record; the total is the sum of `purchases`.
    pub fn new(app_id: &str, subject_id: &str, purchases: Vec<PurchaseInfo>) -> Self {
        Self {
            app_id: app_id.into(),
            subject_id: subject_id.into(),
            treat_new_as_existing: false,
            amount_spent: purchases.iter().map(|p| p.amount).sum(),
            purchases,
        }
    }
}

user_alter_kind!(TrackPurchase, "track-purchase", |op| user_key(&op.app_id, &op.subject_id));

/// Records that a session started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSessionStart {
    /// Application id.
    pub app_id: String,
    /// User id.
    pub subject_id: String,
}

impl TrackSessionStart {
    /// Creates a session start.
    pub fn new(app_id: &str, subject_id: &str) -> Self {
        Self {
            app_id: app_id.into(),
            subject_id: subject_id.into(),
        }
    }
}

user_alter_kind!(TrackSessionStart, "track-session-start", |op| user_key(
    &op.app_id,
    &op.subject_id
));

/// Records that a session ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSessionEnd {
    /// Application id.
    pub app_id: String,
    /// User id.
    pub subject_id: String,
    /// Session length in seconds.
    pub session_time: u64,
}

impl TrackSessionEnd {
    /// Creates a session end.
    pub fn new(app_id: &str, subject_id: &str, session_time: u64) -> Self {
        Self {
            app_id: app_id.into(),
            subject_id: subject_id.into(),
            session_time,
        }
    }
}

user_alter_kind!(TrackSessionEnd, "track-session-end", |op| user_key(
    &op.app_id,
    &op.subject_id
));

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn map(local: &str, backend: &str) -> HashMap<String, String> {
        HashMap::from([(local.to_string(), backend.to_string())])
    }

    #[test]
    fn create_user_waits_for_existing_subject() {
        let plain = CreateUser::new("app", "local-1");
        assert!(plain.can_start_execute());
        assert_eq!(plain.apply_to_record_id(), "local-1");
        assert_eq!(plain.modify_comparison_key(), "");

        let mut adopting = CreateUser::new("app", "local-2").with_existing_subject("local-1");
        assert!(!adopting.can_start_execute());
        adopting.translate_ids(&map("local-1", "backend-1"));
        assert!(adopting.can_start_execute());
        assert_eq!(adopting.apply_to_record_id(), "backend-1");
        assert_eq!(adopting.subject_id, "local-2");
    }

    #[test]
    fn alias_keys_include_label() {
        let op = SetAlias::new("app", "u", "external_id", "bob");
        assert_eq!(op.modify_comparison_key(), "app.User.u.Alias.external_id");
        assert_eq!(op.create_comparison_key(), "app.User.u");
        assert_eq!(
            DeleteAlias::new("app", "u", "external_id").modify_comparison_key(),
            op.modify_comparison_key()
        );
    }

    #[test]
    fn tags_block_until_translated() {
        let mut op = SetTag::new("app", "local-u", "k", "v");
        assert!(!op.can_start_execute());
        op.translate_ids(&map("local-u", "backend-u"));
        assert!(op.can_start_execute());
        assert_eq!(op.modify_comparison_key(), "app.User.backend-u");
    }

    #[test]
    fn purchase_total_is_summed() {
        let op = TrackPurchase::new(
            "app",
            "u",
            vec![
                PurchaseInfo {
                    sku: "a".into(),
                    iso: "USD".into(),
                    amount: Decimal::from_str("1.10").unwrap(),
                },
                PurchaseInfo {
                    sku: "b".into(),
                    iso: "USD".into(),
                    amount: Decimal::from_str("2.25").unwrap(),
                },
            ],
        );
        assert_eq!(op.amount_spent, Decimal::from_str("3.35").unwrap());
        assert_eq!(op.group_comparison_type(), GroupComparisonType::Alter);
    }
}
