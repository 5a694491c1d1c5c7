//! Operation kinds for users and their subscriptions.
//!
//! All kinds share the create key `{appId}.User.{subjectId}` so anything
//! queued for a user rides along with that user's creation. Modify keys
//! narrow down to the sub-resource an operation touches.

mod subscription;
mod user;

pub use subscription::{
    CreateSubscription, DeleteSubscription, SubscriptionStatus, SubscriptionType,
    TransferSubscription, UpdateSubscription,
};
pub use user::{
    CreateUser, DeleteAlias, DeleteTag, PurchaseInfo, RefreshUser, SetAlias, SetProperty, SetTag,
    TrackPurchase, TrackSessionEnd, TrackSessionStart,
};

use enum_dispatch::enum_dispatch;
use opsync_engine::{GroupComparisonType, Operation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-kind behaviour behind [`UserOperation`].
#[enum_dispatch]
pub(crate) trait OperationKind {
    fn name(&self) -> &'static str;
    fn create_comparison_key(&self) -> String;
    fn modify_comparison_key(&self) -> String;
    fn group_comparison_type(&self) -> GroupComparisonType;
    fn can_start_execute(&self) -> bool;
    fn apply_to_record_id(&self) -> String;
    fn translate_ids(&mut self, map: &HashMap<String, String>);
}

/// Every operation the user domain can enqueue.
///
/// Serialized as the payload object tagged with `name`.
#[enum_dispatch(OperationKind)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum UserOperation {
    /// Creates a user, optionally adopting an existing one.
    #[serde(rename = "create-user")]
    CreateUser(CreateUser),
    /// Reloads a user from the backend.
    #[serde(rename = "refresh-user")]
    RefreshUser(RefreshUser),
    /// Sets a tag.
    #[serde(rename = "set-tag")]
    SetTag(SetTag),
    /// Deletes a tag.
    #[serde(rename = "delete-tag")]
    DeleteTag(DeleteTag),
    /// Sets an alias.
    #[serde(rename = "set-alias")]
    SetAlias(SetAlias),
    /// Deletes an alias.
    #[serde(rename = "delete-alias")]
    DeleteAlias(DeleteAlias),
    /// Sets a top-level user property.
    #[serde(rename = "set-property")]
    SetProperty(SetProperty),
    /// Records purchases.
    #[serde(rename = "track-purchase")]
    TrackPurchase(TrackPurchase),
    /// Records a session start.
    #[serde(rename = "track-session-start")]
    TrackSessionStart(TrackSessionStart),
    /// Records a session end.
    #[serde(rename = "track-session-end")]
    TrackSessionEnd(TrackSessionEnd),
    /// Creates a subscription under a user.
    #[serde(rename = "create-subscription")]
    CreateSubscription(CreateSubscription),
    /// Updates a subscription.
    #[serde(rename = "update-subscription")]
    UpdateSubscription(UpdateSubscription),
    /// Deletes a subscription.
    #[serde(rename = "delete-subscription")]
    DeleteSubscription(DeleteSubscription),
    /// Moves a subscription to another user.
    #[serde(rename = "transfer-subscription")]
    TransferSubscription(TransferSubscription),
}

impl Operation for UserOperation {
    const NAMES: &'static [&'static str] = &[
        "create-user",
        "refresh-user",
        "set-tag",
        "delete-tag",
        "set-alias",
        "delete-alias",
        "set-property",
        "track-purchase",
        "track-session-start",
        "track-session-end",
        "create-subscription",
        "update-subscription",
        "delete-subscription",
        "transfer-subscription",
    ];

    fn name(&self) -> &str {
        OperationKind::name(self)
    }

    fn create_comparison_key(&self) -> String {
        OperationKind::create_comparison_key(self)
    }

    fn modify_comparison_key(&self) -> String {
        OperationKind::modify_comparison_key(self)
    }

    fn group_comparison_type(&self) -> GroupComparisonType {
        OperationKind::group_comparison_type(self)
    }

    fn can_start_execute(&self) -> bool {
        OperationKind::can_start_execute(self)
    }

    fn apply_to_record_id(&self) -> String {
        OperationKind::apply_to_record_id(self)
    }

    fn translate_ids(&mut self, map: &HashMap<String, String>) {
        OperationKind::translate_ids(self, map);
    }
}

impl UserOperation {
    /// Returns the user the operation targets.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        match self {
            Self::CreateUser(op) => &op.subject_id,
            Self::RefreshUser(op) => &op.subject_id,
            Self::SetTag(op) => &op.subject_id,
            Self::DeleteTag(op) => &op.subject_id,
            Self::SetAlias(op) => &op.subject_id,
            Self::DeleteAlias(op) => &op.subject_id,
            Self::SetProperty(op) => &op.subject_id,
            Self::TrackPurchase(op) => &op.subject_id,
            Self::TrackSessionStart(op) => &op.subject_id,
            Self::TrackSessionEnd(op) => &op.subject_id,
            Self::CreateSubscription(op) => &op.subject_id,
            Self::UpdateSubscription(op) => &op.subject_id,
            Self::DeleteSubscription(op) => &op.subject_id,
            Self::TransferSubscription(op) => &op.subject_id,
        }
    }
}

pub(crate) fn user_key(app_id: &str, subject_id: &str) -> String {
    format!("{app_id}.User.{subject_id}")
}

pub(crate) fn translate(id: &mut String, map: &HashMap<String, String>) {
    if let Some(backend) = map.get(id.as_str()) {
        *id = backend.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn every_name_round_trips_through_serde() {
        let samples = crate::testing::one_of_each("app", "local-u", "local-s");
        assert_eq!(samples.len(), UserOperation::NAMES.len());
        for (op, name) in samples.iter().zip(UserOperation::NAMES) {
            assert_eq!(Operation::name(op), *name);
            let json = serde_json::to_value(op).unwrap();
            assert_eq!(json["name"], json!(name));
            let back: UserOperation = serde_json::from_value(json).unwrap();
            assert_eq!(&back, op);
        }
    }

    #[test]
    fn payload_fields_are_camel_case() {
        let op = UserOperation::from(SetTag::new("app", "local-u", "level", "3"));
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"name": "set-tag", "appId": "app", "subjectId": "local-u", "key": "level", "value": "3"})
        );
    }

    #[test]
    fn shared_create_key() {
        for op in crate::testing::one_of_each("app", "u1", "s1") {
            if Operation::name(&op) == "transfer-subscription" {
                assert_eq!(Operation::create_comparison_key(&op), "app.Subscription.s1.Transfer");
            } else {
                assert_eq!(Operation::create_comparison_key(&op), "app.User.u1");
            }
            assert_eq!(
                op.subject_id(),
                "u1",
                "subject id of {}",
                Operation::name(&op)
            );
        }
    }

    proptest! {
        #[test]
        fn translated_operations_can_start(
            subject in "[a-z0-9]{1,12}",
            subscription in "[a-z0-9]{1,12}",
        ) {
            let local_subject = format!("local-{subject}");
            let local_subscription = format!("local-{subscription}");
            let map = HashMap::from([
                (local_subject.clone(), subject.clone()),
                (local_subscription.clone(), subscription.clone()),
            ]);
            for mut op in crate::testing::one_of_each("app", &local_subject, &local_subscription) {
                Operation::translate_ids(&mut op, &map);
                prop_assert!(Operation::can_start_execute(&op), "{} still blocked", Operation::name(&op));
                if Operation::name(&op) != "create-user" {
                    prop_assert_eq!(op.subject_id(), subject.as_str());
                }
            }
        }
    }
}
