//! Subscription-level operation kinds.

use super::{translate, user_key, OperationKind};
use opsync_core::is_local_id;
use opsync_engine::GroupComparisonType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Delivery channel of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionType {
    /// Device push token.
    Push,
    /// Email address.
    Email,
    /// Phone number.
    Sms,
}

/// Delivery status reported for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// Deliverable.
    #[default]
    Subscribed,
    /// Opted out.
    Unsubscribed,
    /// The platform denied permission.
    NoPermission,
    /// Token or address could not be obtained.
    Errored,
}

fn subscription_key(app_id: &str, subject_id: &str, subscription_id: &str) -> String {
    format!(
        "{}.Subscription.{subscription_id}",
        user_key(app_id, subject_id)
    )
}

/// Fields shared by create and update.
macro_rules! subscription_payload {
    ($(#[$meta:meta])* $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $kind {
            /// Application id.
            pub app_id: String,
            /// Owning user.
            pub subject_id: String,
            /// Subscription id, local until created.
            pub subscription_id: String,
            /// Delivery channel.
            #[serde(rename = "type")]
            pub subscription_type: SubscriptionType,
            /// Whether delivery is enabled.
            pub enabled: bool,
            /// Push token, email address or phone number.
            pub address: String,
            /// Delivery status.
            #[serde(default)]
            pub status: SubscriptionStatus,
        }

        impl $kind {
            /// Creates an enabled, subscribed payload.
            pub fn new(
                app_id: &str,
                subject_id: &str,
                subscription_id: &str,
                subscription_type: SubscriptionType,
                address: &str,
            ) -> Self {
                Self {
                    app_id: app_id.into(),
                    subject_id: subject_id.into(),
                    subscription_id: subscription_id.into(),
                    subscription_type,
                    enabled: true,
                    address: address.into(),
                    status: SubscriptionStatus::Subscribed,
                }
            }

            /// Sets enabled flag and status.
            #[must_use]
            pub fn with_status(mut self, enabled: bool, status: SubscriptionStatus) -> Self {
                self.enabled = enabled;
                self.status = status;
                self
            }
        }
    };
}

subscription_payload!(
    /// Creates a subscription under a user.
    CreateSubscription
);

subscription_payload!(
    /// Updates an existing subscription.
    UpdateSubscription
);

impl OperationKind for CreateSubscription {
    fn name(&self) -> &'static str {
        "create-subscription"
    }

    fn create_comparison_key(&self) -> String {
        user_key(&self.app_id, &self.subject_id)
    }

    fn modify_comparison_key(&self) -> String {
        subscription_key(&self.app_id, &self.subject_id, &self.subscription_id)
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
        translate(&mut self.subscription_id, map);
    }
}

impl OperationKind for UpdateSubscription {
    fn name(&self) -> &'static str {
        "update-subscription"
    }

    fn create_comparison_key(&self) -> String {
        user_key(&self.app_id, &self.subject_id)
    }

    fn modify_comparison_key(&self) -> String {
        subscription_key(&self.app_id, &self.subject_id, &self.subscription_id)
    }

    fn group_comparison_type(&self) -> GroupComparisonType {
        GroupComparisonType::Alter
    }

    fn can_start_execute(&self) -> bool {
        !is_local_id(&self.subject_id) && !is_local_id(&self.subscription_id)
    }

    fn apply_to_record_id(&self) -> String {
        self.subscription_id.clone()
    }

    fn translate_ids(&mut self, map: &HashMap<String, String>) {
        translate(&mut self.subject_id, map);
        translate(&mut self.subscription_id, map);
    }
}

/// Deletes a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSubscription {
    /// Application id.
    pub app_id: String,
    /// Owning user.
    pub subject_id: String,
    /// Subscription to delete.
    pub subscription_id: String,
}

impl DeleteSubscription {
    /// Creates a deletion.
    pub fn new(app_id: &str, subject_id: &str, subscription_id: &str) -> Self {
        Self {
            app_id: app_id.into(),
            subject_id: subject_id.into(),
            subscription_id: subscription_id.into(),
        }
    }
}

impl OperationKind for DeleteSubscription {
    fn name(&self) -> &'static str {
        "delete-subscription"
    }

    fn create_comparison_key(&self) -> String {
        user_key(&self.app_id, &self.subject_id)
    }

    fn modify_comparison_key(&self) -> String {
        subscription_key(&self.app_id, &self.subject_id, &self.subscription_id)
    }

    fn group_comparison_type(&self) -> GroupComparisonType {
        GroupComparisonType::None
    }

    fn can_start_execute(&self) -> bool {
        !is_local_id(&self.subject_id) && !is_local_id(&self.subscription_id)
    }

    fn apply_to_record_id(&self) -> String {
        self.subscription_id.clone()
    }

    fn translate_ids(&mut self, map: &HashMap<String, String>) {
        translate(&mut self.subject_id, map);
        translate(&mut self.subscription_id, map);
    }
}

/// Moves a subscription to another user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSubscription {
    /// Application id.
    pub app_id: String,
    /// Subscription being moved.
    pub subscription_id: String,
    /// New owner.
    pub subject_id: String,
}

impl TransferSubscription {
    /// Creates a transfer of `subscription_id` to `subject_id`.
    pub fn new(app_id: &str, subscription_id: &str, subject_id: &str) -> Self {
        Self {
            app_id: app_id.into(),
            subscription_id: subscription_id.into(),
            subject_id: subject_id.into(),
        }
    }

    fn key(&self) -> String {
        format!("{}.Subscription.{}.Transfer", self.app_id, self.subscription_id)
    }
}

impl OperationKind for TransferSubscription {
    fn name(&self) -> &'static str {
        "transfer-subscription"
    }

    fn create_comparison_key(&self) -> String {
        self.key()
    }

    fn modify_comparison_key(&self) -> String {
        self.key()
    }

    fn group_comparison_type(&self) -> GroupComparisonType {
        GroupComparisonType::None
    }

    fn can_start_execute(&self) -> bool {
        !is_local_id(&self.subject_id) && !is_local_id(&self.subscription_id)
    }

    fn apply_to_record_id(&self) -> String {
        self.subscription_id.clone()
    }

    fn translate_ids(&mut self, map: &HashMap<String, String>) {
        translate(&mut self.subject_id, map);
        translate(&mut self.subscription_id, map);
    }
}
