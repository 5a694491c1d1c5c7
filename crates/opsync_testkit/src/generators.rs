//! Property-based test generators using proptest.

use opsync_user::{
    CreateSubscription, CreateUser, DeleteAlias, DeleteSubscription, DeleteTag, PurchaseInfo,
    RefreshUser, SetAlias, SetProperty, SetTag, SubscriptionType, TrackPurchase, TrackSessionEnd,
    TrackSessionStart, TransferSubscription, UpdateSubscription, UserOperation,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Application id used by generated operations.
pub const TEST_APP_ID: &str = "app";

/// Strategy for local ids.
pub fn local_id_strategy() -> impl Strategy<Value = String> {
    "[a-f0-9]{8}".prop_map(|s| format!("local-{s}"))
}

/// Strategy for backend ids.
pub fn backend_id_strategy() -> impl Strategy<Value = String> {
    "[a-f0-9]{8}".prop_map(|s| format!("backend-{s}"))
}

/// Strategy for a user or subscription id, local or backend.
pub fn record_id_strategy() -> impl Strategy<Value = String> {
    prop_oneof![local_id_strategy(), backend_id_strategy()]
}

fn label() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

fn subscription_type() -> impl Strategy<Value = SubscriptionType> {
    prop_oneof![
        Just(SubscriptionType::Push),
        Just(SubscriptionType::Email),
        Just(SubscriptionType::Sms),
    ]
}

fn purchase() -> impl Strategy<Value = PurchaseInfo> {
    (label(), 0i64..100_000).prop_map(|(sku, cents)| PurchaseInfo {
        sku,
        iso: "USD".into(),
        amount: Decimal::new(cents, 2),
    })
}

/// Strategy for one user operation on `subject`.
pub fn user_operation_strategy(subject: String) -> impl Strategy<Value = UserOperation> {
    let s = subject;
    let app = TEST_APP_ID;
    prop_oneof![
        Just(UserOperation::from(CreateUser::new(app, &s))),
        Just(UserOperation::from(RefreshUser::new(app, &s))),
        (label(), label()).prop_map({
            let s = s.clone();
            move |(k, v)| UserOperation::from(SetTag::new(app, &s, &k, &v))
        }),
        label().prop_map({
            let s = s.clone();
            move |k| UserOperation::from(DeleteTag::new(app, &s, &k))
        }),
        (label(), label()).prop_map({
            let s = s.clone();
            move |(l, v)| UserOperation::from(SetAlias::new(app, &s, &l, &v))
        }),
        label().prop_map({
            let s = s.clone();
            move |l| UserOperation::from(DeleteAlias::new(app, &s, &l))
        }),
        label().prop_map({
            let s = s.clone();
            move |lang| {
                UserOperation::from(SetProperty::new(app, &s, "language", serde_json::json!(lang)))
            }
        }),
        prop::collection::vec(purchase(), 1..3).prop_map({
            let s = s.clone();
            move |purchases| UserOperation::from(TrackPurchase::new(app, &s, purchases))
        }),
        Just(UserOperation::from(TrackSessionStart::new(app, &s))),
        (0u64..86_400).prop_map({
            let s = s.clone();
            move |secs| UserOperation::from(TrackSessionEnd::new(app, &s, secs))
        }),
        (record_id_strategy(), subscription_type(), label()).prop_map({
            let s = s.clone();
            move |(sub, kind, address)| {
                UserOperation::from(CreateSubscription::new(app, &s, &sub, kind, &address))
            }
        }),
        (record_id_strategy(), subscription_type(), label()).prop_map({
            let s = s.clone();
            move |(sub, kind, address)| {
                UserOperation::from(UpdateSubscription::new(app, &s, &sub, kind, &address))
            }
        }),
        record_id_strategy().prop_map({
            let s = s.clone();
            move |sub| UserOperation::from(DeleteSubscription::new(app, &s, &sub))
        }),
        record_id_strategy()
            .prop_map(move |sub| UserOperation::from(TransferSubscription::new(app, &sub, &s))),
    ]
}

/// Strategy for a sequence of operations over a few users.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<UserOperation>> {
    prop::collection::vec(
        record_id_strategy().prop_flat_map(user_operation_strategy),
        min_ops..max_ops,
    )
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsync_engine::Operation;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn generated_operations_survive_json(ops in operation_sequence_strategy(1, 8)) {
            for op in ops {
                let json = serde_json::to_value(&op).unwrap();
                prop_assert_eq!(json["name"].as_str(), Some(op.name()));
                let back: UserOperation = serde_json::from_value(json).unwrap();
                prop_assert_eq!(back, op);
            }
        }
    }
}
