use crate::operations::*;
use rust_decimal::Decimal;

/// One operation of every kind, in `UserOperation::NAMES` order.
pub(crate) fn one_of_each(app: &str, subject: &str, subscription: &str) -> Vec<UserOperation> {
    vec![
        CreateUser::new(app, subject).with_external_id("ext").into(),
        RefreshUser::new(app, subject).into(),
        SetTag::new(app, subject, "level", "3").into(),
        DeleteTag::new(app, subject, "level").into(),
        SetAlias::new(app, subject, "crm", "42").into(),
        DeleteAlias::new(app, subject, "crm").into(),
        SetProperty::new(app, subject, "language", serde_json::json!("en")).into(),
        TrackPurchase::new(
            app,
            subject,
            vec![PurchaseInfo {
                sku: "gems".into(),
                iso: "USD".into(),
                amount: Decimal::new(499, 2),
            }],
        )
        .into(),
        TrackSessionStart::new(app, subject).into(),
        TrackSessionEnd::new(app, subject, 60).into(),
        CreateSubscription::new(app, subject, subscription, SubscriptionType::Push, "token").into(),
        UpdateSubscription::new(app, subject, subscription, SubscriptionType::Push, "token2")
            .into(),
        DeleteSubscription::new(app, subject, subscription).into(),
        TransferSubscription::new(app, subscription, subject).into(),
    ]
}
