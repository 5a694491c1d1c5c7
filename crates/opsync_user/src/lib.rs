//! # opsync User
//!
//! The user domain on top of the opsync engine.
//!
//! This crate provides:
//! - [`UserOperation`]: every user and subscription operation kind
//! - [`UserStores`]: the identity, properties and subscription stores
//! - Typed views ([`IdentityModel`], [`PropertiesModel`],
//!   [`SubscriptionModel`]) over the generic [`opsync_core::Model`]
//!
//! Operations address users and subscriptions by id. While an id is still
//! local the operations touching it stay queued, and every translation the
//! backend returns is applied to both queued operations and the stores.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod models;
mod operations;
mod stores;

#[cfg(test)]
mod testing;

pub use models::{IdentityModel, PropertiesModel, SubscriptionModel};
pub use operations::{
    CreateSubscription, CreateUser, DeleteAlias, DeleteSubscription, DeleteTag, PurchaseInfo,
    RefreshUser, SetAlias, SetProperty, SetTag, SubscriptionStatus, SubscriptionType,
    TrackPurchase, TrackSessionEnd, TrackSessionStart, TransferSubscription, UpdateSubscription,
    UserOperation,
};
pub use stores::{
    UserStores, CONFIG_STORE_NAME, IDENTITY_STORE_NAME, PROPERTIES_STORE_NAME,
    SUBSCRIPTION_STORE_NAME,
};
