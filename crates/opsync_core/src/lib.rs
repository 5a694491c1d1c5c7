//! # opsync Core
//!
//! Local state primitives for opsync.
//!
//! This crate provides:
//! - [`Model`]: an observable property bag with JSON persistence
//! - [`ChangeFeed`]: synchronous callback fan-out used by models and stores
//! - [`ModelStore`]: a keyed, persisted collection of models
//! - [`SingletonStore`]: a store that always holds exactly one model
//! - [`IdTranslator`]: local id minting and local → backend id translation
//!
//! ## Key Invariants
//!
//! - Every store mutation is persisted before any event is fired
//! - Model notifications are synchronous and bubble child → parent
//! - Local ids always start with [`LOCAL_ID_PREFIX`]
//! - Translations are append-only for the life of the process

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod error;
mod id;
mod model;
mod store;

pub use change_feed::{ChangeFeed, Handler, SubscriptionId};
pub use error::{CoreError, CoreResult};
pub use id::{create_local_id, is_local_id, IdTranslator, LOCAL_ID_PREFIX};
pub use model::{ChangeHandler, Model, ModelChange};
pub use store::{
    storage_key, ModelStore, SingletonStore, StoreEvent, StoreModel, MODEL_STORE_PREFIX,
    PREFS_NAMESPACE, SINGLETON_ID,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
