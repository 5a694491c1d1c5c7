//! # opsync Storage
//!
//! Preference storage trait and implementations for opsync.
//!
//! This crate provides the lowest-level persistence abstraction used by the
//! model stores and the operation queue. Backends are **opaque string
//! stores**: they map `(namespace, key)` pairs to string values and do not
//! interpret what they hold.
//!
//! ## Design Principles
//!
//! - A write is durable once `save_string` returns
//! - No knowledge of model stores, operations, or JSON shapes
//! - Must be `Send + Sync` so stores can be shared with the background worker
//!
//! ## Available Backends
//!
//! - [`InMemoryPreferences`] - For testing and ephemeral state
//! - [`FilePreferences`] - One JSON document per namespace in a directory
//!
//! ## Example
//!
//! ```rust
//! use opsync_storage::{InMemoryPreferences, PreferenceStore};
//!
//! let prefs = InMemoryPreferences::new();
//! prefs.save_string("opsync", "greeting", "hello").unwrap();
//! assert_eq!(prefs.get_string("opsync", "greeting").unwrap().as_deref(), Some("hello"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::PreferenceStore;
pub use error::{StorageError, StorageResult};
pub use file::FilePreferences;
pub use memory::InMemoryPreferences;
