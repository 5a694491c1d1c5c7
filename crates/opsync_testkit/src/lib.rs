//! # opsync Testkit
//!
//! Test utilities for opsync.
//!
//! This crate provides:
//! - Preference fixtures backed by temporary directories
//! - Executors that script backend behaviour for user operations
//! - Property-based generators for user operations using proptest
//! - A restart harness for durability tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use opsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn survives_restart() {
//!     let mut harness = RestartHarness::new();
//!     let repo = harness.open(FakeBackend::new());
//!     // ... enqueue, shut down, reopen
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod executors;
pub mod fixtures;
pub mod generators;
pub mod harness;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::executors::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
}

pub use executors::*;
pub use fixtures::*;
pub use generators::*;
pub use harness::*;
