//! # opsync Engine
//!
//! The operation repo: a persistent local write queue that batches,
//! executes, retries and translates ids for operations against a backend.
//!
//! This crate provides:
//! - [`Operation`]: the contract every operation kind implements
//! - [`OperationExecutor`]: the pluggable per-kind network handler
//! - [`OperationRepo`]: the queue and its single background worker
//! - [`RepoConfig`] / [`SharedConfig`]: live timing configuration
//! - [`NewRecordsState`]: post-create cool-down tracking
//!
//! ## Key Invariants
//!
//! - Enqueued operations are persisted before `enqueue` returns
//! - At most one batch is in flight at any time
//! - Blocked operations are parked, never failed
//! - Translated ids reach every pending operation before it runs again

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod executor;
mod new_records;
mod operation;
mod queue;
mod repo;

#[cfg(test)]
mod test_support;

pub use config::{
    RepoConfig, SharedConfig, EXECUTION_INTERVAL_KEY, FAIL_RETRY_BACKOFF_KEY,
    POST_CREATE_DELAY_KEY, POST_CREATE_RETRY_WINDOW_KEY, POST_WAKE_DELAY_KEY,
};
pub use error::{EngineError, EngineResult};
pub use executor::{
    ExecutionResponse, ExecutionResult, ExecutorError, MockExecutor, OperationExecutor,
};
pub use new_records::NewRecordsState;
pub use operation::{
    GroupComparisonType, Operation, OperationStore, QueuedOperation, OPERATION_STORE_NAME,
};
pub use repo::{OperationRepo, RepoBuilder, RepoState, RepoStats};
