//! Shared helpers for engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use opsync_core::is_local_id;
use opsync_engine::{
    ExecutionResponse, ExecutorError, GroupComparisonType, MockExecutor, Operation,
    OperationExecutor, OperationRepo, OperationStore, RepoConfig, SharedConfig,
    OPERATION_STORE_NAME,
};
use opsync_storage::{InMemoryPreferences, PreferenceStore, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum TestOp {
    Create { record: String },
    Alter { record: String, seq: u32 },
    Solo { record: String, seq: u32 },
}

impl TestOp {
    pub fn create(record: &str) -> Self {
        Self::Create {
            record: record.into(),
        }
    }

    pub fn alter(record: &str, seq: u32) -> Self {
        Self::Alter {
            record: record.into(),
            seq,
        }
    }

    pub fn solo(record: &str, seq: u32) -> Self {
        Self::Solo {
            record: record.into(),
            seq,
        }
    }

    fn record_mut(&mut self) -> &mut String {
        match self {
            Self::Create { record } | Self::Alter { record, .. } | Self::Solo { record, .. } => {
                record
            }
        }
    }

    pub fn record(&self) -> &str {
        match self {
            Self::Create { record } | Self::Alter { record, .. } | Self::Solo { record, .. } => {
                record
            }
        }
    }
}

impl Operation for TestOp {
    const NAMES: &'static [&'static str] = &["create", "alter", "solo"];

    fn name(&self) -> &str {
        match self {
            Self::Create { .. } => "create",
            Self::Alter { .. } => "alter",
            Self::Solo { .. } => "solo",
        }
    }

    fn create_comparison_key(&self) -> String {
        format!("app.Record.{}", self.record())
    }

    fn modify_comparison_key(&self) -> String {
        match self {
            Self::Create { .. } => String::new(),
            _ => format!("app.Record.{}", self.record()),
        }
    }

    fn group_comparison_type(&self) -> GroupComparisonType {
        match self {
            Self::Create { .. } => GroupComparisonType::Create,
            Self::Alter { .. } => GroupComparisonType::Alter,
            Self::Solo { .. } => GroupComparisonType::None,
        }
    }

    fn can_start_execute(&self) -> bool {
        matches!(self, Self::Create { .. }) || !is_local_id(self.record())
    }

    fn apply_to_record_id(&self) -> String {
        self.record().to_string()
    }

    fn translate_ids(&mut self, map: &HashMap<String, String>) {
        let record = self.record_mut();
        if let Some(backend) = map.get(record.as_str()) {
            *record = backend.clone();
        }
    }
}

/// Timings small enough for paused-clock tests.
pub fn fast_config() -> RepoConfig {
    RepoConfig::new()
        .with_execution_interval(Duration::from_millis(10))
        .with_post_wake_delay(Duration::from_millis(1))
        .with_post_create_delay(Duration::from_millis(500))
        .with_fail_retry_backoff(Duration::from_secs(1))
        .with_post_create_retry_window(Duration::from_secs(10))
}

pub fn mock() -> Arc<MockExecutor<TestOp>> {
    Arc::new(MockExecutor::new(TestOp::NAMES))
}

pub fn repo_with(
    prefs: Arc<dyn PreferenceStore>,
    executor: Arc<dyn OperationExecutor<TestOp>>,
    config: RepoConfig,
) -> OperationRepo<TestOp> {
    let store = OperationStore::<TestOp>::open(OPERATION_STORE_NAME, prefs).unwrap();
    OperationRepo::new(store, vec![executor], SharedConfig::new(config), Handle::current())
        .unwrap()
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

/// Panics on the first call, then succeeds.
#[derive(Default)]
pub struct PanicOnceExecutor {
    calls: AtomicUsize,
}

impl PanicOnceExecutor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperationExecutor<TestOp> for PanicOnceExecutor {
    fn operations(&self) -> Vec<String> {
        TestOp::NAMES.iter().map(|n| (*n).to_string()).collect()
    }

    async fn execute(
        &self,
        _operations: Vec<TestOp>,
    ) -> Result<ExecutionResponse<TestOp>, ExecutorError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("executor blew up");
        }
        Ok(ExecutionResponse::success())
    }
}

/// In-memory preferences whose next `failures` writes fail.
pub struct FlakyPrefs {
    inner: InMemoryPreferences,
    failures: Mutex<usize>,
}

impl FlakyPrefs {
    pub fn failing(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryPreferences::new(),
            failures: Mutex::new(failures),
        })
    }
}

impl PreferenceStore for FlakyPrefs {
    fn get_string(&self, namespace: &str, key: &str) -> StorageResult<Option<String>> {
        self.inner.get_string(namespace, key)
    }

    fn save_string(&self, namespace: &str, key: &str, value: &str) -> StorageResult<()> {
        let mut failures = self.failures.lock();
        if *failures > 0 {
            *failures -= 1;
            return Err(std::io::Error::other("disk full").into());
        }
        self.inner.save_string(namespace, key, value)
    }

    fn remove(&self, namespace: &str, key: &str) -> StorageResult<()> {
        self.inner.remove(namespace, key)
    }

    fn keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        self.inner.keys(namespace)
    }
}
