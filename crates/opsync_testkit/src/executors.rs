//! Executors that stand in for the backend.

use async_trait::async_trait;
use opsync_core::is_local_id;
use opsync_engine::{ExecutionResponse, ExecutorError, Operation, OperationExecutor};
use opsync_user::UserOperation;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A backend that accepts every user operation.
///
/// Creates mint backend ids (`user-<n>`, `sub-<n>`) for the local ids they
/// carry and return them as translations. While offline every call fails
/// with a retryable network error.
#[derive(Default)]
pub struct FakeBackend {
    next_id: AtomicU64,
    offline: AtomicBool,
    batches: Mutex<Vec<Vec<UserOperation>>>,
    assigned: Mutex<HashMap<String, String>>,
}

impl FakeBackend {
    /// Creates an online backend.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Switches the backend off or on.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns every batch accepted so far.
    pub fn batches(&self) -> Vec<Vec<UserOperation>> {
        self.batches.lock().clone()
    }

    /// Returns every operation accepted so far, flattened.
    pub fn accepted(&self) -> Vec<UserOperation> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    /// Returns the backend id assigned to `local_id`.
    pub fn backend_id(&self, local_id: &str) -> Option<String> {
        self.assigned.lock().get(local_id).cloned()
    }

    fn mint(&self, prefix: &str, local_id: &str, out: &mut HashMap<String, String>) {
        if !is_local_id(local_id) || out.contains_key(local_id) {
            return;
        }
        let id = format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.assigned.lock().insert(local_id.to_string(), id.clone());
        out.insert(local_id.to_string(), id);
    }
}

#[async_trait]
impl OperationExecutor<UserOperation> for FakeBackend {
    fn operations(&self) -> Vec<String> {
        UserOperation::NAMES.iter().map(|n| (*n).to_string()).collect()
    }

    async fn execute(
        &self,
        operations: Vec<UserOperation>,
    ) -> Result<ExecutionResponse<UserOperation>, ExecutorError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ExecutorError::network_retryable("backend offline"));
        }

        let mut translations = HashMap::new();
        for op in &operations {
            match op {
                UserOperation::CreateUser(create) => {
                    self.mint("user", &create.subject_id, &mut translations);
                }
                UserOperation::CreateSubscription(create) => {
                    self.mint("sub", &create.subscription_id, &mut translations);
                }
                _ => {}
            }
        }
        self.batches.lock().push(operations);

        let response = ExecutionResponse::success();
        Ok(if translations.is_empty() {
            response
        } else {
            response.with_id_translations(translations)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsync_user::{CreateSubscription, CreateUser, SubscriptionType};

    #[tokio::test]
    async fn creates_mint_ids_once() {
        let backend = FakeBackend::new();
        let response = backend
            .execute(vec![
                CreateUser::new("app", "local-u").into(),
                CreateSubscription::new("app", "local-u", "local-s", SubscriptionType::Push, "t")
                    .into(),
            ])
            .await
            .unwrap();
        assert_eq!(response.id_translations.unwrap().len(), 2);
        assert_eq!(backend.backend_id("local-u").as_deref(), Some("user-1"));
        assert_eq!(backend.backend_id("local-s").as_deref(), Some("sub-2"));
    }

    #[tokio::test]
    async fn offline_is_retryable() {
        let backend = FakeBackend::new();
        backend.set_offline(true);
        let err = backend.execute(vec![]).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(backend.batches().is_empty());
    }
}
