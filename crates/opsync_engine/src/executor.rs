//! Executor contract between the operation repo and the network layer.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use thiserror::Error;

/// Outcome of executing one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Every operation in the batch was applied.
    Success,
    /// Only the batch head was applied; the rest go back to the queue.
    SuccessStartingOnly,
    /// Transient failure; retry later.
    FailRetry,
    /// Permanent failure; drop the batch.
    FailNoRetry,
    /// The backend refused our credentials; drop the batch.
    FailUnauthorized,
    /// The backend reported a conflicting state; drop the batch.
    FailConflict,
    /// Keep the batch and stop processing until the repo is restarted.
    FailPauseRepo,
}

impl ExecutionResult {
    /// Returns true for results that remove the head as succeeded.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success | Self::SuccessStartingOnly)
    }

    /// Returns true for results that drop the batch as failed.
    pub fn is_terminal_failure(self) -> bool {
        matches!(
            self,
            Self::FailNoRetry | Self::FailUnauthorized | Self::FailConflict
        )
    }
}

/// What an executor reports back for a batch.
#[derive(Debug, Clone)]
pub struct ExecutionResponse<O> {
    /// The outcome.
    pub result: ExecutionResult,
    /// Local id → backend id mappings learned while executing.
    pub id_translations: Option<HashMap<String, String>>,
    /// Follow-up operations to run before anything else.
    pub operations: Option<Vec<O>>,
    /// Server-requested minimum delay before retrying.
    pub retry_after: Option<Duration>,
}

impl<O> ExecutionResponse<O> {
    /// Creates a response with no extras.
    pub fn new(result: ExecutionResult) -> Self {
        Self {
            result,
            id_translations: None,
            operations: None,
            retry_after: None,
        }
    }

    /// Shorthand for [`ExecutionResult::Success`].
    pub fn success() -> Self {
        Self::new(ExecutionResult::Success)
    }

    /// Shorthand for [`ExecutionResult::FailRetry`].
    pub fn fail_retry() -> Self {
        Self::new(ExecutionResult::FailRetry)
    }

    /// Shorthand for [`ExecutionResult::FailNoRetry`].
    pub fn fail_no_retry() -> Self {
        Self::new(ExecutionResult::FailNoRetry)
    }

    /// Attaches id translations.
    #[must_use]
    pub fn with_id_translations(mut self, translations: HashMap<String, String>) -> Self {
        self.id_translations = Some(translations);
        self
    }

    /// Attaches follow-up operations.
    #[must_use]
    pub fn with_operations(mut self, operations: Vec<O>) -> Self {
        self.operations = Some(operations);
        self
    }

    /// Attaches a retry-after hint.
    #[must_use]
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }
}

/// Unexpected executor failure. The repo treats every error as
/// [`ExecutionResult::FailRetry`].
#[derive(Error, Debug, Clone)]
pub enum ExecutorError {
    /// Network failure.
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
        /// Whether the failure is expected to go away.
        retryable: bool,
    },

    /// The backend answered with an unexpected status.
    #[error("backend returned status {status}: {message}")]
    Backend {
        /// HTTP-like status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Anything else.
    #[error("executor error: {0}")]
    Other(String),
}

impl ExecutorError {
    /// Creates a retryable network error.
    pub fn network_retryable(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable network error.
    pub fn network_fatal(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the failure looks transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { retryable, .. } => *retryable,
            Self::Backend { status, .. } => *status == 429 || *status >= 500,
            Self::Other(_) => false,
        }
    }
}

/// Executes batches of operations against the backend.
///
/// A batch is ordered: head first, then grouped operations in enqueue order.
/// Timeouts are the executor's responsibility.
#[async_trait]
pub trait OperationExecutor<O>: Send + Sync {
    /// Operation names this executor handles.
    fn operations(&self) -> Vec<String>;

    /// Executes one batch.
    async fn execute(&self, operations: Vec<O>) -> Result<ExecutionResponse<O>, ExecutorError>;
}

/// A scripted executor for testing.
///
/// Responses are consumed in order; once the script is empty every call
/// returns the default result.
pub struct MockExecutor<O> {
    names: Vec<String>,
    script: Mutex<VecDeque<Result<ExecutionResponse<O>, ExecutorError>>>,
    default_result: Mutex<ExecutionResult>,
    calls: Mutex<Vec<Vec<O>>>,
    delay: Option<Duration>,
}

impl<O: Clone + Send + Sync> MockExecutor<O> {
    /// Creates an executor handling `names` that succeeds by default.
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| (*n).to_string()).collect(),
            script: Mutex::new(VecDeque::new()),
            default_result: Mutex::new(ExecutionResult::Success),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Makes every call take `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues a response for a future call.
    pub fn push_response(&self, response: ExecutionResponse<O>) {
        self.script.lock().push_back(Ok(response));
    }

    /// Queues a plain result for a future call.
    pub fn push_result(&self, result: ExecutionResult) {
        self.push_response(ExecutionResponse::new(result));
    }

    /// Queues an error for a future call.
    pub fn push_error(&self, error: ExecutorError) {
        self.script.lock().push_back(Err(error));
    }

    /// Sets the result returned once the script is exhausted.
    pub fn set_default_result(&self, result: ExecutionResult) {
        *self.default_result.lock() = result;
    }

    /// Returns every batch received so far.
    pub fn calls(&self) -> Vec<Vec<O>> {
        self.calls.lock().clone()
    }

    /// Returns the number of batches received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl<O: Clone + Send + Sync + 'static> OperationExecutor<O> for MockExecutor<O> {
    fn operations(&self) -> Vec<String> {
        self.names.clone()
    }

    async fn execute(&self, operations: Vec<O>) -> Result<ExecutionResponse<O>, ExecutorError> {
        self.calls.lock().push(operations);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(response) => response,
            None => Ok(ExecutionResponse::new(*self.default_result.lock())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_classes() {
        assert!(ExecutionResult::Success.is_success());
        assert!(ExecutionResult::SuccessStartingOnly.is_success());
        assert!(ExecutionResult::FailConflict.is_terminal_failure());
        assert!(ExecutionResult::FailUnauthorized.is_terminal_failure());
        assert!(!ExecutionResult::FailRetry.is_terminal_failure());
        assert!(!ExecutionResult::FailPauseRepo.is_terminal_failure());
    }

    #[test]
    fn retryable_errors() {
        assert!(ExecutorError::network_retryable("reset").is_retryable());
        assert!(!ExecutorError::network_fatal("bad cert").is_retryable());
        assert!(ExecutorError::Backend {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
        assert!(!ExecutorError::Backend {
            status: 400,
            message: "bad request".into()
        }
        .is_retryable());
        assert!(!ExecutorError::Other("boom".into()).is_retryable());
    }

    #[tokio::test]
    async fn mock_follows_script_then_default() {
        let mock = MockExecutor::<u32>::new(&["a"]);
        mock.push_result(ExecutionResult::FailRetry);
        mock.push_error(ExecutorError::Other("boom".into()));

        assert_eq!(
            mock.execute(vec![1]).await.unwrap().result,
            ExecutionResult::FailRetry
        );
        assert!(mock.execute(vec![2]).await.is_err());
        assert_eq!(
            mock.execute(vec![3, 4]).await.unwrap().result,
            ExecutionResult::Success
        );
        assert_eq!(mock.calls(), vec![vec![1], vec![2], vec![3, 4]]);
        assert_eq!(mock.operations(), vec!["a".to_string()]);
    }
}
