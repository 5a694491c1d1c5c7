//! The operation repo: a persistent write queue with a single background
//! worker.
//!
//! ## Worker cycle
//!
//! 1. Suspend until an enqueue wakes the worker, or until the earliest
//!    backoff or post-create cool-down expires
//! 2. After an enqueue wake, settle for `execution_interval` unless forced
//! 3. Close the current bucket and drain every eligible batch from it,
//!    pausing `post_wake_delay` between batches
//! 4. Go back to 1
//!
//! Operations enqueued while a cycle runs land in the next bucket, so they
//! get their own settle delay.

use crate::config::SharedConfig;
use crate::error::{EngineError, EngineResult};
use crate::executor::{ExecutionResponse, ExecutionResult, OperationExecutor};
use crate::new_records::NewRecordsState;
use crate::operation::{GroupComparisonType, Operation, OperationStore, QueuedOperation};
use crate::queue::{PendingItem, PendingQueue};
use opsync_core::IdTranslator;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of the repo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoState {
    /// Not started, or shut down.
    Stopped,
    /// The worker is selecting or executing batches.
    Running,
    /// The worker is waiting for work.
    Idle,
    /// An executor asked to pause; call `start` to resume.
    Paused,
}

impl RepoState {
    /// Returns true while a worker task is alive.
    pub fn is_active(&self) -> bool {
        matches!(self, RepoState::Running | RepoState::Idle)
    }
}

/// Counters about executed work.
#[derive(Debug, Clone, Default)]
pub struct RepoStats {
    /// Batches handed to executors.
    pub batches_executed: u64,
    /// Operations removed as succeeded.
    pub operations_succeeded: u64,
    /// Operations removed as failed or abandoned.
    pub operations_failed: u64,
    /// Operations put back for a retry.
    pub retries: u64,
    /// Follow-up operations inserted by executors.
    pub follow_ups: u64,
    /// Last executor error or abandonment reason.
    pub last_error: Option<String>,
    /// When the last batch finished.
    pub last_batch_time: Option<std::time::Instant>,
}

#[derive(Debug, Clone, Copy)]
struct WakeMessage {
    force: bool,
}

/// Builder for [`OperationRepo`].
pub struct RepoBuilder<O: Operation> {
    store: Arc<OperationStore<O>>,
    executors: Vec<Arc<dyn OperationExecutor<O>>>,
    config: SharedConfig,
    translator: Option<Arc<IdTranslator>>,
    runtime: Option<Handle>,
}

impl<O: Operation> RepoBuilder<O> {
    /// Registers an executor.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn OperationExecutor<O>>) -> Self {
        self.executors.push(executor);
        self
    }

    /// Uses a shared configuration handle.
    #[must_use]
    pub fn with_config(mut self, config: SharedConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares an id translator with other components.
    #[must_use]
    pub fn with_translator(mut self, translator: Arc<IdTranslator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Runs the worker on `runtime` instead of the current one.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Validates the routing table and builds the repo. The worker does not
    /// run until [`OperationRepo::start`].
    ///
    /// # Errors
    ///
    /// Fails if an operation name has no executor, if two executors claim
    /// the same name, or if no runtime is available.
    pub fn build(self) -> EngineResult<OperationRepo<O>> {
        let mut executors: HashMap<String, Arc<dyn OperationExecutor<O>>> = HashMap::new();
        for executor in self.executors {
            for name in executor.operations() {
                if executors.contains_key(&name) {
                    return Err(EngineError::DuplicateExecutor { name });
                }
                executors.insert(name, Arc::clone(&executor));
            }
        }
        if let Some(name) = O::NAMES.iter().find(|name| !executors.contains_key(**name)) {
            return Err(EngineError::MissingExecutor {
                name: (*name).to_string(),
            });
        }

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| EngineError::NoRuntime)?,
        };

        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let (initialized, _) = watch::channel(false);
        let new_records = Arc::new(NewRecordsState::new(self.config.clone()));

        Ok(OperationRepo {
            shared: Arc::new(Shared {
                store: self.store,
                executors,
                config: self.config,
                translator: self.translator.unwrap_or_default(),
                new_records,
                queue: Mutex::new(PendingQueue::new()),
                wake_tx,
                wake_rx: Mutex::new(Some(wake_rx)),
                state: RwLock::new(RepoState::Stopped),
                stats: RwLock::new(RepoStats::default()),
                initialized,
                loaded: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                bucket: AtomicU64::new(0),
                shutdown: CancellationToken::new(),
            }),
            runtime,
            worker: Mutex::new(None),
        })
    }
}

/// A persistent queue of operations executed in the background.
///
/// # Guarantees
///
/// - Every enqueued operation is persisted before `enqueue` returns and
///   stays persisted until it succeeds or fails terminally
/// - Batches run strictly one at a time
/// - An operation never runs while an id it depends on is still local
/// - Operations are selected in enqueue order among eligible ones
pub struct OperationRepo<O: Operation> {
    shared: Arc<Shared<O>>,
    runtime: Handle,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Shared<O: Operation> {
    store: Arc<OperationStore<O>>,
    executors: HashMap<String, Arc<dyn OperationExecutor<O>>>,
    config: SharedConfig,
    translator: Arc<IdTranslator>,
    new_records: Arc<NewRecordsState>,
    queue: Mutex<PendingQueue<O>>,
    wake_tx: mpsc::UnboundedSender<WakeMessage>,
    wake_rx: Mutex<Option<mpsc::UnboundedReceiver<WakeMessage>>>,
    state: RwLock<RepoState>,
    stats: RwLock<RepoStats>,
    initialized: watch::Sender<bool>,
    loaded: AtomicBool,
    paused: AtomicBool,
    bucket: AtomicU64,
    shutdown: CancellationToken,
}

impl<O: Operation> OperationRepo<O> {
    /// Starts building a repo over `store`.
    pub fn builder(store: Arc<OperationStore<O>>) -> RepoBuilder<O> {
        RepoBuilder {
            store,
            executors: Vec::new(),
            config: SharedConfig::default(),
            translator: None,
            runtime: None,
        }
    }

    /// Builds a repo with the given executors, configuration and runtime.
    pub fn new(
        store: Arc<OperationStore<O>>,
        executors: Vec<Arc<dyn OperationExecutor<O>>>,
        config: SharedConfig,
        runtime: Handle,
    ) -> EngineResult<Self> {
        executors
            .into_iter()
            .fold(Self::builder(store), RepoBuilder::with_executor)
            .with_config(config)
            .with_runtime(runtime)
            .build()
    }

    /// Starts the worker, or resumes it after a pause.
    ///
    /// Persisted operations are loaded on the first start.
    pub fn start(&self) {
        if self.shared.shutdown.is_cancelled() {
            tracing::warn!("start called on a shut down operation repo");
            return;
        }
        let Some(wake_rx) = self.shared.wake_rx.lock().take() else {
            return;
        };
        self.shared.paused.store(false, Ordering::SeqCst);
        self.shared.set_state(RepoState::Running);

        let shared = Arc::clone(&self.shared);
        let handle = self.runtime.spawn(async move { shared.run(wake_rx).await });
        *self.worker.lock() = Some(handle);
    }

    /// Persists `operation` and schedules it. Returns the assigned id.
    ///
    /// `force` skips the settle delay.
    pub fn enqueue(&self, operation: O, force: bool) -> EngineResult<String> {
        self.shared.enqueue(operation, force, None)
    }

    /// Enqueues `operation` and waits until it succeeds or fails for good.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Shutdown`] if the repo shuts down first.
    pub async fn enqueue_and_wait(&self, operation: O, force: bool) -> EngineResult<bool> {
        let (tx, rx) = oneshot::channel();
        self.shared.enqueue(operation, force, Some(tx))?;
        rx.await.map_err(|_| EngineError::Shutdown)
    }

    /// Runs `operation` as soon as possible and waits for the outcome.
    ///
    /// Outstanding backoff is cleared so nothing ahead of it stalls.
    pub async fn execute_now(&self, operation: O) -> EngineResult<bool> {
        self.shared.queue.lock().clear_backoff();
        self.enqueue_and_wait(operation, true).await
    }

    /// Clears all backoff and wakes the worker without settling.
    pub fn force_execute(&self) {
        self.shared.queue.lock().clear_backoff();
        self.shared.wake(true);
    }

    /// Applies externally learned id translations to the queue.
    ///
    /// Translations that conflict with ones already known are ignored.
    pub fn apply_translations(&self, translations: &HashMap<String, String>) {
        let accepted = self.shared.translator.apply(translations);
        self.shared.translate_queue(&accepted);
        self.shared.wake(false);
    }

    /// Resolves once persisted operations were loaded into the queue.
    pub async fn await_initialized(&self) -> EngineResult<()> {
        let mut rx = self.shared.initialized.subscribe();
        rx.wait_for(|loaded| *loaded)
            .await
            .map(|_| ())
            .map_err(|_| EngineError::Shutdown)
    }

    /// Returns true if a pending operation has the given name.
    pub fn contains_operation(&self, name: &str) -> bool {
        self.shared.queue.lock().contains_name(name)
    }

    /// Returns the number of pending operations, excluding a running batch.
    pub fn pending_count(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Returns pending operation ids in queue order.
    pub fn pending_ids(&self) -> Vec<String> {
        self.shared.queue.lock().ids()
    }

    /// Returns the current state.
    pub fn state(&self) -> RepoState {
        *self.shared.state.read()
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> RepoStats {
        self.shared.stats.read().clone()
    }

    /// Returns the id translator.
    pub fn translator(&self) -> &Arc<IdTranslator> {
        &self.shared.translator
    }

    /// Returns the post-create cool-down state, for executors.
    pub fn new_records(&self) -> &Arc<NewRecordsState> {
        &self.shared.new_records
    }

    /// Returns the configuration handle.
    pub fn config(&self) -> &SharedConfig {
        &self.shared.config
    }

    /// Returns the operation store.
    pub fn store(&self) -> &Arc<OperationStore<O>> {
        &self.shared.store
    }

    /// Stops the worker at its next suspension point and waits for it.
    ///
    /// A running batch finishes first. Pending operations stay persisted;
    /// callers still waiting on them get [`EngineError::Shutdown`].
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "operation worker ended abnormally");
            }
        }
        self.shared.queue.lock().drop_waiters();
        self.shared.set_state(RepoState::Stopped);
    }
}

impl<O: Operation> Drop for OperationRepo<O> {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

impl<O: Operation> std::fmt::Debug for OperationRepo<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRepo")
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl<O: Operation> Shared<O> {
    fn set_state(&self, state: RepoState) {
        *self.state.write() = state;
    }

    fn wake(&self, force: bool) {
        // The receiver is parked in `wake_rx` between workers, so this cannot fail.
        let _ = self.wake_tx.send(WakeMessage { force });
    }

    fn enqueue(
        &self,
        mut operation: O,
        force: bool,
        waiter: Option<oneshot::Sender<bool>>,
    ) -> EngineResult<String> {
        if self.shutdown.is_cancelled() {
            return Err(EngineError::Shutdown);
        }
        if !self.executors.contains_key(operation.name()) {
            return Err(EngineError::MissingExecutor {
                name: operation.name().to_string(),
            });
        }

        let translations = self.translator.resolved_map();
        if !translations.is_empty() {
            operation.translate_ids(&translations);
        }

        let queued = QueuedOperation::new(operation);
        let id = queued.id.clone();

        // Held from persist to push so `load_saved` never sees the id in the
        // store without it being queued.
        let mut queue = self.queue.lock();
        self.store.add(queued.clone(), false)?;
        let mut item = PendingItem::new(queued, self.bucket.load(Ordering::SeqCst));
        if let Some(waiter) = waiter {
            item = item.with_waiter(waiter);
        }
        if queue.push_back(item) {
            tracing::debug!(id = %id, force, "operation enqueued");
        } else {
            tracing::warn!(id = %id, "operation was already queued, waiter joined it");
        }
        drop(queue);

        self.wake(force);
        Ok(id)
    }

    async fn run(self: Arc<Self>, mut wake_rx: mpsc::UnboundedReceiver<WakeMessage>) {
        tracing::debug!("operation worker started");
        if !self.loaded.swap(true, Ordering::SeqCst) {
            self.load_saved();
        }
        if !self.queue.lock().is_empty() {
            self.wake(false);
        }

        'cycles: while self.wait_for_work(&mut wake_rx).await {
            let bucket = self.bucket.fetch_add(1, Ordering::SeqCst);
            loop {
                let batch = self
                    .queue
                    .lock()
                    .next_batch(bucket, Instant::now(), &self.new_records);
                let Some(batch) = batch else {
                    break;
                };

                self.execute(batch).await;

                if self.paused.load(Ordering::SeqCst) {
                    tracing::warn!("operation repo paused by executor");
                    self.set_state(RepoState::Paused);
                    break 'cycles;
                }

                let delay = self.config.snapshot().post_wake_delay;
                tokio::select! {
                    _ = self.shutdown.cancelled() => break 'cycles,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        if self.shutdown.is_cancelled() {
            self.set_state(RepoState::Stopped);
        }
        *self.wake_rx.lock() = Some(wake_rx);
        tracing::debug!("operation worker stopped");
    }

    /// Moves persisted operations that are not queued yet to the front.
    fn load_saved(&self) {
        let translations = self.translator.resolved_map();
        let count = {
            let mut queue = self.queue.lock();
            let saved: Vec<PendingItem<O>> = self
                .store
                .list()
                .into_iter()
                .filter(|queued| !queue.contains(&queued.id))
                .map(|mut queued| {
                    if !translations.is_empty() {
                        queued.operation.translate_ids(&translations);
                    }
                    PendingItem::new(queued, 0)
                })
                .collect();
            let count = saved.len();
            queue.push_front_all(saved);
            count
        };
        self.initialized.send_replace(true);
        tracing::debug!(count, "loaded persisted operations");
    }

    /// Returns false when the worker should stop.
    async fn wait_for_work(&self, wake_rx: &mut mpsc::UnboundedReceiver<WakeMessage>) -> bool {
        self.set_state(RepoState::Idle);

        let force = loop {
            let next_ready = self
                .queue
                .lock()
                .next_ready_at(Instant::now(), &self.new_records);
            let sleep_until = next_ready.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                message = wake_rx.recv() => match message {
                    Some(message) => break message.force,
                    None => return false,
                },
                _ = tokio::time::sleep_until(sleep_until) => {
                    if next_ready.is_some() {
                        break true;
                    }
                }
            }
        };

        if !force {
            let deadline = Instant::now() + self.config.snapshot().execution_interval;
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => return false,
                    _ = tokio::time::sleep_until(deadline) => break,
                    message = wake_rx.recv() => match message {
                        Some(WakeMessage { force: true }) => break,
                        Some(_) => continue,
                        None => return false,
                    },
                }
            }
        }

        self.set_state(RepoState::Running);
        true
    }

    async fn execute(&self, mut batch: Vec<PendingItem<O>>) {
        let name = batch[0].op().name().to_string();
        let Some(executor) = self.executors.get(&name).cloned() else {
            tracing::error!(name = %name, "no executor for operation, dropping batch");
            self.finish(batch, false);
            return;
        };

        let now = Instant::now();
        for item in &mut batch {
            item.first_attempt.get_or_insert(now);
        }
        let operations: Vec<O> = batch.iter().map(|item| item.op().clone()).collect();
        tracing::debug!(name = %name, size = operations.len(), "executing batch");
        self.stats.write().batches_executed += 1;

        let response = match tokio::spawn(async move { executor.execute(operations).await }).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                if err.is_retryable() {
                    tracing::warn!(name = %name, error = %err, "executor failed, will retry");
                } else {
                    tracing::error!(name = %name, error = %err, "executor failed unexpectedly, will retry");
                }
                self.stats.write().last_error = Some(err.to_string());
                ExecutionResponse::fail_retry()
            }
            Err(join_err) => {
                tracing::error!(name = %name, error = %join_err, "executor panicked, will retry");
                self.stats.write().last_error = Some(format!("executor panicked: {join_err}"));
                ExecutionResponse::fail_retry()
            }
        };

        self.handle_response(batch, response);
        self.stats.write().last_batch_time = Some(std::time::Instant::now());
    }

    fn handle_response(&self, mut batch: Vec<PendingItem<O>>, response: ExecutionResponse<O>) {
        let ExecutionResponse {
            result,
            id_translations,
            operations,
            retry_after,
        } = response;

        if let Some(translations) = &id_translations {
            let accepted = self.translator.apply(translations);
            if !accepted.is_empty() {
                for item in &mut batch {
                    item.operation.operation.translate_ids(&accepted);
                }
                for backend_id in accepted.values() {
                    self.new_records.add(backend_id);
                }
                self.translate_queue(&accepted);
            }
        }

        match result {
            ExecutionResult::Success => self.finish(batch, true),
            ExecutionResult::SuccessStartingOnly => {
                let rest = batch.split_off(1);
                self.finish(batch, true);
                self.requeue(rest, id_translations.is_some());
            }
            ExecutionResult::FailRetry => self.retry(batch, retry_after, id_translations.is_some()),
            ExecutionResult::FailNoRetry
            | ExecutionResult::FailUnauthorized
            | ExecutionResult::FailConflict => {
                tracing::warn!(result = ?result, size = batch.len(), "dropping failed operations");
                self.finish(batch, false);
            }
            ExecutionResult::FailPauseRepo => {
                self.requeue(batch, id_translations.is_some());
                self.paused.store(true, Ordering::SeqCst);
            }
        }

        if let Some(follow_ups) = operations {
            self.insert_follow_ups(follow_ups);
        }
    }

    fn retry(&self, mut batch: Vec<PendingItem<O>>, retry_after: Option<Duration>, translated: bool) {
        let config = self.config.snapshot();
        let now = Instant::now();

        let head = &batch[0];
        let abandoned = head.op().group_comparison_type() == GroupComparisonType::Create
            && head
                .first_attempt
                .is_some_and(|first| now.duration_since(first) >= config.post_create_retry_window);
        if abandoned {
            tracing::error!(
                name = %head.op().name(),
                size = batch.len(),
                "create batch kept failing past its retry window, abandoning"
            );
            self.stats.write().last_error = Some("create retry window exceeded".into());
            self.finish(batch, false);
            return;
        }

        for item in &mut batch {
            item.retries += 1;
            let delay = config
                .delay_for_retry(item.retries)
                .max(retry_after.unwrap_or(Duration::ZERO));
            item.not_before = Some(now + delay);
            tracing::warn!(id = %item.id(), retries = item.retries, delay_ms = delay.as_millis() as u64, "operation will be retried");
        }
        self.stats.write().retries += batch.len() as u64;
        self.requeue(batch, translated);
    }

    /// Puts items back at the front, persisting them if their ids changed.
    fn requeue(&self, batch: Vec<PendingItem<O>>, translated: bool) {
        if translated {
            for item in &batch {
                self.persist_operation(&item.operation);
            }
        }
        self.queue.lock().push_front_all(batch);
    }

    /// Removes items from the store and resolves their waiters.
    fn finish(&self, batch: Vec<PendingItem<O>>, succeeded: bool) {
        let count = batch.len() as u64;
        for mut item in batch {
            if let Err(err) = self.store.remove(item.id(), false) {
                tracing::error!(id = %item.id(), error = %err, "failed to remove finished operation");
            }
            item.complete(succeeded);
        }
        let mut stats = self.stats.write();
        if succeeded {
            stats.operations_succeeded += count;
        } else {
            stats.operations_failed += count;
        }
    }

    fn insert_follow_ups(&self, follow_ups: Vec<O>) {
        let translations = self.translator.resolved_map();
        let mut items = Vec::with_capacity(follow_ups.len());
        for (index, mut operation) in follow_ups.into_iter().enumerate() {
            if !translations.is_empty() {
                operation.translate_ids(&translations);
            }
            let queued = QueuedOperation::new(operation);
            if let Err(err) = self.store.insert(index, queued.clone(), false) {
                tracing::error!(id = %queued.id, error = %err, "failed to persist follow-up operation");
            }
            items.push(PendingItem::new(queued, 0));
        }
        self.stats.write().follow_ups += items.len() as u64;
        self.queue.lock().push_front_all(items);
    }

    fn translate_queue(&self, translations: &HashMap<String, String>) {
        let changed = self.queue.lock().translate_ids(translations);
        for queued in &changed {
            self.persist_operation(queued);
        }
    }

    fn persist_operation(&self, queued: &QueuedOperation<O>) {
        let updated = queued.clone();
        let result = self.store.update(&queued.id, move |stored| *stored = updated);
        if let Err(err) = result {
            tracing::error!(id = %queued.id, error = %err, "failed to persist translated operation");
        }
    }
}
