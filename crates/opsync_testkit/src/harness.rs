//! Restart harness for durability tests.
//!
//! A harness owns one preference directory. Each [`RestartHarness::open`]
//! builds a fresh repo over it, the way an app process would on launch.
//! Shut down and drop the previous repo before opening the next one; the
//! directory lock is released only when its last handle goes away.

use crate::fixtures::{fast_config, TempPrefs};
use opsync_engine::{
    OperationExecutor, OperationRepo, OperationStore, RepoConfig, SharedConfig,
    OPERATION_STORE_NAME,
};
use opsync_user::{UserOperation, UserStores};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Reopens repos and stores over the same on-disk preferences.
pub struct RestartHarness {
    prefs: TempPrefs,
    config: RepoConfig,
    launches: usize,
}

impl RestartHarness {
    /// Creates a harness over an empty directory with [`fast_config`].
    pub fn new() -> Self {
        Self {
            prefs: TempPrefs::new(),
            config: fast_config(),
            launches: 0,
        }
    }

    /// Uses `config` for every repo opened afterwards.
    #[must_use]
    pub fn with_config(mut self, config: RepoConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the preference directory.
    pub fn prefs(&self) -> &TempPrefs {
        &self.prefs
    }

    /// Returns how many repos were opened.
    pub fn launches(&self) -> usize {
        self.launches
    }

    /// Opens a repo routed to `executor`. Must be called inside a runtime.
    ///
    /// The repo is not started.
    pub fn open<E>(&mut self, executor: Arc<E>) -> OperationRepo<UserOperation>
    where
        E: OperationExecutor<UserOperation> + 'static,
    {
        let store =
            OperationStore::<UserOperation>::open(OPERATION_STORE_NAME, self.prefs.open_dyn())
                .expect("Failed to open operation store");
        self.launches += 1;
        let executor: Arc<dyn OperationExecutor<UserOperation>> = executor;
        OperationRepo::new(
            store,
            vec![executor],
            SharedConfig::new(self.config.clone()),
            Handle::current(),
        )
        .expect("Failed to build operation repo")
    }

    /// Opens the user stores.
    pub fn open_stores(&self) -> UserStores {
        UserStores::open(self.prefs.open_dyn()).expect("Failed to open user stores")
    }

    /// Returns the persisted operations in queue order.
    pub fn persisted_operations(&self) -> Vec<UserOperation> {
        OperationStore::<UserOperation>::open(OPERATION_STORE_NAME, self.prefs.open_dyn())
            .expect("Failed to open operation store")
            .list()
            .into_iter()
            .map(|queued| queued.operation)
            .collect()
    }
}

impl Default for RestartHarness {
    fn default() -> Self {
        Self::new()
    }
}
