//! Configuration for the operation repo.

use opsync_core::{Model, SingletonStore, StoreEvent, SubscriptionId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Remote-config key for [`RepoConfig::execution_interval`], in milliseconds.
pub const EXECUTION_INTERVAL_KEY: &str = "opRepoExecutionInterval";
/// Remote-config key for [`RepoConfig::post_wake_delay`], in milliseconds.
pub const POST_WAKE_DELAY_KEY: &str = "opRepoPostWakeDelay";
/// Remote-config key for [`RepoConfig::post_create_delay`], in milliseconds.
pub const POST_CREATE_DELAY_KEY: &str = "opRepoPostCreateDelay";
/// Remote-config key for [`RepoConfig::post_create_retry_window`], in milliseconds.
pub const POST_CREATE_RETRY_WINDOW_KEY: &str = "opRepoPostCreateRetryUpTo";
/// Remote-config key for [`RepoConfig::fail_retry_backoff`], in milliseconds.
pub const FAIL_RETRY_BACKOFF_KEY: &str = "opRepoDefaultFailRetryBackoff";

/// Timing configuration for the operation repo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Settle delay after an enqueue wake so bursts coalesce.
    #[serde(rename = "execution_interval_ms", with = "millis")]
    pub execution_interval: Duration,
    /// Pause between consecutive batches.
    #[serde(rename = "post_wake_delay_ms", with = "millis")]
    pub post_wake_delay: Duration,
    /// Cool-down before a freshly created record may be touched again.
    #[serde(rename = "post_create_delay_ms", with = "millis")]
    pub post_create_delay: Duration,
    /// How long a failing create batch keeps being retried.
    #[serde(rename = "post_create_retry_window_ms", with = "millis")]
    pub post_create_retry_window: Duration,
    /// Backoff after the first `FailRetry`.
    #[serde(rename = "fail_retry_backoff_ms", with = "millis")]
    pub fail_retry_backoff: Duration,
    /// Growth factor between consecutive retries.
    pub retry_backoff_multiplier: f64,
    /// Upper bound of the computed backoff.
    #[serde(rename = "max_retry_backoff_ms", with = "millis")]
    pub max_retry_backoff: Duration,
}

impl RepoConfig {
    /// Creates a configuration with default timings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            execution_interval: Duration::from_millis(5_000),
            post_wake_delay: Duration::from_millis(200),
            post_create_delay: Duration::from_millis(5_000),
            post_create_retry_window: Duration::from_millis(60_000),
            fail_retry_backoff: Duration::from_millis(15_000),
            retry_backoff_multiplier: 2.0,
            max_retry_backoff: Duration::from_secs(600),
        }
    }

    /// Sets the settle delay.
    #[must_use]
    pub fn with_execution_interval(mut self, interval: Duration) -> Self {
        self.execution_interval = interval;
        self
    }

    /// Sets the delay between batches.
    #[must_use]
    pub fn with_post_wake_delay(mut self, delay: Duration) -> Self {
        self.post_wake_delay = delay;
        self
    }

    /// Sets the post-create cool-down.
    #[must_use]
    pub fn with_post_create_delay(mut self, delay: Duration) -> Self {
        self.post_create_delay = delay;
        self
    }

    /// Sets the create retry window.
    #[must_use]
    pub fn with_post_create_retry_window(mut self, window: Duration) -> Self {
        self.post_create_retry_window = window;
        self
    }

    /// Sets the base retry backoff.
    #[must_use]
    pub fn with_fail_retry_backoff(mut self, backoff: Duration) -> Self {
        self.fail_retry_backoff = backoff;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_retry_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.retry_backoff_multiplier = multiplier;
        self
    }

    /// Sets the backoff cap.
    #[must_use]
    pub fn with_max_retry_backoff(mut self, max: Duration) -> Self {
        self.max_retry_backoff = max;
        self
    }

    /// Calculates the backoff before retry number `retry` (1-indexed).
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let base = self.fail_retry_backoff.as_secs_f64() * self.retry_backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_retry_backoff.as_secs_f64());

        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_retry_backoff
        }
    }

    /// Overrides timings with the millisecond values present on `model`.
    pub fn apply_model(&mut self, model: &Model) {
        let read = |key: &str| model.get::<u64>(key).map(Duration::from_millis);
        if let Some(v) = read(EXECUTION_INTERVAL_KEY) {
            self.execution_interval = v;
        }
        if let Some(v) = read(POST_WAKE_DELAY_KEY) {
            self.post_wake_delay = v;
        }
        if let Some(v) = read(POST_CREATE_DELAY_KEY) {
            self.post_create_delay = v;
        }
        if let Some(v) = read(POST_CREATE_RETRY_WINDOW_KEY) {
            self.post_create_retry_window = v;
        }
        if let Some(v) = read(FAIL_RETRY_BACKOFF_KEY) {
            self.fail_retry_backoff = v;
        }
    }

    /// Builds a configuration from defaults plus the values on `model`.
    #[must_use]
    pub fn from_model(model: &Model) -> Self {
        let mut config = Self::new();
        config.apply_model(model);
        config
    }
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A live, shared view of [`RepoConfig`].
///
/// The repo reads a fresh snapshot every time it needs a timing, so updates
/// take effect on the next wait.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<RepoConfig>>,
}

impl SharedConfig {
    /// Wraps a configuration.
    #[must_use]
    pub fn new(config: RepoConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Returns the current configuration.
    #[must_use]
    pub fn snapshot(&self) -> RepoConfig {
        self.inner.read().clone()
    }

    /// Replaces the configuration.
    pub fn replace(&self, config: RepoConfig) {
        *self.inner.write() = config;
    }

    /// Mutates the configuration in place.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut RepoConfig),
    {
        f(&mut *self.inner.write());
    }

    /// Tracks a remote-config singleton: applies it now and on every change.
    pub fn follow(&self, store: &SingletonStore) -> SubscriptionId {
        self.inner.write().apply_model(&store.model());

        let inner = Arc::clone(&self.inner);
        store.subscribe(move |event: &StoreEvent<Model>| {
            inner.write().apply_model(event.model());
            tracing::debug!("operation repo config updated from remote config");
        })
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
