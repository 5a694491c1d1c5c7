//! Cool-down tracking for records the backend just created.

use crate::config::SharedConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::time::Instant;

/// Remembers when each backend record was created by this device.
///
/// Backends are often eventually consistent: a record created a moment ago
/// may not be readable yet. Operations touching such a record wait for
/// `post_create_delay` before they run.
#[derive(Debug)]
pub struct NewRecordsState {
    records: Mutex<HashMap<String, Instant>>,
    config: SharedConfig,
}

impl NewRecordsState {
    /// Creates an empty state reading timings from `config`.
    #[must_use]
    pub fn new(config: SharedConfig) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Records that `id` was just created.
    pub fn add(&self, id: &str) {
        self.records.lock().insert(id.to_string(), Instant::now());
    }

    /// Returns true if `id` may be touched now.
    #[must_use]
    pub fn can_access(&self, id: &str) -> bool {
        self.accessible_at(id)
            .map_or(true, |at| Instant::now() >= at)
    }

    /// Returns when `id` leaves its cool-down, if it was created here.
    #[must_use]
    pub fn accessible_at(&self, id: &str) -> Option<Instant> {
        let created = *self.records.lock().get(id)?;
        Some(created + self.config.snapshot().post_create_delay)
    }

    /// Returns true if a "not found" for `id` is likely a replication lag.
    #[must_use]
    pub fn is_in_missing_retry_window(&self, id: &str) -> bool {
        let Some(created) = self.records.lock().get(id).copied() else {
            return false;
        };
        created.elapsed() <= self.config.snapshot().post_create_retry_window
    }

    /// Returns the number of tracked records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
