//! Preference fixtures and test configuration.

use opsync_engine::RepoConfig;
use opsync_storage::{FilePreferences, InMemoryPreferences, PreferenceStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A preference directory that is removed when dropped.
pub struct TempPrefs {
    dir: TempDir,
}

impl TempPrefs {
    /// Creates an empty temporary directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Opens the directory.
    ///
    /// Only one handle may be open at a time; drop every clone of the
    /// previous one before opening again.
    pub fn open(&self) -> Arc<FilePreferences> {
        Arc::new(FilePreferences::open(self.dir.path()).expect("Failed to open preferences"))
    }

    /// Opens the directory as a trait object.
    pub fn open_dyn(&self) -> Arc<dyn PreferenceStore> {
        self.open()
    }
}

impl Default for TempPrefs {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns an empty in-memory preference store.
pub fn memory_prefs() -> Arc<InMemoryPreferences> {
    Arc::new(InMemoryPreferences::new())
}

/// Timings small enough for paused-clock tests.
pub fn fast_config() -> RepoConfig {
    RepoConfig::new()
        .with_execution_interval(Duration::from_millis(10))
        .with_post_wake_delay(Duration::from_millis(1))
        .with_post_create_delay(Duration::from_millis(100))
        .with_fail_retry_backoff(Duration::from_millis(500))
        .with_post_create_retry_window(Duration::from_secs(10))
}

/// A configuration whose settle delay keeps the worker from ever running
/// a batch during a short test.
pub fn idle_config() -> RepoConfig {
    RepoConfig::new().with_execution_interval(Duration::from_secs(3600))
}
