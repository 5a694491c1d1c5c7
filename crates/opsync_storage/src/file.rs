//! File-based preference store for persistent storage.

use crate::backend::PreferenceStore;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const LOCK_FILE_NAME: &str = ".lock";

type Namespace = BTreeMap<String, String>;

/// A directory-backed preference store.
///
/// Each namespace is a single JSON object stored at `<dir>/<namespace>.json`.
/// Data survives process restarts.
///
/// # Durability
///
/// Every write replaces the namespace document atomically: the new document is
/// written to a temporary file in the same directory, synced, then renamed
/// over the old one. A crash mid-write leaves the previous document intact.
///
/// # Exclusivity
///
/// The directory is guarded by an advisory lock on `<dir>/.lock` for the
/// lifetime of the store, so two processes never interleave writes.
///
/// # Example
///
/// ```no_run
/// use opsync_storage::{FilePreferences, PreferenceStore};
/// use std::path::Path;
///
/// let prefs = FilePreferences::open(Path::new("prefs")).unwrap();
/// prefs.save_string("opsync", "key", "value").unwrap();
/// ```
#[derive(Debug)]
pub struct FilePreferences {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Namespace>>,
    _lock: File,
}

impl FilePreferences {
    /// Opens or creates a preference directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, or
    /// [`StorageError::Locked`] if another process already holds it.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;

        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE_NAME))?;
        if lock.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked(dir.to_path_buf()));
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            cache: Mutex::new(HashMap::new()),
            _lock: lock,
        })
    }

    /// Returns the directory holding the namespace documents.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Returns the namespaces that currently have a document on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn namespaces(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn namespace_path(&self, namespace: &str) -> StorageResult<PathBuf> {
        let valid = !namespace.is_empty()
            && !namespace.starts_with('.')
            && namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::InvalidNamespace(namespace.to_string()));
        }
        Ok(self.dir.join(format!("{namespace}.json")))
    }

    /// Returns the cached namespace document, reading it from disk on first use.
    fn load<'a>(
        &self,
        cache: &'a mut HashMap<String, Namespace>,
        namespace: &str,
    ) -> StorageResult<&'a mut Namespace> {
        match cache.entry(namespace.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let values = self.read_namespace(namespace)?;
                Ok(entry.insert(values))
            }
        }
    }

    fn read_namespace(&self, namespace: &str) -> StorageResult<Namespace> {
        let path = self.namespace_path(namespace)?;
        if !path.exists() {
            return Ok(Namespace::new());
        }

        let contents = fs::read_to_string(&path)?;
        if contents.trim().is_empty() {
            return Ok(Namespace::new());
        }

        serde_json::from_str(&contents).map_err(|e| StorageError::Corrupted {
            path,
            message: e.to_string(),
        })
    }

    fn write(&self, namespace: &str, values: &Namespace) -> StorageResult<()> {
        let path = self.namespace_path(namespace)?;
        let json = serde_json::to_string_pretty(values)?;

        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| StorageError::Io(e.error))?;

        tracing::trace!(namespace, path = %path.display(), "preferences written");
        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    fn get_string(&self, namespace: &str, key: &str) -> StorageResult<Option<String>> {
        let mut cache = self.cache.lock();
        let values = self.load(&mut cache, namespace)?;
        Ok(values.get(key).cloned())
    }

    fn save_string(&self, namespace: &str, key: &str, value: &str) -> StorageResult<()> {
        let mut cache = self.cache.lock();
        let values = self.load(&mut cache, namespace)?;
        values.insert(key.to_string(), value.to_string());
        let snapshot = values.clone();
        self.write(namespace, &snapshot)
    }

    fn remove(&self, namespace: &str, key: &str) -> StorageResult<()> {
        let mut cache = self.cache.lock();
        let values = self.load(&mut cache, namespace)?;
        if values.remove(key).is_none() {
            return Ok(());
        }
        let snapshot = values.clone();
        self.write(namespace, &snapshot)
    }

    fn keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        let mut cache = self.cache.lock();
        let values = self.load(&mut cache, namespace)?;
        Ok(values.keys().cloned().collect())
    }
}
