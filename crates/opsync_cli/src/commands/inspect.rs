//! Inspect command implementation.

use super::{open_prefs, open_queue};
use opsync_core::{storage_key, Model, ModelStore, MODEL_STORE_PREFIX, PREFS_NAMESPACE, SINGLETON_ID};
use opsync_engine::{Operation, OPERATION_STORE_NAME};
use opsync_storage::PreferenceStore;
use opsync_user::{IdentityModel, IDENTITY_STORE_NAME, SUBSCRIPTION_STORE_NAME};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Preference directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Directory path.
    pub path: String,
    /// Namespaces with a document on disk.
    pub namespaces: Vec<String>,
    /// Number of pending operations that load.
    pub pending: usize,
    /// Number of persisted entries that do not load.
    pub malformed: usize,
    /// Pending operations per name.
    pub by_name: BTreeMap<String, usize>,
    /// Current user's subject id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    /// Current user's external id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Number of subscriptions.
    pub subscriptions: usize,
    /// Store statistics (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stores: Option<Vec<StoreStats>>,
}

/// Statistics for a single persisted store.
#[derive(Debug, Serialize)]
pub struct StoreStats {
    /// Store name.
    pub name: String,
    /// Number of persisted members.
    pub members: usize,
    /// Size of the persisted document in bytes.
    pub bytes: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, show_stores: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let prefs = open_prefs(path)?;
    let namespaces = prefs.namespaces()?;
    let mut result = collect(prefs, show_stores)?;
    result.path = path.display().to_string();
    result.namespaces = namespaces;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Gathers queue and store statistics. Nothing is written.
pub fn collect(
    prefs: Arc<dyn PreferenceStore>,
    show_stores: bool,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let raw_pending = persisted_len(prefs.as_ref(), OPERATION_STORE_NAME)?;
    let queue = open_queue(prefs.clone())?;
    let mut by_name = BTreeMap::new();
    for queued in queue.list() {
        *by_name.entry(queued.operation.name().to_string()).or_insert(0) += 1;
    }

    let identity = ModelStore::<Model>::open(IDENTITY_STORE_NAME, prefs.clone())?
        .get(SINGLETON_ID)
        .map(IdentityModel::new);

    let stores = if show_stores {
        let mut stats = Vec::new();
        for key in prefs.keys(PREFS_NAMESPACE)? {
            let Some(name) = key.strip_prefix(MODEL_STORE_PREFIX) else {
                continue;
            };
            let bytes = prefs
                .get_string(PREFS_NAMESPACE, &key)?
                .map_or(0, |doc| doc.len());
            stats.push(StoreStats {
                name: name.to_string(),
                members: persisted_len(prefs.as_ref(), name)?,
                bytes,
            });
        }
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        Some(stats)
    } else {
        None
    };

    Ok(InspectResult {
        path: String::new(),
        namespaces: Vec::new(),
        pending: queue.len(),
        malformed: raw_pending.saturating_sub(queue.len()),
        by_name,
        subject_id: identity.as_ref().and_then(IdentityModel::subject_id),
        external_id: identity.as_ref().and_then(IdentityModel::external_id),
        subscriptions: persisted_len(prefs.as_ref(), SUBSCRIPTION_STORE_NAME)?,
        stores,
    })
}

/// Returns the number of array elements persisted for store `name`.
fn persisted_len(prefs: &dyn PreferenceStore, name: &str) -> Result<usize, Box<dyn std::error::Error>> {
    let Some(doc) = prefs.get_string(PREFS_NAMESPACE, &storage_key(name))? else {
        return Ok(0);
    };
    match serde_json::from_str::<serde_json::Value>(&doc) {
        Ok(serde_json::Value::Array(items)) => Ok(items.len()),
        _ => Ok(0),
    }
}

fn print_text_output(result: &InspectResult) {
    println!("Preferences: {}", result.path);
    println!("Namespaces: {}", result.namespaces.join(", "));
    println!();
    println!("Queue:");
    println!("  Pending: {}", result.pending);
    if result.malformed > 0 {
        println!("  Malformed: {}", result.malformed);
    }
    for (name, count) in &result.by_name {
        println!("    {name}: {count}");
    }
    println!();
    println!("User:");
    println!(
        "  Subject: {}",
        result.subject_id.as_deref().unwrap_or("(none)")
    );
    if let Some(external_id) = &result.external_id {
        println!("  External id: {external_id}");
    }
    println!("  Subscriptions: {}", result.subscriptions);

    if let Some(stores) = &result.stores {
        println!();
        println!("Stores:");
        for store in stores {
            println!(
                "  {}: {} members, {} bytes",
                store.name, store.members, store.bytes
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsync_storage::InMemoryPreferences;
    use opsync_user::UserStores;

    #[test]
    fn counts_pending_and_malformed() {
        let prefs: Arc<dyn PreferenceStore> = Arc::new(InMemoryPreferences::new());
        prefs
            .save_string(
                PREFS_NAMESPACE,
                &storage_key(OPERATION_STORE_NAME),
                r#"[{"id":"a","name":"set-tag","appId":"app","subjectId":"u","key":"k","value":"v"},{"id":"b","name":"unknown"}]"#,
            )
            .unwrap();
        {
            let stores = UserStores::open(prefs.clone()).unwrap();
            stores.identity().set_subject_id("u").unwrap();
        }

        let result = collect(prefs, true).unwrap();
        assert_eq!(result.pending, 1);
        assert_eq!(result.malformed, 1);
        assert_eq!(result.by_name.get("set-tag"), Some(&1));
        assert_eq!(result.subject_id.as_deref(), Some("u"));
        let stores = result.stores.unwrap();
        assert!(stores.iter().any(|s| s.name == "operations" && s.members == 2));
        assert!(stores.iter().any(|s| s.name == "identity" && s.members == 1));
    }

    #[test]
    fn empty_directory_reports_nothing() {
        let prefs: Arc<dyn PreferenceStore> = Arc::new(InMemoryPreferences::new());
        let result = collect(prefs, false).unwrap();
        assert_eq!(result.pending, 0);
        assert_eq!(result.subject_id, None);
        assert!(result.stores.is_none());
    }
}
