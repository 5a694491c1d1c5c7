//! Dump queue command implementation.

use super::{open_prefs, open_queue};
use opsync_engine::Operation;
use opsync_storage::PreferenceStore;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// One pending operation as shown by the CLI.
#[derive(Debug, Serialize)]
pub struct QueueEntry {
    /// Position in the queue, zero-based.
    pub position: usize,
    /// Operation id.
    pub id: String,
    /// Operation name.
    pub name: String,
    /// User the operation targets.
    pub subject_id: String,
    /// Key used to batch with creates.
    pub create_key: String,
    /// Key used to batch with alters.
    pub modify_key: String,
    /// Grouping rule.
    pub group: String,
    /// Whether every id the operation depends on is known to the backend.
    pub ready: bool,
    /// Full payload.
    pub payload: serde_json::Value,
}

/// Runs the dump-queue command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    offset: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let prefs = open_prefs(path)?;
    let entries = collect(prefs, limit, offset)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            print_text_output(&entries);
        }
    }

    Ok(())
}

/// Reads pending operations in queue order.
pub fn collect(
    prefs: Arc<dyn PreferenceStore>,
    limit: Option<usize>,
    offset: usize,
) -> Result<Vec<QueueEntry>, Box<dyn std::error::Error>> {
    let queue = open_queue(prefs)?;
    let entries = queue
        .list()
        .into_iter()
        .enumerate()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .map(|(position, queued)| {
            let op = &queued.operation;
            QueueEntry {
                position,
                id: queued.id.clone(),
                name: op.name().to_string(),
                subject_id: op.subject_id().to_string(),
                create_key: op.create_comparison_key(),
                modify_key: op.modify_comparison_key(),
                group: format!("{:?}", op.group_comparison_type()).to_uppercase(),
                ready: op.can_start_execute(),
                payload: serde_json::to_value(op).unwrap_or_default(),
            }
        })
        .collect();
    Ok(entries)
}

fn print_text_output(entries: &[QueueEntry]) {
    if entries.is_empty() {
        println!("Queue is empty");
        return;
    }

    println!(
        "{:<5} {:<38} {:<22} {:<7} {:<6} KEY",
        "POS", "ID", "NAME", "GROUP", "READY"
    );
    for entry in entries {
        let key = if entry.modify_key.is_empty() {
            &entry.create_key
        } else {
            &entry.modify_key
        };
        println!(
            "{:<5} {:<38} {:<22} {:<7} {:<6} {}",
            entry.position,
            entry.id,
            entry.name,
            entry.group,
            if entry.ready { "yes" } else { "no" },
            key
        );
    }
}
