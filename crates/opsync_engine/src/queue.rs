//! In-memory pending list and batch selection.

use crate::new_records::NewRecordsState;
use crate::operation::{GroupComparisonType, Operation, QueuedOperation};
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// A pending operation plus its scheduling state.
#[derive(Debug)]
pub(crate) struct PendingItem<O> {
    pub operation: QueuedOperation<O>,
    pub waiters: Vec<oneshot::Sender<bool>>,
    pub bucket: u64,
    pub retries: u32,
    pub not_before: Option<Instant>,
    pub first_attempt: Option<Instant>,
}

impl<O: Operation> PendingItem<O> {
    pub fn new(operation: QueuedOperation<O>, bucket: u64) -> Self {
        Self {
            operation,
            waiters: Vec::new(),
            bucket,
            retries: 0,
            not_before: None,
            first_attempt: None,
        }
    }

    pub fn with_waiter(mut self, waiter: oneshot::Sender<bool>) -> Self {
        self.waiters.push(waiter);
        self
    }

    pub fn id(&self) -> &str {
        &self.operation.id
    }

    pub fn op(&self) -> &O {
        &self.operation.operation
    }

    fn backing_off(&self, now: Instant) -> bool {
        self.not_before.is_some_and(|t| t > now)
    }

    /// Resolves every waiter with `succeeded`.
    pub fn complete(&mut self, succeeded: bool) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(succeeded);
        }
    }
}

/// Pending operations in enqueue order.
#[derive(Debug)]
pub(crate) struct PendingQueue<O> {
    items: VecDeque<PendingItem<O>>,
}

impl<O: Operation> PendingQueue<O> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id() == id)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.items.iter().any(|item| item.op().name() == name)
    }

    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.id().to_string()).collect()
    }

    /// Appends `item` unless its id is already queued, in which case its
    /// waiters move to the queued item. Returns true if `item` was appended.
    pub fn push_back(&mut self, mut item: PendingItem<O>) -> bool {
        if let Some(queued) = self.items.iter_mut().find(|queued| queued.id() == item.id()) {
            queued.waiters.append(&mut item.waiters);
            return false;
        }
        self.items.push_back(item);
        true
    }

    /// Puts `items` at the front, keeping their relative order.
    pub fn push_front_all(&mut self, items: Vec<PendingItem<O>>) {
        for item in items.into_iter().rev() {
            if !self.contains(item.id()) {
                self.items.push_front(item);
            }
        }
    }

    /// Translates ids in place; returns the operations that changed.
    pub fn translate_ids(&mut self, map: &HashMap<String, String>) -> Vec<QueuedOperation<O>> {
        let mut changed = Vec::new();
        for item in &mut self.items {
            let before = serde_json::to_value(item.op()).ok();
            item.operation.operation.translate_ids(map);
            if serde_json::to_value(item.op()).ok() != before {
                changed.push(item.operation.clone());
            }
        }
        changed
    }

    pub fn clear_backoff(&mut self) {
        for item in &mut self.items {
            item.not_before = None;
        }
    }

    /// Drops every waiter so callers observe the repo going away.
    pub fn drop_waiters(&mut self) {
        for item in &mut self.items {
            item.waiters.clear();
        }
    }

    /// Returns the earliest moment a currently parked item may become
    /// eligible without any further enqueue.
    pub fn next_ready_at(&self, now: Instant, records: &NewRecordsState) -> Option<Instant> {
        self.items
            .iter()
            .filter_map(|item| {
                if item.backing_off(now) {
                    return item.not_before;
                }
                if !item.op().can_start_execute() {
                    return None;
                }
                records
                    .accessible_at(&item.op().apply_to_record_id())
                    .filter(|at| *at > now)
            })
            .min()
    }

    /// Removes and returns the next batch, head first.
    ///
    /// The head is the first item in bucket `bucket` or earlier that can
    /// start, whose record is accessible, and that is neither backing off
    /// nor behind a backing-off item for the same record.
    pub fn next_batch(
        &mut self,
        bucket: u64,
        now: Instant,
        records: &NewRecordsState,
    ) -> Option<Vec<PendingItem<O>>> {
        let mut fenced: HashSet<String> = HashSet::new();
        let mut head_index = None;
        for (index, item) in self.items.iter().enumerate() {
            let record = item.op().apply_to_record_id();
            if item.backing_off(now) {
                fenced.insert(record);
                continue;
            }
            if item.bucket > bucket
                || !item.op().can_start_execute()
                || !records.can_access(&record)
                || fenced.contains(&record)
            {
                continue;
            }
            head_index = Some(index);
            break;
        }

        let head = self.items.remove(head_index?)?;
        let mut batch = vec![head];
        let head_op = batch[0].op();
        let group = head_op.group_comparison_type();

        if let Some(key) = head_op.grouping_key() {
            let mut index = 0;
            while index < self.items.len() {
                let item = &self.items[index];
                let joins = !item.backing_off(now)
                    && records.can_access(&item.op().apply_to_record_id())
                    && match group {
                        GroupComparisonType::Create => item.op().create_comparison_key() == key,
                        GroupComparisonType::Alter => {
                            item.op().can_start_execute()
                                && item.op().modify_comparison_key() == key
                        }
                        GroupComparisonType::None => false,
                    };
                if joins {
                    if let Some(member) = self.items.remove(index) {
                        batch.push(member);
                    }
                } else {
                    index += 1;
                }
            }
        }
        Some(batch)
    }
}
