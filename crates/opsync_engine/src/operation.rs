//! The operation contract and its persisted envelope.

use opsync_core::{CoreError, CoreResult, ModelStore, StoreModel};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;

/// Name of the store holding pending operations.
pub const OPERATION_STORE_NAME: &str = "operations";

/// How an operation may be batched with others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupComparisonType {
    /// Batches with every pending operation sharing its create key.
    Create,
    /// Batches with executable operations sharing its modify key.
    Alter,
    /// Always runs alone.
    None,
}

/// A serializable unit of intended change against backend state.
///
/// Every method must be a pure function of the payload.
pub trait Operation:
    Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Every name this type can take. Each needs a registered executor.
    const NAMES: &'static [&'static str];

    /// Executor routing discriminator.
    fn name(&self) -> &str;

    /// Key shared by operations that may ride along with a create.
    fn create_comparison_key(&self) -> String;

    /// Key shared by operations that may be merged into one update.
    fn modify_comparison_key(&self) -> String;

    /// How this operation batches.
    fn group_comparison_type(&self) -> GroupComparisonType;

    /// False while any id this operation depends on is still local.
    fn can_start_execute(&self) -> bool;

    /// Backend record this operation touches.
    fn apply_to_record_id(&self) -> String;

    /// Rewrites local ids found in `map` to their backend ids.
    fn translate_ids(&mut self, map: &HashMap<String, String>);

    /// Returns the key used for batching under this operation's group type.
    fn grouping_key(&self) -> Option<String> {
        let key = match self.group_comparison_type() {
            GroupComparisonType::Create => self.create_comparison_key(),
            GroupComparisonType::Alter => self.modify_comparison_key(),
            GroupComparisonType::None => return None,
        };
        (!key.is_empty()).then_some(key)
    }
}

/// An operation plus the id assigned at enqueue time.
///
/// Persisted as the operation's own JSON object with an extra `id` field,
/// so operation payloads must not use that field name.
#[derive(Debug, Clone)]
pub struct QueuedOperation<O> {
    /// Queue id, a uuid.
    pub id: String,
    /// The operation itself.
    pub operation: O,
}

impl<O: Operation> QueuedOperation<O> {
    /// Wraps `operation` with a fresh id.
    #[must_use]
    pub fn new(operation: O) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation,
        }
    }
}

impl<O: Operation> StoreModel for QueuedOperation<O> {
    fn model_id(&self) -> Option<String> {
        Some(self.id.clone())
    }

    fn to_json(&self) -> Value {
        let mut object = match serde_json::to_value(&self.operation) {
            Ok(Value::Object(object)) => object,
            Ok(_) => {
                tracing::error!(id = %self.id, "operation does not serialize to an object");
                serde_json::Map::new()
            }
            Err(err) => {
                tracing::error!(id = %self.id, error = %err, "operation failed to serialize");
                serde_json::Map::new()
            }
        };
        object.insert("id".to_string(), Value::String(self.id.clone()));
        Value::Object(object)
    }

    fn from_json(value: Value) -> CoreResult<Self> {
        let Value::Object(mut object) = value else {
            return Err(CoreError::InvalidModel("queued operation is not an object".into()));
        };
        let id = match object.remove("id") {
            Some(Value::String(id)) => id,
            _ => return Err(CoreError::InvalidModel("queued operation has no id".into())),
        };
        let operation = serde_json::from_value(Value::Object(object))?;
        Ok(Self { id, operation })
    }
}

/// The persisted store of pending operations.
pub type OperationStore<O> = ModelStore<QueuedOperation<O>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestOp;
    use serde_json::json;

    #[test]
    fn envelope_round_trip() {
        let queued = QueuedOperation {
            id: "q1".into(),
            operation: TestOp::alter("local-1", 3),
        };
        let json = queued.to_json();
        assert_eq!(json, json!({"name": "alter", "record": "local-1", "seq": 3, "id": "q1"}));

        let back = QueuedOperation::<TestOp>::from_json(json).unwrap();
        assert_eq!(back.id, "q1");
        assert_eq!(back.operation, TestOp::alter("local-1", 3));
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = QueuedOperation::<TestOp>::from_json(json!({"id": "q", "name": "nope"})).unwrap_err();
        assert!(matches!(err, CoreError::Serialization(_)));

        let err = QueuedOperation::<TestOp>::from_json(json!({"name": "solo", "record": "r", "seq": 1}))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidModel(_)));
    }

    #[test]
    fn grouping_key_follows_group_type() {
        assert_eq!(TestOp::create("r").grouping_key().as_deref(), Some("app.Record.r"));
        assert_eq!(TestOp::alter("r", 1).grouping_key().as_deref(), Some("app.Record.r"));
        assert_eq!(TestOp::solo("r", 1).grouping_key(), None);
    }
}
