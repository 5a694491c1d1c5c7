//! Minimal operation type for unit tests.

use crate::operation::{GroupComparisonType, Operation};
use opsync_core::is_local_id;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub(crate) enum TestOp {
    Create { record: String },
    Alter { record: String, seq: u32 },
    Solo { record: String, seq: u32 },
}

impl TestOp {
    pub(crate) fn create(record: &str) -> Self {
        Self::Create {
            record: record.into(),
        }
    }

    pub(crate) fn alter(record: &str, seq: u32) -> Self {
        Self::Alter {
            record: record.into(),
            seq,
        }
    }

    pub(crate) fn solo(record: &str, seq: u32) -> Self {
        Self::Solo {
            record: record.into(),
            seq,
        }
    }

    fn record(&self) -> &str {
        match self {
            Self::Create { record } | Self::Alter { record, .. } | Self::Solo { record, .. } => {
                record
            }
        }
    }
}

impl Operation for TestOp {
    const NAMES: &'static [&'static str] = &["create", "alter", "solo"];

    fn name(&self) -> &str {
        match self {
            Self::Create { .. } => "create",
            Self::Alter { .. } => "alter",
            Self::Solo { .. } => "solo",
        }
    }

    fn create_comparison_key(&self) -> String {
        format!("app.Record.{}", self.record())
    }

    fn modify_comparison_key(&self) -> String {
        match self {
            Self::Create { .. } => String::new(),
            _ => format!("app.Record.{}", self.record()),
        }
    }

    fn group_comparison_type(&self) -> GroupComparisonType {
        match self {
            Self::Create { .. } => GroupComparisonType::Create,
            Self::Alter { .. } => GroupComparisonType::Alter,
            Self::Solo { .. } => GroupComparisonType::None,
        }
    }

    fn can_start_execute(&self) -> bool {
        matches!(self, Self::Create { .. }) || !is_local_id(self.record())
    }

    fn apply_to_record_id(&self) -> String {
        self.record().to_string()
    }

    fn translate_ids(&mut self, map: &HashMap<String, String>) {
        let record = match self {
            Self::Create { record } | Self::Alter { record, .. } | Self::Solo { record, .. } => {
                record
            }
        };
        if let Some(backend) = map.get(record.as_str()) {
            *record = backend.clone();
        }
    }
}
