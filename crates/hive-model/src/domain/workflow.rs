use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::WorkflowId;

/// Minimal workflow metadata the worker needs around an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMeta {
    pub id: WorkflowId,
    pub name: String,
    /// Owner the authorization check is evaluated against.
    pub owner_id: String,
    /// Per-workflow soft timeout, overriding the worker default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Mutable state persisted between executions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_data: Option<Value>,
}

impl WorkflowMeta {
    pub fn new(
        id: impl Into<WorkflowId>,
        name: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner_id: owner_id.into(),
            timeout_secs: None,
            static_data: None,
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_static_data(mut self, data: Value) -> Self {
        self.static_data = Some(data);
        self
    }
}
