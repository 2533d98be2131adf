use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{ExecutionId, ExecutionMode, ExecutionStatus, JobId, WorkflowId};

/// Read-only view of a job this worker is currently executing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningJobSummary {
    pub job_id: JobId,
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub workflow_name: String,
    pub mode: ExecutionMode,
    #[serde(with = "crate::domain::time_serde")]
    pub started_at: SystemTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<ExecutionId>,
    pub status: ExecutionStatus,
}
