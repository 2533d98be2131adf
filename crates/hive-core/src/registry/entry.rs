use std::time::SystemTime;

use hive_model::{
    ExecutionId, ExecutionMode, ExecutionRecord, ExecutionStatus, JobId, RunningJobSummary,
    WorkflowId,
};
use tokio_util::sync::CancellationToken;

/// A job admitted past the concurrency gate, with its cancellation handle.
#[derive(Debug, Clone)]
pub struct RunningJobEntry {
    pub job_id: JobId,
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub workflow_name: String,
    pub mode: ExecutionMode,
    pub started_at: SystemTime,
    pub retry_of: Option<ExecutionId>,
    pub status: ExecutionStatus,
    pub cancel: CancellationToken,
}

impl RunningJobEntry {
    /// Entry for a job about to execute `execution`.
    pub fn for_execution(
        job_id: JobId,
        execution: &ExecutionRecord,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            job_id,
            execution_id: execution.id.clone(),
            workflow_id: execution.workflow.id.clone(),
            workflow_name: execution.workflow.name.clone(),
            mode: execution.mode,
            started_at: SystemTime::now(),
            retry_of: execution.retry_of.clone(),
            status: ExecutionStatus::Running,
            cancel,
        }
    }

    pub fn summary(&self) -> RunningJobSummary {
        RunningJobSummary {
            job_id: self.job_id.clone(),
            execution_id: self.execution_id.clone(),
            workflow_id: self.workflow_id.clone(),
            workflow_name: self.workflow_name.clone(),
            mode: self.mode,
            started_at: self.started_at,
            retry_of: self.retry_of.clone(),
            status: self.status,
        }
    }
}
