use std::{sync::Arc, time::SystemTime};

use async_trait::async_trait;
use hive_model::{ExecutionRecord, ExecutionResult, JobId, WorkflowMeta};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{error::ExecError, queue::JobQueue};

/// Everything the execution engine needs for one job.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub job_id: JobId,
    pub execution: ExecutionRecord,
    /// Workflow metadata; `static_data` is set only when the job asked for a reload.
    pub workflow: WorkflowMeta,
    /// Soft deadline; enforcing it is up to the adapter.
    pub deadline: Option<SystemTime>,
    /// Cancelled when the job is aborted; the adapter must unwind promptly.
    pub cancel: CancellationToken,
}

/// What the adapter hands back after a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub result: ExecutionResult,
    /// Static data after the run, when the engine changed it.
    pub static_data: Option<Value>,
}

impl ExecutionReport {
    pub fn new(result: ExecutionResult) -> Self {
        Self {
            result,
            static_data: None,
        }
    }

    pub fn with_static_data(mut self, data: Value) -> Self {
        self.static_data = Some(data);
        self
    }
}

/// Capability for emitting intermediate responses while a job runs.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn emit(&self, payload: Value);
}

/// External task-execution engine.
#[async_trait]
pub trait ExecutionAdapter: Send + Sync + 'static {
    async fn execute(
        &self,
        request: ExecutionRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<ExecutionReport, ExecError>;
}

/// Forwards progress payloads to the queue, keyed by job id.
pub struct QueueProgress {
    queue: Arc<dyn JobQueue>,
    job_id: JobId,
}

impl QueueProgress {
    pub fn new(queue: Arc<dyn JobQueue>, job_id: JobId) -> Self {
        Self { queue, job_id }
    }
}

#[async_trait]
impl ProgressSink for QueueProgress {
    async fn emit(&self, payload: Value) {
        // Progress is advisory; losing one update must not fail the job.
        if let Err(e) = self.queue.report_progress(&self.job_id, payload).await {
            warn!(job_id = %self.job_id, error = %e, "failed to report job progress");
        }
    }
}
