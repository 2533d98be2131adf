use async_trait::async_trait;
use hive_core::HealthReport;
use hive_model::{JobId, RunningJobSummary, WorkerStatus};

use crate::error::ApiError;

/// Read-side API of a worker node.
///
/// [`WorkerApiAdapter`](crate::WorkerApiAdapter) serves it straight from the running worker;
/// custom handlers can wrap it with auth or caching.
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Liveness of the worker's storage and queue.
    async fn health(&self) -> HealthReport;

    async fn worker_status(&self) -> Result<WorkerStatus, ApiError>;

    async fn running_job_ids(&self) -> Result<Vec<JobId>, ApiError>;

    async fn running_jobs(&self) -> Result<Vec<RunningJobSummary>, ApiError>;
}
