use std::sync::Arc;

use async_trait::async_trait;
use hive_model::{ExecutionResult, Job, JobId};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::{JobFailure, QueueError};

/// Out-of-band message broadcast by the queue to every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueSignal {
    /// Abort the job with this id if it runs here.
    Cancel { job_id: JobId },
}

/// Per-job callback the queue invokes for every delivered job.
///
/// `Ok` completes the job (even when the result carries an error);
/// `Err` is a hard failure subject to the queue's retry policy.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: Job) -> Result<ExecutionResult, JobFailure>;
}

/// Consumed interface of the shared job queue.
#[async_trait]
pub trait JobQueue: Send + Sync + 'static {
    /// Start delivering jobs; the queue keeps at most `concurrency` handler calls in flight.
    async fn subscribe(
        &self,
        concurrency: usize,
        handler: Arc<dyn JobHandler>,
    ) -> Result<(), QueueError>;

    /// Forward an intermediate payload for a running job.
    async fn report_progress(&self, job_id: &JobId, payload: Value) -> Result<(), QueueError>;

    /// Stop delivering new jobs; jobs already handed out are unaffected.
    async fn pause_intake(&self) -> Result<(), QueueError>;

    /// Trivial round trip to the broker.
    async fn ping(&self) -> Result<(), QueueError>;

    /// Transport errors, in the order they occur.
    fn subscribe_errors(&self) -> broadcast::Receiver<QueueError>;

    /// Out-of-band signals keyed by job id.
    fn subscribe_signals(&self) -> broadcast::Receiver<QueueSignal>;
}
