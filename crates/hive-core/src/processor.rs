use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use async_trait::async_trait;
use hive_model::{ErrorDescriptor, ExecutionId, ExecutionResult, ExecutionStatus, Job};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    adapter::{ExecutionAdapter, ExecutionRequest, ProgressSink, QueueProgress},
    error::{ExecError, JobFailure},
    metrics::{JobOutcome, MetricsHandle, noop_metrics},
    queue::{JobHandler, JobQueue},
    registry::{RunningJobEntry, RunningJobRegistry},
    storage::{AuthDecision, Authorizer, Storage},
};

/// Runs one delivered job end to end.
///
/// Business failures (authorization denial, cancellation, a failed run) come back as an
/// [`ExecutionResult`] so the queue completes the job. Only missing records and
/// infrastructure faults are returned as [`JobFailure`].
pub struct JobProcessor {
    registry: RunningJobRegistry,
    queue: Arc<dyn JobQueue>,
    storage: Arc<dyn Storage>,
    authorizer: Arc<dyn Authorizer>,
    adapter: Arc<dyn ExecutionAdapter>,
    metrics: MetricsHandle,
    execution_timeout: Option<Duration>,
}

impl JobProcessor {
    pub fn new(
        registry: RunningJobRegistry,
        queue: Arc<dyn JobQueue>,
        storage: Arc<dyn Storage>,
        authorizer: Arc<dyn Authorizer>,
        adapter: Arc<dyn ExecutionAdapter>,
    ) -> Self {
        Self {
            registry,
            queue,
            storage,
            authorizer,
            adapter,
            metrics: noop_metrics(),
            execution_timeout: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.execution_timeout = timeout;
        self
    }

    #[instrument(
        level = "debug",
        skip(self, job),
        fields(job_id = %job.id, execution_id = %job.payload.execution_id)
    )]
    pub async fn process(&self, job: Job) -> Result<ExecutionResult, JobFailure> {
        let execution_id = job.payload.execution_id.clone();

        let execution = self
            .storage
            .find_execution(&execution_id, true)
            .await?
            .ok_or_else(|| JobFailure::ExecutionNotFound(execution_id.clone()))?;

        self.storage
            .update_execution_status(&execution_id, ExecutionStatus::Running)
            .await?;

        let mut workflow = execution.workflow.clone();
        workflow.static_data = None;
        if job.payload.load_static_data {
            let stored = self
                .storage
                .find_workflow(&workflow.id)
                .await?
                .ok_or_else(|| JobFailure::WorkflowNotFound(workflow.id.clone()))?;
            workflow.static_data = stored.static_data;
        }

        if let AuthDecision::Denied { reason } = self
            .authorizer
            .check(&workflow, &workflow.owner_id)
            .await?
        {
            warn!(workflow_id = %workflow.id, %reason, "execution not authorized");
            self.storage
                .update_execution_status(&execution_id, ExecutionStatus::Error)
                .await?;
            self.metrics
                .job_finished(JobOutcome::CompletedWithError, Duration::ZERO);
            return Ok(ExecutionResult::completed_with(ErrorDescriptor::new(
                ErrorDescriptor::AUTHORIZATION,
                reason,
            )));
        }

        let cancel = CancellationToken::new();
        let entry = RunningJobEntry::for_execution(job.id.clone(), &execution, cancel.clone());
        let guard = self
            .registry
            .register(entry)
            .map_err(|_| JobFailure::AlreadyRunning(job.id.clone()))?;
        self.metrics.job_started();
        self.metrics.running_jobs(self.registry.len());

        let deadline = workflow
            .timeout_secs
            .map(Duration::from_secs)
            .or(self.execution_timeout)
            .map(|timeout| SystemTime::now() + timeout);

        info!(
            workflow_id = %workflow.id,
            mode = %execution.mode,
            "starting execution"
        );

        let reload_static_data = job.payload.load_static_data;
        let workflow_id = workflow.id.clone();
        let request = ExecutionRequest {
            job_id: job.id.clone(),
            execution,
            workflow,
            deadline,
            cancel,
        };
        let progress: Arc<dyn ProgressSink> =
            Arc::new(QueueProgress::new(Arc::clone(&self.queue), job.id.clone()));

        let started = Instant::now();
        let outcome = self.adapter.execute(request, progress).await;
        drop(guard);
        self.metrics.running_jobs(self.registry.len());
        let elapsed = started.elapsed();

        let (result, status, label) = match outcome {
            Ok(report) => {
                if reload_static_data && let Some(data) = report.static_data {
                    if let Err(e) = self
                        .storage
                        .update_workflow_static_data(&workflow_id, data)
                        .await
                    {
                        warn!(%workflow_id, error = %e, "failed to persist workflow static data");
                    }
                }
                if report.result.success {
                    let label = match report.result.error {
                        Some(_) => JobOutcome::CompletedWithError,
                        None => JobOutcome::Succeeded,
                    };
                    (report.result, ExecutionStatus::Success, label)
                } else {
                    (report.result, ExecutionStatus::Error, JobOutcome::CompletedWithError)
                }
            }
            Err(ExecError::Cancelled) => (
                ExecutionResult::failed(ErrorDescriptor::new(
                    ErrorDescriptor::CANCELLED,
                    "execution was cancelled",
                )),
                ExecutionStatus::Canceled,
                JobOutcome::Cancelled,
            ),
            Err(ExecError::Infrastructure(reason)) => {
                error!(%reason, "execution adapter failed");
                self.persist_status(&execution_id, ExecutionStatus::Error).await;
                self.metrics.job_finished(JobOutcome::Failed, elapsed);
                return Err(JobFailure::Execution(reason));
            }
        };

        self.persist_status(&execution_id, status).await;
        self.metrics.job_finished(label, elapsed);
        debug!(
            outcome = label.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "execution settled"
        );
        Ok(result)
    }

    /// Best-effort final status write.
    async fn persist_status(&self, execution_id: &ExecutionId, status: ExecutionStatus) {
        if let Err(e) = self
            .storage
            .update_execution_status(execution_id, status)
            .await
        {
            warn!(error = %e, ?status, "failed to persist final execution status");
        }
    }
}

#[async_trait]
impl JobHandler for JobProcessor {
    async fn handle(&self, job: Job) -> Result<ExecutionResult, JobFailure> {
        let job_id = job.id.clone();
        self.process(job).await.inspect_err(|e| {
            error!(%job_id, error = %e, retryable = e.is_retryable(), "job failed");
        })
    }
}
