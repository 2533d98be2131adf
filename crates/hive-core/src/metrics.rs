use std::{sync::Arc, time::Duration};

/// How a job left the worker, as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    /// Completed, but the result carries a domain error.
    CompletedWithError,
    Cancelled,
    Failed,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Succeeded => "succeeded",
            JobOutcome::CompletedWithError => "completed_with_error",
            JobOutcome::Cancelled => "cancelled",
            JobOutcome::Failed => "failed",
        }
    }
}

/// Sink for worker metrics; implemented by `hive-prometheus`.
pub trait MetricsBackend: Send + Sync + 'static {
    fn job_started(&self);
    fn job_finished(&self, outcome: JobOutcome, duration: Duration);
    fn job_cancel_requested(&self);
    fn queue_error(&self, kind: &'static str);
    fn running_jobs(&self, count: usize);
}

pub type MetricsHandle = Arc<dyn MetricsBackend>;

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {
    fn job_started(&self) {}
    fn job_finished(&self, _outcome: JobOutcome, _duration: Duration) {}
    fn job_cancel_requested(&self) {}
    fn queue_error(&self, _kind: &'static str) {}
    fn running_jobs(&self, _count: usize) {}
}

pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoopMetrics)
}
