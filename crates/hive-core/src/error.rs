use hive_model::{ExecutionId, JobId, WorkflowId};
use thiserror::Error;

/// Errors raised by the worker core itself.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("job {0} is already registered")]
    DuplicateJob(JobId),
    #[error("shutdown already in progress")]
    AlreadyDraining,
    #[error("pre-shutdown hook failed: {0}")]
    ShutdownHook(String),
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("event log error: {0}")]
    EventLog(String),
}

/// Errors surfaced by the job queue transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// Broker refused the connection or is unreachable.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
    /// One-time transport setup failed; reconnecting cannot fix it.
    #[error("transport initialization failed: {0}")]
    InitializationFailed(String),
    #[error("{0}")]
    Other(String),
}

impl QueueError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            QueueError::ConnectionRefused(_) => "connection_refused",
            QueueError::InitializationFailed(_) => "initialization_failed",
            QueueError::Other(_) => "other",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
}

/// Errors returned by an execution adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecError {
    #[error("cancelled")]
    Cancelled,
    #[error("execution infrastructure failure: {0}")]
    Infrastructure(String),
}

/// Hard failure of a single job, handed to the queue instead of a result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobFailure {
    #[error("worker failed to find data for execution {0}")]
    ExecutionNotFound(ExecutionId),
    #[error("worker failed to find workflow {0}")]
    WorkflowNotFound(WorkflowId),
    #[error("job {0} is already running on this worker")]
    AlreadyRunning(JobId),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Execution(String),
}

impl JobFailure {
    /// Whether the queue may deliver the job again.
    ///
    /// Missing records never appear on retry, so only infrastructure faults qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, JobFailure::Storage(_) | JobFailure::Execution(_))
    }
}
