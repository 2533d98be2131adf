mod error;
pub use error::ModelError;

mod job_id;
pub use job_id::JobId;

mod job;
pub use job::{Job, JobPayload};

mod execution;
pub use execution::{ExecutionMode, ExecutionRecord, ExecutionStatus};

mod workflow;
pub use workflow::WorkflowMeta;

mod result;
pub use result::{ErrorDescriptor, ExecutionResult};

mod running;
pub use running::RunningJobSummary;

mod fleet;
pub use fleet::{FleetEvent, WorkerStatus};

mod time_serde;

/// Identifier of a stored execution record.
pub type ExecutionId = String;

/// Identifier of a stored workflow.
pub type WorkflowId = String;

/// Identifier of a worker node inside the fleet.
pub type WorkerId = String;
