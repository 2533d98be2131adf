use serde::{Deserialize, Serialize};

use crate::{ExecutionId, JobId};

/// What a job asks the worker to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    /// Stored execution to run.
    pub execution_id: ExecutionId,
    /// Reload the workflow's static data from storage before execution.
    #[serde(default)]
    pub load_static_data: bool,
}

/// A delivered unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub payload: JobPayload,
}

impl Job {
    pub fn new(id: impl Into<JobId>, execution_id: impl Into<ExecutionId>) -> Self {
        Self {
            id: id.into(),
            payload: JobPayload {
                execution_id: execution_id.into(),
                load_static_data: false,
            },
        }
    }

    pub fn with_static_data(mut self) -> Self {
        self.payload.load_static_data = true;
        self
    }
}
