use serde::{Deserialize, Serialize};

use crate::{RunningJobSummary, WorkerId};

/// Lifecycle event published to the fleet's shared event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum FleetEvent {
    #[serde(rename = "worker.started")]
    WorkerStarted {
        #[serde(rename = "workerId")]
        worker_id: WorkerId,
    },
    #[serde(rename = "worker.stopping")]
    WorkerStopping {
        #[serde(rename = "workerId")]
        worker_id: WorkerId,
    },
}

impl FleetEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FleetEvent::WorkerStarted { .. } => "worker.started",
            FleetEvent::WorkerStopping { .. } => "worker.stopping",
        }
    }
}

/// Answer to a fleet-wide "what is this node doing" query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    pub worker_id: WorkerId,
    pub running_jobs: Vec<RunningJobSummary>,
    pub uptime_secs: u64,
    pub platform: String,
    pub arch: String,
    pub os: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}
