use std::sync::Arc;

use async_trait::async_trait;
use hive_core::{FleetGateway, HealthCheck, HealthReport};
use hive_model::{JobId, RunningJobSummary, WorkerStatus};

use crate::{error::ApiError, handler::ApiHandler};

/// Serves [`ApiHandler`] from a worker's health check and fleet gateway.
pub struct WorkerApiAdapter {
    health: Arc<HealthCheck>,
    fleet: Arc<FleetGateway>,
}

impl WorkerApiAdapter {
    pub fn new(health: Arc<HealthCheck>, fleet: Arc<FleetGateway>) -> Self {
        Self { health, fleet }
    }
}

#[async_trait]
impl ApiHandler for WorkerApiAdapter {
    async fn health(&self) -> HealthReport {
        self.health.probe().await
    }

    async fn worker_status(&self) -> Result<WorkerStatus, ApiError> {
        Ok(self.fleet.status())
    }

    async fn running_job_ids(&self) -> Result<Vec<JobId>, ApiError> {
        Ok(self.fleet.running_job_ids())
    }

    async fn running_jobs(&self) -> Result<Vec<RunningJobSummary>, ApiError> {
        Ok(self.fleet.running_job_summaries())
    }
}
