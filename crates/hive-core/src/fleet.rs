use std::sync::Arc;

use async_trait::async_trait;
use hive_model::{FleetEvent, JobId, RunningJobSummary, WorkerId, WorkerStatus};
use tracing::{debug, info, warn};

use crate::{
    error::CoreError,
    registry::RunningJobRegistry,
    shutdown::{HookError, ShutdownHook},
    system,
};

/// Shared event log consumed by cluster controllers.
#[async_trait]
pub trait EventLog: Send + Sync + 'static {
    async fn publish(&self, event: &FleetEvent) -> Result<(), CoreError>;
}

/// Event log for standalone workers; events only reach the local log.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventLog;

#[async_trait]
impl EventLog for NoopEventLog {
    async fn publish(&self, event: &FleetEvent) -> Result<(), CoreError> {
        debug!(event = event.name(), "fleet event not published (no event log)");
        Ok(())
    }
}

/// The worker's face towards the fleet: lifecycle events out, status queries in.
///
/// Queries read the registry under its lock, so each answer is consistent at the
/// moment it was taken.
pub struct FleetGateway {
    worker_id: WorkerId,
    registry: RunningJobRegistry,
    events: Arc<dyn EventLog>,
}

impl FleetGateway {
    pub fn new(
        worker_id: impl Into<WorkerId>,
        registry: RunningJobRegistry,
        events: Arc<dyn EventLog>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            registry,
            events,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub async fn announce_started(&self) -> Result<(), CoreError> {
        self.publish(FleetEvent::WorkerStarted {
            worker_id: self.worker_id.clone(),
        })
        .await
    }

    pub async fn announce_stopping(&self) -> Result<(), CoreError> {
        self.publish(FleetEvent::WorkerStopping {
            worker_id: self.worker_id.clone(),
        })
        .await
    }

    pub fn running_job_ids(&self) -> Vec<JobId> {
        self.registry.list_ids()
    }

    pub fn running_job_summaries(&self) -> Vec<RunningJobSummary> {
        self.registry.snapshot()
    }

    pub fn status(&self) -> WorkerStatus {
        WorkerStatus {
            worker_id: self.worker_id.clone(),
            running_jobs: self.registry.snapshot(),
            uptime_secs: system::uptime_seconds(),
            platform: system::platform().to_string(),
            arch: system::arch().to_string(),
            os: system::os_info(),
            hostname: system::hostname(),
        }
    }

    async fn publish(&self, event: FleetEvent) -> Result<(), CoreError> {
        self.events.publish(&event).await?;
        info!(event = event.name(), worker_id = %self.worker_id, "fleet event published");
        Ok(())
    }
}

/// Announces `worker.stopping` once intake is paused. Publish failures never abort the shutdown.
#[async_trait]
impl ShutdownHook for FleetGateway {
    fn name(&self) -> &'static str {
        "fleet-announce-stopping"
    }

    async fn before_shutdown(&self) -> Result<(), HookError> {
        if let Err(e) = self.announce_stopping().await {
            warn!(error = %e, "failed to announce worker shutdown");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RunningJobEntry;
    use hive_model::{ExecutionMode, ExecutionStatus};
    use std::{
        sync::Mutex,
        time::{Duration, UNIX_EPOCH},
    };
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<FleetEvent>>,
    }

    #[async_trait]
    impl EventLog for Recorder {
        async fn publish(&self, event: &FleetEvent) -> Result<(), CoreError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl EventLog for Broken {
        async fn publish(&self, _event: &FleetEvent) -> Result<(), CoreError> {
            Err(CoreError::EventLog("bus down".into()))
        }
    }

    fn add(registry: &RunningJobRegistry, id: &str, started_secs: u64) {
        registry
            .add(RunningJobEntry {
                job_id: JobId::from(id),
                execution_id: format!("e-{id}"),
                workflow_id: "wf".into(),
                workflow_name: "report".into(),
                mode: ExecutionMode::Webhook,
                started_at: UNIX_EPOCH + Duration::from_secs(started_secs),
                retry_of: None,
                status: ExecutionStatus::Running,
                cancel: CancellationToken::new(),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn announce_started_publishes_worker_identity() {
        let recorder = Arc::new(Recorder::default());
        let gateway = FleetGateway::new("node-1", RunningJobRegistry::new(), recorder.clone());

        gateway.announce_started().await.unwrap();

        let events = recorder.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![FleetEvent::WorkerStarted {
                worker_id: "node-1".into()
            }]
        );
    }

    #[tokio::test]
    async fn publish_errors_are_returned() {
        let gateway = FleetGateway::new("node-1", RunningJobRegistry::new(), Arc::new(Broken));
        assert!(matches!(
            gateway.announce_started().await,
            Err(CoreError::EventLog(_))
        ));
    }

    #[tokio::test]
    async fn stopping_hook_tolerates_publish_failure() {
        let gateway = FleetGateway::new("node-1", RunningJobRegistry::new(), Arc::new(Broken));
        assert!(gateway.before_shutdown().await.is_ok());

        let recorder = Arc::new(Recorder::default());
        let gateway = FleetGateway::new("node-1", RunningJobRegistry::new(), recorder.clone());
        gateway.before_shutdown().await.unwrap();
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec![FleetEvent::WorkerStopping {
                worker_id: "node-1".into()
            }]
        );
    }

    #[test]
    fn queries_reflect_registry() {
        let registry = RunningJobRegistry::new();
        let gateway = FleetGateway::new("node-1", registry.clone(), Arc::new(NoopEventLog));
        assert!(gateway.running_job_ids().is_empty());

        add(&registry, "b", 20);
        add(&registry, "a", 10);

        let ids: Vec<String> = gateway
            .running_job_ids()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        let summaries = gateway.running_job_summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].job_id.as_str(), "a");

        let status = gateway.status();
        assert_eq!(status.worker_id, "node-1");
        assert_eq!(status.running_jobs.len(), 2);
        assert!(!status.platform.is_empty());

        registry.cancel(&JobId::from("a"));
        assert_eq!(gateway.running_job_ids().len(), 1);
    }
}
