use std::{sync::Arc, time::Duration};

use tokio::{
    sync::broadcast::{self, error::RecvError},
    time::{Instant, sleep},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::{
    adapter::ExecutionAdapter,
    cancel::CancellationListener,
    classifier::{ConnectionHealthClassifier, Verdict},
    config::WorkerConfig,
    error::{CoreError, QueueError},
    exit::ExitReason,
    fleet::{EventLog, FleetGateway, NoopEventLog},
    health::HealthCheck,
    intake::JobIntake,
    metrics::{MetricsHandle, noop_metrics},
    processor::JobProcessor,
    queue::{JobHandler, JobQueue},
    registry::RunningJobRegistry,
    shutdown::{DrainOutcome, ShutdownController, ShutdownHook},
    storage::{Authorizer, Storage},
    system,
};

const SUBSCRIBE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Builder for a [`Worker`].
pub struct WorkerBuilder {
    config: WorkerConfig,
    queue: Arc<dyn JobQueue>,
    storage: Arc<dyn Storage>,
    authorizer: Arc<dyn Authorizer>,
    adapter: Arc<dyn ExecutionAdapter>,
    events: Arc<dyn EventLog>,
    worker_id: Option<String>,
    metrics: MetricsHandle,
    hooks: Vec<Arc<dyn ShutdownHook>>,
}

impl WorkerBuilder {
    pub fn new(
        config: WorkerConfig,
        queue: Arc<dyn JobQueue>,
        storage: Arc<dyn Storage>,
        authorizer: Arc<dyn Authorizer>,
        adapter: Arc<dyn ExecutionAdapter>,
    ) -> Self {
        Self {
            config,
            queue,
            storage,
            authorizer,
            adapter,
            events: Arc::new(NoopEventLog),
            worker_id: None,
            metrics: noop_metrics(),
            hooks: Vec::new(),
        }
    }

    pub fn event_log(mut self, events: Arc<dyn EventLog>) -> Self {
        self.events = events;
        self
    }

    pub fn worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = Some(id.into());
        self
    }

    pub fn metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn shutdown_hook(mut self, hook: Arc<dyn ShutdownHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> Result<Worker, CoreError> {
        self.config.validate()?;

        let registry = RunningJobRegistry::new();
        let worker_id = self.worker_id.unwrap_or_else(system::resolve_worker_id);

        let processor = JobProcessor::new(
            registry.clone(),
            Arc::clone(&self.queue),
            Arc::clone(&self.storage),
            self.authorizer,
            self.adapter,
        )
        .with_metrics(Arc::clone(&self.metrics))
        .with_execution_timeout(self.config.execution_timeout);

        let fleet = Arc::new(FleetGateway::new(worker_id, registry.clone(), self.events));
        let intake = Arc::new(JobIntake::new(Arc::clone(&self.queue)));
        // The stopping announcement runs first, after intake is paused.
        let shutdown = self.hooks.into_iter().fold(
            ShutdownController::new(registry.clone(), Arc::clone(&intake), &self.config)
                .with_hook(fleet.clone()),
            ShutdownController::with_hook,
        );

        Ok(Worker {
            fleet,
            health: Arc::new(HealthCheck::new(self.storage, Arc::clone(&self.queue))),
            processor: Arc::new(processor),
            shutdown: Arc::new(shutdown),
            queue: self.queue,
            metrics: self.metrics,
            config: self.config,
            registry,
            intake,
        })
    }
}

/// A worker node: intake, cancellation, connection health and shutdown in one lifecycle.
pub struct Worker {
    config: WorkerConfig,
    registry: RunningJobRegistry,
    queue: Arc<dyn JobQueue>,
    processor: Arc<JobProcessor>,
    intake: Arc<JobIntake>,
    fleet: Arc<FleetGateway>,
    health: Arc<HealthCheck>,
    shutdown: Arc<ShutdownController>,
    metrics: MetricsHandle,
}

enum Phase {
    ShutdownRequested,
    Fatal(ExitReason),
}

impl Worker {
    pub fn registry(&self) -> &RunningJobRegistry {
        &self.registry
    }

    pub fn fleet(&self) -> Arc<FleetGateway> {
        Arc::clone(&self.fleet)
    }

    pub fn health(&self) -> Arc<HealthCheck> {
        Arc::clone(&self.health)
    }

    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Run until `shutdown` fires or a fatal queue fault occurs.
    ///
    /// The returned reason carries the process exit code.
    #[instrument(level = "info", skip_all, fields(worker_id = %self.fleet.worker_id()))]
    pub async fn run(self, shutdown: CancellationToken) -> ExitReason {
        system::init_uptime();

        let mut errors = self.queue.subscribe_errors();
        let signals = self.queue.subscribe_signals();
        let mut classifier = ConnectionHealthClassifier::from_config(&self.config)
            .with_metrics(Arc::clone(&self.metrics));

        if let Err(reason) = self.start_intake(&mut classifier, &shutdown).await {
            return reason;
        }

        if let Err(e) = self.fleet.announce_started().await {
            warn!(error = %e, "failed to announce worker start");
        }

        let listener_stop = CancellationToken::new();
        let listener = CancellationListener::new(self.registry.clone())
            .with_metrics(Arc::clone(&self.metrics));
        let listener_task = tokio::spawn(listener.run(signals, listener_stop.clone()));

        info!(concurrency = self.config.concurrency, "worker ready for jobs");

        let phase = tokio::select! {
            _ = shutdown.cancelled() => Phase::ShutdownRequested,
            Some(reason) = next_fatal(&mut errors, &mut classifier) => Phase::Fatal(reason),
        };

        let reason = match phase {
            Phase::Fatal(reason) => reason,
            Phase::ShutdownRequested => tokio::select! {
                reason = self.drain() => reason,
                Some(reason) = next_fatal(&mut errors, &mut classifier) => reason,
            },
        };

        listener_stop.cancel();
        let _ = listener_task.await;

        info!(%reason, code = reason.code(), "worker stopped");
        reason
    }

    async fn start_intake(
        &self,
        classifier: &mut ConnectionHealthClassifier,
        shutdown: &CancellationToken,
    ) -> Result<(), ExitReason> {
        let handler: Arc<dyn JobHandler> = self.processor.clone();
        loop {
            match self
                .intake
                .start(self.config.concurrency, Arc::clone(&handler))
                .await
            {
                Ok(()) => return Ok(()),
                Err(CoreError::Queue(err)) => {
                    if let Verdict::Fatal(reason) = classifier.classify(&err, Instant::now()) {
                        return Err(reason);
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to start job intake");
                    return Err(ExitReason::Crash(e.to_string()));
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => return Err(ExitReason::Drained),
                _ = sleep(SUBSCRIBE_RETRY_DELAY) => {}
            }
        }
    }

    async fn drain(&self) -> ExitReason {
        match self.shutdown.shutdown().await {
            Ok(DrainOutcome::Drained { .. }) => ExitReason::Drained,
            Ok(DrainOutcome::DeadlineExceeded { remaining }) => {
                ExitReason::ForcedAfterDeadline { remaining }
            }
            Err(e) => {
                error!(error = %e, "shutdown failed");
                ExitReason::Crash(e.to_string())
            }
        }
    }
}

/// Wait for the first fatal verdict on the error stream; `None` once the stream closes.
async fn next_fatal(
    errors: &mut broadcast::Receiver<QueueError>,
    classifier: &mut ConnectionHealthClassifier,
) -> Option<ExitReason> {
    loop {
        match errors.recv().await {
            Ok(err) => {
                if let Verdict::Fatal(reason) = classifier.classify(&err, Instant::now()) {
                    return Some(reason);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "queue error stream lagged");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}
