use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use hive_core::{
    Authorizer, CoreError, EventLog, ExecError, ExecutionAdapter, ExecutionReport,
    ExecutionRequest, ExitReason, JobFailure, JobHandler, ProgressSink, QueueError,
    RunningJobRegistry, ShutdownHook, Worker, WorkerBuilder, WorkerConfig,
    memory::{AllowAll, DenyOwners, MemoryQueue, MemoryStorage, Settlement},
    queue::JobQueue,
    shutdown::HookError,
};
use hive_model::{
    ErrorDescriptor, ExecutionMode, ExecutionRecord, ExecutionResult, ExecutionStatus, FleetEvent,
    Job, JobId, WorkflowMeta,
};
use serde_json::{Value, json};
use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;

/// Adapter that runs for a fixed time, reports progress and honours cancellation.
#[derive(Default)]
struct ScriptedAdapter {
    run_for: Duration,
    ignore_cancel: bool,
    infrastructure_error: Option<&'static str>,
    progress: Option<Value>,
    static_data: Option<Value>,
    calls: AtomicUsize,
    seen_static_data: Mutex<Vec<Option<Value>>>,
}

impl ScriptedAdapter {
    fn running_for(run_for: Duration) -> Self {
        Self {
            run_for,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ExecutionAdapter for ScriptedAdapter {
    async fn execute(
        &self,
        request: ExecutionRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<ExecutionReport, ExecError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_static_data
            .lock()
            .unwrap()
            .push(request.workflow.static_data.clone());

        if let Some(reason) = self.infrastructure_error {
            return Err(ExecError::Infrastructure(reason.into()));
        }

        if let Some(payload) = &self.progress {
            progress.emit(payload.clone()).await;
        }

        if self.ignore_cancel {
            sleep(self.run_for).await;
        } else {
            tokio::select! {
                _ = request.cancel.cancelled() => return Err(ExecError::Cancelled),
                _ = sleep(self.run_for) => {}
            }
        }

        let report = ExecutionReport::new(ExecutionResult::ok());
        Ok(match &self.static_data {
            Some(data) => report.with_static_data(data.clone()),
            None => report,
        })
    }
}

#[derive(Default)]
struct RecordingEventLog {
    events: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl EventLog for RecordingEventLog {
    async fn publish(&self, event: &FleetEvent) -> Result<(), CoreError> {
        self.events.lock().unwrap().push(event.name());
        Ok(())
    }
}

struct Harness {
    queue: MemoryQueue,
    storage: MemoryStorage,
    adapter: Arc<ScriptedAdapter>,
    events: Arc<RecordingEventLog>,
    registry: RunningJobRegistry,
    shutdown: CancellationToken,
}

fn harness(config: WorkerConfig, adapter: ScriptedAdapter) -> (Harness, Worker) {
    harness_with(config, adapter, false, |builder, _| builder)
}

fn harness_with_auth(
    config: WorkerConfig,
    adapter: ScriptedAdapter,
    deny: bool,
) -> (Harness, Worker) {
    harness_with(config, adapter, deny, |builder, _| builder)
}

fn harness_with(
    config: WorkerConfig,
    adapter: ScriptedAdapter,
    deny: bool,
    configure: impl FnOnce(WorkerBuilder, &MemoryQueue) -> WorkerBuilder,
) -> (Harness, Worker) {
    let queue = MemoryQueue::new();
    let storage = MemoryStorage::new();
    let adapter = Arc::new(adapter);
    let events = Arc::new(RecordingEventLog::default());

    let authorizer: Arc<dyn Authorizer> = if deny {
        Arc::new(DenyOwners::new(["owner-1"]))
    } else {
        Arc::new(AllowAll)
    };
    let builder = WorkerBuilder::new(
        config,
        Arc::new(queue.clone()),
        Arc::new(storage.clone()),
        authorizer,
        adapter.clone(),
    );
    let builder = builder.event_log(events.clone()).worker_id("worker-test");
    let worker = configure(builder, &queue).build().unwrap();

    let harness = Harness {
        queue,
        storage,
        adapter,
        events,
        registry: worker.registry().clone(),
        shutdown: CancellationToken::new(),
    };
    (harness, worker)
}

impl Harness {
    fn start(&self, worker: Worker) -> JoinHandle<ExitReason> {
        tokio::spawn(worker.run(self.shutdown.clone()))
    }

    fn execution(&self, id: &str) {
        self.storage.insert_execution(ExecutionRecord::new(
            id,
            WorkflowMeta::new("wf-1", "demo", "owner-1"),
            ExecutionMode::Manual,
        ));
    }

    async fn wait_running(&self, count: usize) {
        for _ in 0..1_000 {
            if self.registry.len() == count {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("registry never reached {count} entries");
    }
}

#[tokio::test(start_paused = true)]
async fn completed_job_leaves_registry_empty() {
    let (h, worker) = harness(
        WorkerConfig::default(),
        ScriptedAdapter::running_for(Duration::from_secs(1)),
    );
    let run = h.start(worker);

    h.execution("e-1");
    h.queue.push(Job::new("job-1", "e-1"));

    let settlement = h.queue.wait_settled(&JobId::from("job-1")).await;
    assert_eq!(settlement, Settlement::Completed(ExecutionResult::ok()));
    assert!(h.registry.is_empty());
    assert_eq!(
        h.storage.execution("e-1").unwrap().status,
        ExecutionStatus::Success
    );

    h.shutdown.cancel();
    assert_eq!(run.await.unwrap(), ExitReason::Drained);
}

#[tokio::test(start_paused = true)]
async fn missing_execution_fails_without_registering() {
    let (h, worker) = harness(WorkerConfig::default(), ScriptedAdapter::default());
    let run = h.start(worker);

    h.queue.push(Job::new("job-404", "e-missing"));

    let settlement = h.queue.wait_settled(&JobId::from("job-404")).await;
    assert!(matches!(
        settlement,
        Settlement::Failed { retryable: false, .. }
    ));
    assert_eq!(h.adapter.calls.load(Ordering::SeqCst), 0);
    assert!(h.registry.is_empty());

    h.shutdown.cancel();
    run.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn adapter_fault_fails_job_and_marks_execution_error() {
    let adapter = ScriptedAdapter {
        infrastructure_error: Some("runtime pool exhausted"),
        ..ScriptedAdapter::default()
    };
    let (h, worker) = harness(WorkerConfig::default(), adapter);
    let run = h.start(worker);

    h.execution("e-1");
    h.queue.push(Job::new("job-1", "e-1"));

    let settlement = h.queue.wait_settled(&JobId::from("job-1")).await;
    assert!(matches!(settlement, Settlement::Failed { retryable: true, .. }));
    assert!(h.registry.is_empty());
    assert_eq!(
        h.storage.execution("e-1").unwrap().status,
        ExecutionStatus::Error
    );

    h.shutdown.cancel();
    run.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn denied_job_completes_with_authorization_error() {
    let (h, worker) = harness_with_auth(WorkerConfig::default(), ScriptedAdapter::default(), true);
    let run = h.start(worker);

    h.execution("e-1");
    h.queue.push(Job::new("job-1", "e-1"));

    let Settlement::Completed(result) = h.queue.wait_settled(&JobId::from("job-1")).await else {
        panic!("denied job must complete");
    };
    assert!(result.success);
    assert_eq!(
        result.error.map(|e| e.kind),
        Some(ErrorDescriptor::AUTHORIZATION.to_string())
    );
    assert_eq!(h.adapter.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.storage.execution("e-1").unwrap().status,
        ExecutionStatus::Error
    );

    h.shutdown.cancel();
    run.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancel_signal_aborts_running_job() {
    let (h, worker) = harness(
        WorkerConfig::default(),
        ScriptedAdapter::running_for(Duration::from_secs(600)),
    );
    let run = h.start(worker);

    h.execution("e-1");
    h.queue.push(Job::new("job-1", "e-1"));
    h.wait_running(1).await;

    h.queue.cancel("job-1");

    let Settlement::Completed(result) = h.queue.wait_settled(&JobId::from("job-1")).await else {
        panic!("cancelled job must complete");
    };
    assert!(!result.success);
    assert_eq!(
        result.error.map(|e| e.kind),
        Some(ErrorDescriptor::CANCELLED.to_string())
    );
    assert!(h.registry.is_empty());
    assert_eq!(
        h.storage.execution("e-1").unwrap().status,
        ExecutionStatus::Canceled
    );

    h.shutdown.cancel();
    assert_eq!(run.await.unwrap(), ExitReason::Drained);
}

#[tokio::test(start_paused = true)]
async fn cancel_for_unknown_job_is_ignored() {
    let (h, worker) = harness(
        WorkerConfig::default(),
        ScriptedAdapter::running_for(Duration::from_secs(2)),
    );
    let run = h.start(worker);

    h.execution("e-1");
    h.queue.push(Job::new("job-1", "e-1"));
    h.wait_running(1).await;
    h.queue.cancel("job-elsewhere");

    let settlement = h.queue.wait_settled(&JobId::from("job-1")).await;
    assert_eq!(settlement, Settlement::Completed(ExecutionResult::ok()));

    h.shutdown.cancel();
    run.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn progress_reaches_the_queue() {
    let adapter = ScriptedAdapter {
        progress: Some(json!({"node": "fetch", "done": 1})),
        ..ScriptedAdapter::default()
    };
    let (h, worker) = harness(WorkerConfig::default(), adapter);
    let run = h.start(worker);

    h.execution("e-1");
    h.queue.push(Job::new("job-1", "e-1"));
    h.queue.wait_settled(&JobId::from("job-1")).await;

    assert_eq!(
        h.queue.progress_for(&JobId::from("job-1")),
        vec![json!({"node": "fetch", "done": 1})]
    );

    h.shutdown.cancel();
    run.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn static_data_is_reloaded_and_persisted_on_request() {
    let adapter = ScriptedAdapter {
        static_data: Some(json!({"cursor": 2})),
        ..ScriptedAdapter::default()
    };
    let (h, worker) = harness(WorkerConfig::default(), adapter);
    let run = h.start(worker);

    h.execution("e-1");
    h.storage.insert_workflow(
        WorkflowMeta::new("wf-1", "demo", "owner-1").with_static_data(json!({"cursor": 1})),
    );
    h.queue.push(Job::new("job-1", "e-1").with_static_data());
    h.queue.wait_settled(&JobId::from("job-1")).await;

    assert_eq!(
        *h.adapter.seen_static_data.lock().unwrap(),
        vec![Some(json!({"cursor": 1}))]
    );
    assert_eq!(
        h.storage.workflow("wf-1").unwrap().static_data,
        Some(json!({"cursor": 2}))
    );

    h.shutdown.cancel();
    run.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn concurrency_limit_bounds_running_jobs() {
    let (h, worker) = harness(
        WorkerConfig::default().with_concurrency(2),
        ScriptedAdapter::running_for(Duration::from_secs(1)),
    );
    let run = h.start(worker);

    for i in 0..5 {
        h.execution(&format!("e-{i}"));
        h.queue.push(Job::new(format!("job-{i}"), format!("e-{i}")));
    }
    for i in 0..5 {
        h.queue.wait_settled(&JobId::from(format!("job-{i}"))).await;
    }
    assert_eq!(h.queue.peak_in_flight(), 2);

    h.shutdown.cancel();
    run.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_running_jobs() {
    let (h, worker) = harness(
        WorkerConfig::default().with_graceful_shutdown_timeout(Duration::from_secs(10)),
        ScriptedAdapter::running_for(Duration::from_secs(3)),
    );
    let run = h.start(worker);

    for i in 0..2 {
        h.execution(&format!("e-{i}"));
        h.queue.push(Job::new(format!("job-{i}"), format!("e-{i}")));
    }
    h.wait_running(2).await;

    h.shutdown.cancel();
    while !h.queue.is_paused() {
        sleep(Duration::from_millis(10)).await;
    }
    h.queue.push(Job::new("job-late", "e-0"));

    let reason = run.await.unwrap();
    assert_eq!(reason, ExitReason::Drained);
    assert_eq!(reason.code(), 0);
    assert!(h.registry.is_empty());
    assert!(h.queue.is_paused());
    assert!(h.queue.settlement(&JobId::from("job-late")).is_none());
    assert_eq!(
        *h.events.events.lock().unwrap(),
        vec!["worker.started", "worker.stopping"]
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_forces_exit_after_deadline() {
    let adapter = ScriptedAdapter {
        run_for: Duration::from_secs(600),
        ignore_cancel: true,
        ..ScriptedAdapter::default()
    };
    let (h, worker) = harness(
        WorkerConfig::default().with_graceful_shutdown_timeout(Duration::from_secs(2)),
        adapter,
    );
    let run = h.start(worker);

    h.execution("e-1");
    h.queue.push(Job::new("job-1", "e-1"));
    h.wait_running(1).await;
    h.shutdown.cancel();

    let reason = run.await.unwrap();
    assert_eq!(reason, ExitReason::ForcedAfterDeadline { remaining: 1 });
    assert_eq!(reason.code(), 0);
}

#[tokio::test(start_paused = true)]
async fn sustained_connection_loss_exits_with_code_one() {
    let (h, worker) = harness(
        WorkerConfig::default().with_connection_downtime_threshold(Duration::from_secs(7)),
        ScriptedAdapter::default(),
    );
    let queue = h.queue.clone();
    tokio::spawn(async move {
        for _ in 0..10 {
            sleep(Duration::from_secs(2)).await;
            queue.emit_error(QueueError::ConnectionRefused("connect ECONNREFUSED".into()));
        }
    });

    let reason = h.start(worker).await.unwrap();
    assert_eq!(reason, ExitReason::QueueUnreachable);
    assert_eq!(reason.code(), 1);
}

#[tokio::test(start_paused = true)]
async fn brief_connection_blips_are_tolerated() {
    let (h, worker) = harness(
        WorkerConfig::default().with_connection_downtime_threshold(Duration::from_secs(7)),
        ScriptedAdapter::default(),
    );
    let run = h.start(worker);
    let refused = || QueueError::ConnectionRefused("connect ECONNREFUSED".into());

    sleep(Duration::from_millis(10)).await;
    h.queue.emit_error(refused());
    sleep(Duration::from_secs(5)).await;
    h.queue.emit_error(refused());
    sleep(Duration::from_secs(40)).await;
    h.queue.emit_error(refused());
    sleep(Duration::from_secs(5)).await;
    h.queue.emit_error(refused());
    sleep(Duration::from_secs(1)).await;

    assert!(!run.is_finished());
    h.shutdown.cancel();
    assert_eq!(run.await.unwrap(), ExitReason::Drained);
}

#[tokio::test(start_paused = true)]
async fn unreachable_queue_at_startup_exits_with_code_one() {
    let (h, worker) = harness(
        WorkerConfig::default().with_connection_downtime_threshold(Duration::from_secs(3)),
        ScriptedAdapter::default(),
    );
    h.queue.set_reachable(false);

    let reason = h.start(worker).await.unwrap();
    assert_eq!(reason, ExitReason::QueueUnreachable);
    assert!(h.events.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn queue_initialization_failure_exits_with_code_two() {
    let (h, worker) = harness(WorkerConfig::default(), ScriptedAdapter::default());
    // Another consumer already holds the only subscription.
    h.queue.subscribe(1, Arc::new(NeverCalled)).await.unwrap();

    let reason = h.start(worker).await.unwrap();
    assert_eq!(reason, ExitReason::InitializationFailed);
    assert_eq!(reason.code(), 2);
}

struct NeverCalled;

#[async_trait]
impl JobHandler for NeverCalled {
    async fn handle(&self, _job: Job) -> Result<ExecutionResult, JobFailure> {
        unreachable!("the competing subscriber never receives jobs")
    }
}

/// Event log whose `worker.stopping` publish is slow; records whether intake was already paused.
struct SlowStoppingLog {
    queue: MemoryQueue,
    delay: Duration,
    paused_when_stopping: Mutex<Option<bool>>,
}

#[async_trait]
impl EventLog for SlowStoppingLog {
    async fn publish(&self, event: &FleetEvent) -> Result<(), CoreError> {
        if let FleetEvent::WorkerStopping { .. } = event {
            *self.paused_when_stopping.lock().unwrap() = Some(self.queue.is_paused());
            sleep(self.delay).await;
        }
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn slow_stopping_announcement_does_not_admit_new_jobs() {
    let slow: Arc<Mutex<Option<Arc<SlowStoppingLog>>>> = Arc::default();
    let captured = slow.clone();
    let (h, worker) = harness_with(
        WorkerConfig::default(),
        ScriptedAdapter::default(),
        false,
        move |builder, queue| {
            let log = Arc::new(SlowStoppingLog {
                queue: queue.clone(),
                delay: Duration::from_secs(5),
                paused_when_stopping: Mutex::new(None),
            });
            *captured.lock().unwrap() = Some(log.clone());
            builder.event_log(log)
        },
    );
    let run = h.start(worker);

    h.execution("e-1");
    h.queue.push(Job::new("job-1", "e-1"));
    h.queue.wait_settled(&JobId::from("job-1")).await;

    h.shutdown.cancel();
    sleep(Duration::from_millis(100)).await;
    h.queue.push(Job::new("late-job", "e-1"));

    assert_eq!(run.await.unwrap(), ExitReason::Drained);
    assert!(h.queue.settlement(&JobId::from("late-job")).is_none());
    assert_eq!(h.adapter.calls.load(Ordering::SeqCst), 1);

    let log = slow.lock().unwrap().clone().unwrap();
    assert_eq!(*log.paused_when_stopping.lock().unwrap(), Some(true));
}

struct FailingHook;

#[async_trait]
impl ShutdownHook for FailingHook {
    fn name(&self) -> &'static str {
        "deregister"
    }

    async fn before_shutdown(&self) -> Result<(), HookError> {
        Err("registry unavailable".into())
    }
}

#[tokio::test(start_paused = true)]
async fn failing_shutdown_hook_crashes_the_worker() {
    let (h, worker) = harness_with(
        WorkerConfig::default(),
        ScriptedAdapter::running_for(Duration::from_secs(600)),
        false,
        |builder, _| builder.shutdown_hook(Arc::new(FailingHook)),
    );
    let run = h.start(worker);

    h.execution("e-1");
    h.queue.push(Job::new("job-1", "e-1"));
    h.wait_running(1).await;
    h.shutdown.cancel();

    let reason = run.await.unwrap();
    assert!(matches!(&reason, ExitReason::Crash(msg) if msg.contains("deregister")));
    assert_ne!(reason.code(), 0);
    assert!(h.queue.is_paused());
}

#[tokio::test(start_paused = true)]
async fn unclassified_queue_error_crashes_the_worker() {
    let (h, worker) = harness(WorkerConfig::default(), ScriptedAdapter::default());
    let run = h.start(worker);

    sleep(Duration::from_millis(10)).await;
    h.queue
        .emit_error(QueueError::Other("unexpected frame from broker".into()));

    let reason = run.await.unwrap();
    assert_eq!(
        reason,
        ExitReason::Crash("unexpected frame from broker".into())
    );
    assert_ne!(reason.code(), 0);
}
