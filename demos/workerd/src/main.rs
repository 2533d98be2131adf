//! Demo worker daemon: in-memory queue and storage, the step adapter, the HTTP API and
//! Prometheus metrics. The process exit code is the worker's exit reason.

mod adapter;
mod config;
mod signal;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use hive_api::{HttpApi, PresetStore, WorkerApiAdapter};
use hive_core::{
    ExitReason, WorkerBuilder,
    memory::{AllowAll, MemoryQueue, MemoryStorage},
};
use hive_fleet::{HttpEventLog, status_heartbeat};
use hive_model::{ExecutionMode, ExecutionRecord, Job, WorkflowMeta};
use hive_observe::logger_init;
use hive_prometheus::PrometheusMetrics;
use serde_json::json;
use tokio::{net::TcpListener, task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{adapter::StepAdapter, config::DaemonConfig};

/// Upper bound on stopping the HTTP server and heartbeat after the worker returns.
const BACKGROUND_STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Config + logger
    let cfg = DaemonConfig::from_env()?;
    logger_init(&cfg.logger)?;
    info!(format = %cfg.logger.format, "logger initialized");

    // 2) Backends
    let metrics = PrometheusMetrics::new().context("metrics registry")?;
    let queue = MemoryQueue::new();
    let storage = MemoryStorage::new();
    seed_demo_jobs(&queue, &storage, cfg.demo_jobs);

    // 3) Worker
    let mut builder = WorkerBuilder::new(
        cfg.worker.clone(),
        Arc::new(queue.clone()),
        Arc::new(storage.clone()),
        Arc::new(AllowAll),
        Arc::new(StepAdapter),
    )
    .metrics(Arc::new(metrics.clone()));
    if let Some(fleet) = &cfg.fleet {
        builder = builder.event_log(Arc::new(HttpEventLog::new(fleet.clone())?));
    }
    let worker = builder.build()?;
    info!(worker_id = %worker.fleet().worker_id(), "worker built");

    // 4) HTTP API + /metrics
    let mut api = HttpApi::new(Arc::new(WorkerApiAdapter::new(
        worker.health(),
        worker.fleet(),
    )));
    if let Some(path) = &cfg.preset_path {
        api = api.with_preset(path.clone(), Arc::new(PresetStore::new()));
    }
    let router = api.router().merge(
        Router::new()
            .route("/metrics", get(serve_metrics))
            .with_state(metrics),
    );

    let background = CancellationToken::new();
    let listener = TcpListener::bind(cfg.http_addr)
        .await
        .with_context(|| format!("bind {}", cfg.http_addr))?;
    info!(addr = %cfg.http_addr, "http api listening");
    let stop_server = background.clone().cancelled_owned();
    let mut tasks = vec![tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(stop_server)
            .await
        {
            warn!(error = %e, "http server stopped with error");
        }
    })];

    // 5) Fleet heartbeat
    if let Some(fleet) = cfg.fleet.clone() {
        let gateway = worker.fleet();
        let stop = background.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = status_heartbeat(gateway, fleet, stop).await {
                warn!(error = %e, "status heartbeat stopped with error");
            }
        }));
    }

    // 6) Run until signalled
    let shutdown = signal::install_shutdown_handler()?;
    let reason = worker.run(shutdown).await;

    background.cancel();
    if matches!(reason, ExitReason::ForcedAfterDeadline { .. }) {
        // Forced exit does not wait for anything else.
        tasks.iter().for_each(JoinHandle::abort);
    } else if !stop_background(tasks, BACKGROUND_STOP_TIMEOUT).await {
        warn!(
            timeout_secs = BACKGROUND_STOP_TIMEOUT.as_secs(),
            "background tasks did not stop in time"
        );
    }

    if reason.code() != 0 {
        error!(%reason, code = reason.code(), "worker exited abnormally");
    }
    std::process::exit(reason.code());
}

/// Wait for every task to finish; `false` if `limit` elapsed first.
async fn stop_background(tasks: Vec<JoinHandle<()>>, limit: Duration) -> bool {
    timeout(limit, async {
        for task in tasks {
            let _ = task.await;
        }
    })
    .await
    .is_ok()
}

/// GET /metrics
async fn serve_metrics(State(metrics): State<PrometheusMetrics>) -> Response {
    match metrics.encode() {
        Ok(body) => ([(CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn seed_demo_jobs(queue: &MemoryQueue, storage: &MemoryStorage, count: usize) {
    for n in 0..count {
        let execution_id = format!("demo-exec-{n}");
        storage.insert_execution(
            ExecutionRecord::new(
                execution_id.clone(),
                WorkflowMeta::new("demo-workflow", "Demo workflow", "demo-owner"),
                ExecutionMode::Manual,
            )
            .with_data(json!({"steps": 3 + n % 3, "stepMs": 1_000})),
        );
        queue.push(Job::new(format!("demo-job-{n}"), execution_id));
    }
    if count > 0 {
        info!(count, "demo jobs enqueued");
    }
}
