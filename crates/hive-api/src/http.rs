use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use hive_core::HealthReport;
use hive_model::{JobId, RunningJobSummary};
use serde::Serialize;
use tracing::{debug, info};

use crate::{error::ApiError, handler::ApiHandler, preset::PresetStore};

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
    preset: Option<(String, Arc<PresetStore>)>,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            preset: None,
        }
    }

    /// Mount the one-shot preset endpoint at `path` (e.g. `/preset`).
    pub fn with_preset(mut self, path: impl Into<String>, store: Arc<PresetStore>) -> Self {
        self.preset = Some((path.into(), store));
        self
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - GET /healthz - Liveness of storage and queue
    /// - GET /api/v1/worker/status - Worker identity, uptime and running jobs
    /// - GET /api/v1/jobs/running - Running job summaries
    /// - GET /api/v1/jobs/running/ids - Running job ids
    /// - POST <preset path> - One-shot preset, when configured
    pub fn router(self) -> Router {
        let router = Router::new()
            .route("/healthz", get(healthz::<H>))
            .route("/api/v1/worker/status", get(worker_status::<H>))
            .route("/api/v1/jobs/running", get(running_jobs::<H>))
            .route("/api/v1/jobs/running/ids", get(running_job_ids::<H>))
            .with_state(self.handler);

        match self.preset {
            Some((path, store)) => router.merge(
                Router::new()
                    .route(&path, post(apply_preset))
                    .with_state(store),
            ),
            None => router,
        }
    }
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct RunningJobsResponse {
    jobs: Vec<RunningJobSummary>,
    total: usize,
}

#[derive(Debug, Serialize)]
struct RunningJobIdsResponse {
    ids: Vec<JobId>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /healthz
async fn healthz<H>(State(handler): State<Arc<H>>) -> Response
where
    H: ApiHandler,
{
    match handler.health().await {
        HealthReport::Ok => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                cause: None,
                message: None,
            }),
        )
            .into_response(),
        HealthReport::Unavailable { dependency, reason } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "error",
                cause: Some(dependency.as_str()),
                message: Some(reason),
            }),
        )
            .into_response(),
    }
}

/// GET /api/v1/worker/status
async fn worker_status<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let status = handler.worker_status().await?;
    debug!(running = status.running_jobs.len(), "worker status requested");
    Ok(Json(status))
}

/// GET /api/v1/jobs/running
async fn running_jobs<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let jobs = handler.running_jobs().await?;
    let total = jobs.len();
    Ok(Json(RunningJobsResponse { jobs, total }))
}

/// GET /api/v1/jobs/running/ids
async fn running_job_ids<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let ids = handler.running_job_ids().await?;
    Ok(Json(RunningJobIdsResponse { ids }))
}

/// POST <preset path>
async fn apply_preset(
    State(store): State<Arc<PresetStore>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().starts_with("application/json"));
    if !is_json {
        return Err(ApiError::InvalidRequest(
            "content type must be application/json".into(),
        ));
    }

    store.apply_json(&body)?;
    info!("preset config applied");
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::WorkerApiAdapter;
    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use hive_core::{
        FleetGateway, HealthCheck, NoopEventLog, RunningJobEntry, RunningJobRegistry,
        memory::{MemoryQueue, MemoryStorage},
    };
    use hive_model::{ExecutionMode, ExecutionRecord, WorkflowMeta};
    use serde_json::{Value, json};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    struct Fixture {
        storage: MemoryStorage,
        registry: RunningJobRegistry,
        preset: Arc<PresetStore>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                storage: MemoryStorage::new(),
                registry: RunningJobRegistry::new(),
                preset: Arc::new(PresetStore::new()),
            }
        }

        fn router(&self) -> Router {
            let health = HealthCheck::new(
                Arc::new(self.storage.clone()),
                Arc::new(MemoryQueue::new()),
            );
            let fleet = FleetGateway::new(
                "worker-a",
                self.registry.clone(),
                Arc::new(NoopEventLog),
            );
            let adapter = WorkerApiAdapter::new(Arc::new(health), Arc::new(fleet));
            HttpApi::new(Arc::new(adapter))
                .with_preset("/preset", Arc::clone(&self.preset))
                .router()
        }
    }

    async fn call(router: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn preset_req(content_type: &str, body: &str) -> Request<Body> {
        Request::post("/preset")
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let fx = Fixture::new();
        let (status, body) = call(fx.router(), get_req("/healthz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn healthz_names_failing_dependency() {
        let fx = Fixture::new();
        fx.storage.set_reachable(false);

        let (status, body) = call(fx.router(), get_req("/healthz")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "error");
        assert_eq!(body["cause"], "storage");
    }

    #[tokio::test]
    async fn lists_running_jobs() {
        let fx = Fixture::new();
        let record = ExecutionRecord::new(
            "e-1",
            WorkflowMeta::new("wf-1", "sync", "owner-1"),
            ExecutionMode::Trigger,
        );
        let _guard = fx
            .registry
            .register(RunningJobEntry::for_execution(
                "job-1".into(),
                &record,
                CancellationToken::new(),
            ))
            .unwrap();

        let (status, body) = call(fx.router(), get_req("/api/v1/jobs/running/ids")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ids": ["job-1"]}));

        let (_, body) = call(fx.router(), get_req("/api/v1/jobs/running")).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["jobs"][0]["workflowName"], "sync");

        let (_, body) = call(fx.router(), get_req("/api/v1/worker/status")).await;
        assert_eq!(body["workerId"], "worker-a");
        assert_eq!(body["runningJobs"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn preset_is_accepted_once() {
        let fx = Fixture::new();

        let (status, _) = call(fx.router(), preset_req("application/json", r#"{"a":1}"#)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) =
            call(fx.router(), preset_req("application/json", r#"{"a":2}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "preset config can be set once");
        assert_eq!(fx.preset.get(), Some(&json!({"a": 1})));
    }

    #[tokio::test]
    async fn preset_requires_json_content_type() {
        let fx = Fixture::new();
        let (status, _) = call(fx.router(), preset_req("text/plain", r#"{"a":1}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!fx.preset.is_applied());
    }

    #[tokio::test]
    async fn preset_rejects_malformed_json() {
        let fx = Fixture::new();
        let (status, _) = call(
            fx.router(),
            preset_req("application/json; charset=utf-8", "{oops"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!fx.preset.is_applied());
    }
}
