use std::{collections::HashMap, sync::Arc};

use hive_core::FleetGateway;
use hive_model::WorkerStatus;
use serde::Serialize;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::FleetConfig,
    errors::FleetError,
    event_log::{check_ack, unix_millis},
};

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    #[serde(flatten)]
    status: WorkerStatus,
    ts: u64,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    metadata: &'a HashMap<String, String>,
}

/// Push this worker's status to `{endpoint}/v1/workers/{id}/status` every
/// `heartbeat_interval` until `stop` fires.
///
/// A failed push is logged and retried on the next tick.
pub async fn status_heartbeat(
    gateway: Arc<FleetGateway>,
    config: FleetConfig,
    stop: CancellationToken,
) -> Result<(), FleetError> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;
    let url = config.url(&format!("/v1/workers/{}/status", gateway.worker_id()));

    let mut ticker = interval(config.heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(%url, every_ms = config.heartbeat_interval.as_millis() as u64, "status heartbeat started");
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let report = StatusReport {
            status: gateway.status(),
            ts: unix_millis(),
            metadata: &config.metadata,
        };
        match push(&client, &url, &report).await {
            Ok(()) => debug!(running = report.status.running_jobs.len(), "status heartbeat sent"),
            Err(e) => warn!(error = %e, "status heartbeat failed"),
        }
    }
    debug!("status heartbeat stopped");
    Ok(())
}

async fn push(
    client: &reqwest::Client,
    url: &str,
    report: &StatusReport<'_>,
) -> Result<(), FleetError> {
    let response = client.post(url).json(report).send().await?;
    check_ack(response).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Mutex, time::Duration};

    use axum::{
        Json, Router,
        extract::{Path, State},
        routing::post,
    };
    use hive_core::{NoopEventLog, RunningJobRegistry};
    use serde_json::{Value, json};

    type Seen = Arc<Mutex<Vec<(String, Value)>>>;

    #[tokio::test]
    async fn reports_status_until_stopped() {
        let seen: Seen = Arc::default();
        let router = Router::new()
            .route(
                "/v1/workers/{id}/status",
                post(
                    |State(seen): State<Seen>, Path(id): Path<String>, Json(body): Json<Value>| async move {
                        seen.lock().unwrap().push((id, body));
                        Json(json!({"success": true}))
                    },
                ),
            )
            .with_state(Arc::clone(&seen));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        let gateway = Arc::new(FleetGateway::new(
            "worker-a",
            RunningJobRegistry::new(),
            Arc::new(NoopEventLog),
        ));
        let stop = CancellationToken::new();
        let config = FleetConfig::new(endpoint).with_heartbeat_interval(Duration::from_millis(20));
        let task = tokio::spawn(status_heartbeat(gateway, config, stop.clone()));

        for _ in 0..200 {
            if seen.lock().unwrap().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        stop.cancel();
        task.await.unwrap().unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.len() >= 2);
        assert_eq!(seen[0].0, "worker-a");
        assert_eq!(seen[0].1["workerId"], "worker-a");
        assert!(seen[0].1["runningJobs"].as_array().unwrap().is_empty());
    }
}
