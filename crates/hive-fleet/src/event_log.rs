use std::{
    collections::HashMap,
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use hive_core::{CoreError, EventLog};
use hive_model::FleetEvent;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{config::FleetConfig, errors::FleetError};

/// Publishes fleet events by POSTing them to `{endpoint}/v1/events`.
pub struct HttpEventLog {
    client: reqwest::Client,
    config: FleetConfig,
}

#[derive(Debug, Serialize)]
struct EventEnvelope<'a> {
    #[serde(flatten)]
    event: &'a FleetEvent,
    ts: u64,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    metadata: &'a HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Ack {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

impl HttpEventLog {
    pub fn new(config: FleetConfig) -> Result<Self, FleetError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    async fn send(&self, event: &FleetEvent) -> Result<(), FleetError> {
        let envelope = EventEnvelope {
            event,
            ts: unix_millis(),
            metadata: &self.config.metadata,
        };
        let response = self
            .client
            .post(self.config.url("/v1/events"))
            .json(&envelope)
            .send()
            .await?;
        check_ack(response).await
    }
}

#[async_trait]
impl EventLog for HttpEventLog {
    async fn publish(&self, event: &FleetEvent) -> Result<(), CoreError> {
        debug!(event = event.name(), endpoint = %self.config.endpoint, "publishing fleet event");
        self.send(event).await.map_err(CoreError::from)
    }
}

pub(crate) async fn check_ack(response: reqwest::Response) -> Result<(), FleetError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(FleetError::Rejected(format!("{status}: {body}")));
    }
    if body.trim().is_empty() {
        return Ok(());
    }
    let ack: Ack = serde_json::from_str(&body).map_err(|e| {
        FleetError::InvalidResponse(format!("failed to parse response: {e}, body: {body}"))
    })?;
    if !ack.success {
        return Err(FleetError::Rejected(ack.message));
    }
    Ok(())
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
