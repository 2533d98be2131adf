use std::{collections::HashMap, time::Duration};

/// Where and how the worker talks to the fleet controller.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Base URL, e.g. `http://controller:8080`.
    pub endpoint: String,
    /// Static labels attached to every request.
    pub metadata: HashMap<String, String>,
    pub request_timeout: Duration,
    /// Period of status heartbeats.
    pub heartbeat_interval: Duration,
}

impl FleetConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            metadata: HashMap::new(),
            request_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(15),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }
}
