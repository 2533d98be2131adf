use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use hive_core::WorkerConfig;
use hive_fleet::FleetConfig;
use hive_observe::{LoggerConfig, LoggerFormat};

/// Daemon settings read from `HIVE_*` environment variables.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub worker: WorkerConfig,
    pub logger: LoggerConfig,
    pub http_addr: SocketAddr,
    pub preset_path: Option<String>,
    pub fleet: Option<FleetConfig>,
    /// Demo executions enqueued at startup.
    pub demo_jobs: usize,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut worker = WorkerConfig::default();
        if let Some(n) = parse(&get, "HIVE_CONCURRENCY")? {
            worker = worker.with_concurrency(n);
        }
        if let Some(secs) = parse(&get, "HIVE_GRACEFUL_SHUTDOWN_TIMEOUT")? {
            worker = worker.with_graceful_shutdown_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = parse(&get, "HIVE_QUEUE_RECOVERY_WINDOW")? {
            worker = worker.with_connection_recovery_window(Duration::from_secs(secs));
        }
        if let Some(secs) = parse(&get, "HIVE_QUEUE_DOWNTIME_THRESHOLD")? {
            worker = worker.with_connection_downtime_threshold(Duration::from_secs(secs));
        }
        if let Some(secs) = parse(&get, "HIVE_EXECUTION_TIMEOUT")? {
            worker = worker.with_execution_timeout(Duration::from_secs(secs));
        }
        worker.validate().context("invalid worker settings")?;

        let mut logger = LoggerConfig::default();
        if let Some(format) = parse::<LoggerFormat>(&get, "HIVE_LOG_FORMAT")? {
            logger = logger.with_format(format);
        }
        if let Some(level) = get("HIVE_LOG_LEVEL") {
            logger = logger.with_level(level);
        }

        let http_addr = parse(&get, "HIVE_HTTP_ADDR")?
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));

        let fleet = get("HIVE_FLEET_ENDPOINT").map(|endpoint| {
            let mut fleet = FleetConfig::new(endpoint);
            if let Some(name) = get("HIVE_WORKER_NAME") {
                fleet = fleet.with_metadata("name", name);
            }
            fleet
        });

        Ok(Self {
            worker,
            logger,
            http_addr,
            preset_path: get("HIVE_PRESET_PATH"),
            fleet,
            demo_jobs: parse(&get, "HIVE_DEMO_JOBS")?.unwrap_or(0),
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key}={raw} is not valid"))
        })
        .transpose()
}
