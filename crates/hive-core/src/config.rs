use std::time::Duration;

use crate::error::CoreError;

/// Tunables of a worker node.
///
/// Defaults match a standalone worker: ten concurrent jobs, a 30s drain budget,
/// and a queue that may stay unreachable for 10s of one failure episode.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum jobs the queue may hand to this worker at once.
    pub concurrency: usize,
    /// Time allowed for in-flight jobs to settle once shutdown starts.
    pub graceful_shutdown_timeout: Duration,
    /// How often the drain loop looks at the registry.
    pub drain_poll_interval: Duration,
    /// Emit a drain progress report every N polls.
    pub drain_report_every: u32,
    /// A connection error arriving this long after the previous one starts a new episode.
    pub connection_recovery_window: Duration,
    /// Cumulative downtime within one episode after which the queue counts as lost.
    pub connection_downtime_threshold: Duration,
    /// Default soft timeout handed to the execution adapter.
    pub execution_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            graceful_shutdown_timeout: Duration::from_secs(30),
            drain_poll_interval: Duration::from_millis(500),
            drain_report_every: 4,
            connection_recovery_window: Duration::from_secs(30),
            connection_downtime_threshold: Duration::from_secs(10),
            execution_timeout: None,
        }
    }
}

impl WorkerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_graceful_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_shutdown_timeout = timeout;
        self
    }

    pub fn with_drain_poll_interval(mut self, interval: Duration) -> Self {
        self.drain_poll_interval = interval;
        self
    }

    pub fn with_drain_report_every(mut self, polls: u32) -> Self {
        self.drain_report_every = polls;
        self
    }

    pub fn with_connection_recovery_window(mut self, window: Duration) -> Self {
        self.connection_recovery_window = window;
        self
    }

    pub fn with_connection_downtime_threshold(mut self, threshold: Duration) -> Self {
        self.connection_downtime_threshold = threshold;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.concurrency == 0 {
            return Err(CoreError::InvalidConfig(
                "concurrency must be a positive integer".into(),
            ));
        }
        if self.drain_poll_interval.is_zero() {
            return Err(CoreError::InvalidConfig(
                "drain poll interval must be non-zero".into(),
            ));
        }
        if self.drain_report_every == 0 {
            return Err(CoreError::InvalidConfig(
                "drain report cadence must be at least one poll".into(),
            ));
        }
        Ok(())
    }
}
