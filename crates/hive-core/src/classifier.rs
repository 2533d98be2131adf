use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, warn};

use crate::{
    config::WorkerConfig,
    error::QueueError,
    exit::ExitReason,
    metrics::{MetricsHandle, noop_metrics},
};

/// Rolling record of one episode of queue connection failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionFailureWindow {
    last_failure_at: Option<Instant>,
    cumulative_downtime: Duration,
}

impl ConnectionFailureWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a failure at `now` and return the episode's downtime.
    ///
    /// A gap of at least `recovery_window` since the previous failure starts a fresh
    /// episode at zero; a shorter gap is added to the running total.
    pub fn record(&mut self, now: Instant, recovery_window: Duration) -> Duration {
        if let Some(last) = self.last_failure_at {
            let gap = now.saturating_duration_since(last);
            if gap >= recovery_window {
                self.cumulative_downtime = Duration::ZERO;
            } else {
                self.cumulative_downtime += gap;
            }
        }
        self.last_failure_at = Some(now);
        self.cumulative_downtime
    }

    pub fn cumulative_downtime(&self) -> Duration {
        self.cumulative_downtime
    }

    pub fn last_failure_at(&self) -> Option<Instant> {
        self.last_failure_at
    }
}

/// Result of classifying one transport error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Tolerated; the episode has accumulated `downtime` so far.
    Transient { downtime: Duration },
    /// The process must terminate for this reason.
    Fatal(ExitReason),
}

/// Turns queue transport errors into transient or fatal verdicts.
pub struct ConnectionHealthClassifier {
    window: ConnectionFailureWindow,
    recovery_window: Duration,
    downtime_threshold: Duration,
    metrics: MetricsHandle,
}

impl ConnectionHealthClassifier {
    pub fn new(recovery_window: Duration, downtime_threshold: Duration) -> Self {
        Self {
            window: ConnectionFailureWindow::new(),
            recovery_window,
            downtime_threshold,
            metrics: noop_metrics(),
        }
    }

    pub fn from_config(cfg: &WorkerConfig) -> Self {
        Self::new(
            cfg.connection_recovery_window,
            cfg.connection_downtime_threshold,
        )
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn window(&self) -> &ConnectionFailureWindow {
        &self.window
    }

    pub fn classify(&mut self, err: &QueueError, now: Instant) -> Verdict {
        self.metrics.queue_error(err.kind());

        match err {
            QueueError::ConnectionRefused(reason) => {
                let downtime = self.window.record(now, self.recovery_window);
                if downtime > self.downtime_threshold {
                    error!(
                        %reason,
                        downtime_ms = downtime.as_millis() as u64,
                        threshold_ms = self.downtime_threshold.as_millis() as u64,
                        "queue unreachable for too long; exiting"
                    );
                    return Verdict::Fatal(ExitReason::QueueUnreachable);
                }
                warn!(
                    %reason,
                    downtime_ms = downtime.as_millis() as u64,
                    "lost connection to queue; waiting for it to come back"
                );
                Verdict::Transient { downtime }
            }
            QueueError::InitializationFailed(reason) => {
                error!(%reason, "queue transport failed to initialize; exiting");
                Verdict::Fatal(ExitReason::InitializationFailed)
            }
            QueueError::Other(reason) => {
                error!(%reason, "unclassified queue error");
                Verdict::Fatal(ExitReason::Crash(reason.clone()))
            }
        }
    }
}
