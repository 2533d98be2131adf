use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    metrics::{MetricsHandle, noop_metrics},
    queue::QueueSignal,
    registry::RunningJobRegistry,
};

/// Applies out-of-band cancel signals to the local registry.
pub struct CancellationListener {
    registry: RunningJobRegistry,
    metrics: MetricsHandle,
}

impl CancellationListener {
    pub fn new(registry: RunningJobRegistry) -> Self {
        Self {
            registry,
            metrics: noop_metrics(),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Handle one signal. Returns `true` if a local job was cancelled.
    ///
    /// Signals for jobs that already finished or run on another worker are ignored.
    pub fn handle(&self, signal: &QueueSignal) -> bool {
        match signal {
            QueueSignal::Cancel { job_id } => {
                if self.registry.cancel(job_id) {
                    self.metrics.job_cancel_requested();
                    self.metrics.running_jobs(self.registry.len());
                    info!(%job_id, "job cancelled by signal");
                    true
                } else {
                    debug!(%job_id, "cancel signal for a job not running here");
                    false
                }
            }
        }
    }

    /// Consume signals until the channel closes or `stop` fires.
    pub async fn run(
        self,
        mut signals: broadcast::Receiver<QueueSignal>,
        stop: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                received = signals.recv() => match received {
                    Ok(signal) => {
                        self.handle(&signal);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "cancellation listener lagged; signals dropped");
                    }
                    Err(RecvError::Closed) => {
                        debug!("signal channel closed");
                        break;
                    }
                },
            }
        }
    }
}
