use std::{fmt, future::Future, sync::Arc, time::Duration};

use tracing::{debug, warn};

use crate::{queue::JobQueue, storage::Storage};

const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Dependency a liveness probe checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    Storage,
    Queue,
}

impl Dependency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dependency::Storage => "storage",
            Dependency::Queue => "queue",
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthReport {
    Ok,
    Unavailable {
        dependency: Dependency,
        reason: String,
    },
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        matches!(self, HealthReport::Ok)
    }
}

/// Liveness probe over the worker's storage and queue.
///
/// Storage is checked first; a storage failure is reported without touching the queue.
pub struct HealthCheck {
    storage: Arc<dyn Storage>,
    queue: Arc<dyn JobQueue>,
    check_timeout: Duration,
}

impl HealthCheck {
    pub fn new(storage: Arc<dyn Storage>, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            storage,
            queue,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    /// Upper bound for each single dependency check.
    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub async fn probe(&self) -> HealthReport {
        if let Err(reason) = self.run(self.storage.ping()).await {
            warn!(%reason, "health check failed: storage");
            return HealthReport::Unavailable {
                dependency: Dependency::Storage,
                reason,
            };
        }

        if let Err(reason) = self.run(self.queue.ping()).await {
            warn!(%reason, "health check failed: queue");
            return HealthReport::Unavailable {
                dependency: Dependency::Queue,
                reason,
            };
        }

        debug!("health check passed");
        HealthReport::Ok
    }

    async fn run<F, E>(&self, check: F) -> Result<(), String>
    where
        F: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        match tokio::time::timeout(self.check_timeout, check).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "no answer within {}ms",
                self.check_timeout.as_millis()
            )),
        }
    }
}
