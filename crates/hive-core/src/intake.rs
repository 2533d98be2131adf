use std::sync::Arc;

use tracing::{info, instrument};

use crate::{
    error::{CoreError, QueueError},
    queue::{JobHandler, JobQueue},
};

/// Subscribes the worker to the job queue.
///
/// Admission control lives in the queue: the worker declares its concurrency and the
/// queue never has more than that many handler calls in flight.
pub struct JobIntake {
    queue: Arc<dyn JobQueue>,
}

impl JobIntake {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    #[instrument(level = "debug", skip(self, handler))]
    pub async fn start(
        &self,
        concurrency: usize,
        handler: Arc<dyn JobHandler>,
    ) -> Result<(), CoreError> {
        if concurrency == 0 {
            return Err(CoreError::InvalidConfig(
                "concurrency must be a positive integer".into(),
            ));
        }
        self.queue.subscribe(concurrency, handler).await?;
        info!(concurrency, "job intake started");
        Ok(())
    }

    /// Stop accepting new deliveries; running jobs continue.
    pub async fn pause(&self) -> Result<(), QueueError> {
        self.queue.pause_intake().await?;
        info!("job intake paused");
        Ok(())
    }
}
