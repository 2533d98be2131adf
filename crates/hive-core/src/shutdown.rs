use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{info, instrument, warn};

use crate::{config::WorkerConfig, error::CoreError, intake::JobIntake, registry::RunningJobRegistry};

pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// External step run after intake is paused and before draining starts.
#[async_trait]
pub trait ShutdownHook: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    async fn before_shutdown(&self) -> Result<(), HookError>;
}

/// Lifecycle of a worker. Never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    /// Intake paused; `deadline` is set once pre-shutdown hooks have run.
    Draining { deadline: Option<Instant> },
    Terminated,
}

/// How the drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Registry observed empty before the deadline.
    Drained { elapsed: Duration },
    /// Deadline reached with jobs still registered; the caller must exit anyway.
    DeadlineExceeded { remaining: usize },
}

/// Orchestrates pause intake, pre-shutdown hooks and the timed drain.
pub struct ShutdownController {
    registry: RunningJobRegistry,
    intake: Arc<JobIntake>,
    hooks: Vec<Arc<dyn ShutdownHook>>,
    timeout: Duration,
    poll_interval: Duration,
    report_every: u32,
    state: Mutex<ShutdownState>,
}

impl ShutdownController {
    pub fn new(registry: RunningJobRegistry, intake: Arc<JobIntake>, cfg: &WorkerConfig) -> Self {
        Self {
            registry,
            intake,
            hooks: Vec::new(),
            timeout: cfg.graceful_shutdown_timeout,
            poll_interval: cfg.drain_poll_interval,
            report_every: cfg.drain_report_every.max(1),
            state: Mutex::new(ShutdownState::Running),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn ShutdownHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_draining(&self) -> bool {
        !matches!(self.state(), ShutdownState::Running)
    }

    /// Run the whole shutdown sequence once.
    ///
    /// `Err` means the shutdown path itself failed (pause or hook) and the caller should
    /// crash-exit instead of retrying the drain.
    #[instrument(level = "info", skip(self))]
    pub async fn shutdown(&self) -> Result<DrainOutcome, CoreError> {
        self.transition(ShutdownState::Draining { deadline: None })?;
        info!(running = self.registry.len(), "shutdown requested; pausing intake");

        self.intake.pause().await?;

        for hook in &self.hooks {
            hook.before_shutdown()
                .await
                .map_err(|e| CoreError::ShutdownHook(format!("{}: {e}", hook.name())))?;
        }

        let deadline = Instant::now() + self.timeout;
        self.set_state(ShutdownState::Draining {
            deadline: Some(deadline),
        });

        let outcome = self.drain(deadline).await;
        self.set_state(ShutdownState::Terminated);

        match outcome {
            DrainOutcome::Drained { elapsed } => {
                info!(elapsed_ms = elapsed.as_millis() as u64, "all jobs finished");
            }
            DrainOutcome::DeadlineExceeded { remaining } => {
                warn!(
                    remaining,
                    timeout_secs = self.timeout.as_secs(),
                    "graceful shutdown timed out; forcing exit"
                );
            }
        }
        Ok(outcome)
    }

    async fn drain(&self, deadline: Instant) -> DrainOutcome {
        let started = Instant::now();
        let forced = sleep_until(deadline);
        tokio::pin!(forced);

        let mut polls: u32 = 0;
        loop {
            let remaining = self.registry.len();
            if remaining == 0 {
                return DrainOutcome::Drained {
                    elapsed: started.elapsed(),
                };
            }

            if polls % self.report_every == 0 {
                let left = deadline.saturating_duration_since(Instant::now());
                info!(
                    remaining,
                    seconds_until_forced_exit = left.as_secs_f64().ceil() as u64,
                    "waiting for active executions to finish"
                );
            }
            polls = polls.wrapping_add(1);

            tokio::select! {
                _ = &mut forced => {
                    return DrainOutcome::DeadlineExceeded {
                        remaining: self.registry.len(),
                    };
                }
                _ = sleep(self.poll_interval) => {}
            }
        }
    }

    fn transition(&self, next: ShutdownState) -> Result<(), CoreError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !matches!(*state, ShutdownState::Running) {
            return Err(CoreError::AlreadyDraining);
        }
        *state = next;
        Ok(())
    }

    fn set_state(&self, next: ShutdownState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }
}
