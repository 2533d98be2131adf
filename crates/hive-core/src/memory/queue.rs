use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use hive_model::{ExecutionResult, Job, JobId};
use serde_json::Value;
use tokio::sync::{Notify, Semaphore, broadcast};
use tracing::{debug, trace};

use crate::{
    error::QueueError,
    queue::{JobHandler, JobQueue, QueueSignal},
};

const CHANNEL_CAPACITY: usize = 256;
const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// How the queue recorded a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Completed(ExecutionResult),
    Failed { reason: String, retryable: bool },
}

/// FIFO job queue living in the worker process.
///
/// Honours the subscriber's concurrency with a semaphore and stops handing out jobs once
/// paused. The most recent settlements and progress payloads are kept for inspection,
/// oldest first out once the history limit is reached.
#[derive(Clone)]
pub struct MemoryQueue {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<QueueState>,
    available: Notify,
    settled: Notify,
    signals: broadcast::Sender<QueueSignal>,
    errors: broadcast::Sender<QueueError>,
    reachable: AtomicBool,
    subscribed: AtomicBool,
    history_limit: usize,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Job>,
    paused: bool,
    in_flight: usize,
    peak_in_flight: usize,
    settlements: HashMap<JobId, Settlement>,
    settled_order: VecDeque<JobId>,
    progress: VecDeque<(JobId, Value)>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Queue that retains at most `limit` settlements and `limit` progress payloads.
    pub fn with_history_limit(limit: usize) -> Self {
        let (signals, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (errors, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                available: Notify::new(),
                settled: Notify::new(),
                signals,
                errors,
                reachable: AtomicBool::new(true),
                subscribed: AtomicBool::new(false),
                history_limit: limit.max(1),
            }),
        }
    }

    pub fn push(&self, job: Job) {
        trace!(job_id = %job.id, "job enqueued");
        self.inner.lock().pending.push_back(job);
        self.inner.available.notify_one();
    }

    /// Broadcast a cancel signal to every subscribed worker.
    pub fn cancel(&self, job_id: impl Into<JobId>) {
        let _ = self.inner.signals.send(QueueSignal::Cancel {
            job_id: job_id.into(),
        });
    }

    /// Inject a transport error into the error stream.
    pub fn emit_error(&self, err: QueueError) {
        let _ = self.inner.errors.send(err);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight
    }

    /// Highest number of jobs handed out at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.inner.lock().peak_in_flight
    }

    pub fn settlement(&self, id: &JobId) -> Option<Settlement> {
        self.inner.lock().settlements.get(id).cloned()
    }

    /// Wait until the job with `id` has been settled.
    pub async fn wait_settled(&self, id: &JobId) -> Settlement {
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(settlement) = self.settlement(id) {
                return settlement;
            }
            notified.await;
        }
    }

    pub fn progress_for(&self, id: &JobId) -> Vec<Value> {
        self.inner
            .lock()
            .progress
            .iter()
            .filter(|(job_id, _)| job_id == id)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_take(&self) -> Option<Job> {
        let mut state = self.lock();
        if state.paused {
            return None;
        }
        let job = state.pending.pop_front()?;
        state.in_flight += 1;
        state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
        Some(job)
    }

    async fn next_job(&self) -> Job {
        loop {
            if let Some(job) = self.try_take() {
                return job;
            }
            self.available.notified().await;
        }
    }

    fn settle(&self, id: JobId, settlement: Settlement) {
        {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            if state.settlements.insert(id.clone(), settlement).is_none() {
                state.settled_order.push_back(id);
            }
            while state.settled_order.len() > self.history_limit {
                if let Some(oldest) = state.settled_order.pop_front() {
                    state.settlements.remove(&oldest);
                }
            }
        }
        self.settled.notify_waiters();
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn subscribe(
        &self,
        concurrency: usize,
        handler: Arc<dyn JobHandler>,
    ) -> Result<(), QueueError> {
        if !self.inner.reachable.load(Ordering::SeqCst) {
            return Err(QueueError::ConnectionRefused("memory queue offline".into()));
        }
        if self.inner.subscribed.swap(true, Ordering::SeqCst) {
            return Err(QueueError::InitializationFailed(
                "memory queue already has a subscriber".into(),
            ));
        }

        let inner = Arc::clone(&self.inner);
        let permits = Arc::new(Semaphore::new(concurrency));
        tokio::spawn(async move {
            loop {
                let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                    break;
                };
                let job = inner.next_job().await;
                let inner = Arc::clone(&inner);
                let handler = Arc::clone(&handler);

                tokio::spawn(async move {
                    let _permit = permit;
                    let id = job.id.clone();
                    let settlement = match handler.handle(job).await {
                        Ok(result) => Settlement::Completed(result),
                        Err(e) => Settlement::Failed {
                            reason: e.to_string(),
                            retryable: e.is_retryable(),
                        },
                    };
                    debug!(job_id = %id, ?settlement, "job settled");
                    inner.settle(id, settlement);
                });
            }
        });
        Ok(())
    }

    async fn report_progress(&self, job_id: &JobId, payload: Value) -> Result<(), QueueError> {
        let mut state = self.inner.lock();
        state.progress.push_back((job_id.clone(), payload));
        if state.progress.len() > self.inner.history_limit {
            state.progress.pop_front();
        }
        Ok(())
    }

    async fn pause_intake(&self) -> Result<(), QueueError> {
        self.inner.lock().paused = true;
        Ok(())
    }

    async fn ping(&self) -> Result<(), QueueError> {
        if self.inner.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(QueueError::ConnectionRefused("memory queue offline".into()))
        }
    }

    fn subscribe_errors(&self) -> broadcast::Receiver<QueueError> {
        self.inner.errors.subscribe()
    }

    fn subscribe_signals(&self) -> broadcast::Receiver<QueueSignal> {
        self.inner.signals.subscribe()
    }
}
