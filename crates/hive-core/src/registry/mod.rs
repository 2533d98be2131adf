mod entry;
pub use entry::RunningJobEntry;

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use hive_model::{JobId, RunningJobSummary};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::error::CoreError;

/// Table of the jobs this worker is executing right now.
///
/// Shared by the intake path, the cancellation listener, the drain loop and fleet queries.
/// Every mutation happens under one write lock, so readers never see half-built entries.
#[derive(Clone, Default)]
pub struct RunningJobRegistry {
    inner: Arc<RwLock<HashMap<JobId, RunningJobEntry>>>,
}

impl RunningJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly admitted job.
    ///
    /// A second entry for the same id breaks the one-entry-per-job invariant;
    /// it is refused and the existing entry stays untouched.
    pub fn add(&self, entry: RunningJobEntry) -> Result<(), CoreError> {
        let mut jobs = self.write();
        if jobs.contains_key(&entry.job_id) {
            error!(job_id = %entry.job_id, "job registered twice; keeping the first entry");
            return Err(CoreError::DuplicateJob(entry.job_id));
        }
        trace!(job_id = %entry.job_id, execution_id = %entry.execution_id, "job registered");
        jobs.insert(entry.job_id.clone(), entry);
        Ok(())
    }

    /// Track a job for as long as the returned guard lives.
    pub fn register(&self, entry: RunningJobEntry) -> Result<RunningJobGuard, CoreError> {
        let job_id = entry.job_id.clone();
        self.add(entry)?;
        Ok(RunningJobGuard {
            registry: self.clone(),
            job_id,
        })
    }

    pub fn remove(&self, id: &JobId) -> Option<RunningJobEntry> {
        let removed = self.write().remove(id);
        if removed.is_some() {
            trace!(job_id = %id, "job unregistered");
        }
        removed
    }

    /// Cancellation handle of a running job.
    pub fn get(&self, id: &JobId) -> Option<CancellationToken> {
        self.read().get(id).map(|entry| entry.cancel.clone())
    }

    /// Remove the job and fire its cancellation handle.
    ///
    /// Returns `false` when the job is not running here. The entry disappears before the
    /// execution has actually unwound, so a job can never be cancelled twice.
    pub fn cancel(&self, id: &JobId) -> bool {
        let Some(entry) = self.write().remove(id) else {
            return false;
        };
        entry.cancel.cancel();
        debug!(job_id = %id, execution_id = %entry.execution_id, "job cancelled");
        true
    }

    /// Ids of all running jobs, sorted.
    pub fn list_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Summaries of all running jobs, oldest first.
    pub fn snapshot(&self) -> Vec<RunningJobSummary> {
        let mut items: Vec<RunningJobSummary> =
            self.read().values().map(RunningJobEntry::summary).collect();
        items.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        items
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, RunningJobEntry>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, RunningJobEntry>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes its job from the registry when dropped.
///
/// Covers every way a handler can settle: normal return, error, or the future being dropped.
pub struct RunningJobGuard {
    registry: RunningJobRegistry,
    job_id: JobId,
}

impl RunningJobGuard {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }
}

impl Drop for RunningJobGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.job_id);
    }
}
