use std::{
    collections::HashMap,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::SystemTime,
};

use async_trait::async_trait;
use hive_model::{
    ExecutionId, ExecutionRecord, ExecutionStatus, WorkflowId, WorkflowMeta,
};
use serde_json::Value;

use crate::{error::StorageError, storage::Storage};

/// Execution and workflow store held in memory.
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<RwLock<StorageState>>,
    reachable: Arc<AtomicBool>,
}

#[derive(Default)]
struct StorageState {
    executions: HashMap<ExecutionId, ExecutionRecord>,
    workflows: HashMap<WorkflowId, WorkflowMeta>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StorageState::default())),
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Store an execution; its workflow is stored too unless already present.
    pub fn insert_execution(&self, record: ExecutionRecord) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state
            .workflows
            .entry(record.workflow.id.clone())
            .or_insert_with(|| record.workflow.clone());
        state.executions.insert(record.id.clone(), record);
    }

    pub fn insert_workflow(&self, workflow: WorkflowMeta) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.workflows.insert(workflow.id.clone(), workflow);
    }

    pub fn execution(&self, id: &str) -> Option<ExecutionRecord> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.executions.get(id).cloned()
    }

    pub fn workflow(&self, id: &str) -> Option<WorkflowMeta> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.workflows.get(id).cloned()
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn ensure_reachable(&self) -> Result<(), StorageError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("memory storage offline".into()))
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn ping(&self) -> Result<(), StorageError> {
        self.ensure_reachable()
    }

    async fn find_execution(
        &self,
        id: &ExecutionId,
        include_data: bool,
    ) -> Result<Option<ExecutionRecord>, StorageError> {
        self.ensure_reachable()?;
        let mut record = self.execution(id);
        if !include_data && let Some(record) = record.as_mut() {
            record.data = None;
        }
        Ok(record)
    }

    async fn find_workflow(&self, id: &WorkflowId) -> Result<Option<WorkflowMeta>, StorageError> {
        self.ensure_reachable()?;
        Ok(self.workflow(id))
    }

    async fn update_workflow_static_data(
        &self,
        id: &WorkflowId,
        data: Value,
    ) -> Result<(), StorageError> {
        self.ensure_reachable()?;
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let workflow = state
            .workflows
            .get_mut(id)
            .ok_or_else(|| StorageError::Query(format!("workflow {id} not found")))?;
        workflow.static_data = Some(data);
        Ok(())
    }

    async fn update_execution_status(
        &self,
        id: &ExecutionId,
        status: ExecutionStatus,
    ) -> Result<(), StorageError> {
        self.ensure_reachable()?;
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let record = state
            .executions
            .get_mut(id)
            .ok_or_else(|| StorageError::Query(format!("execution {id} not found")))?;
        record.status = status;
        if status == ExecutionStatus::Running {
            record.started_at = Some(SystemTime::now());
        }
        Ok(())
    }
}
