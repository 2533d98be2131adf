use async_trait::async_trait;
use hive_model::{ExecutionId, ExecutionRecord, ExecutionStatus, WorkflowId, WorkflowMeta};
use serde_json::Value;

use crate::error::StorageError;

/// Consumed interface of the execution/workflow store.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Trivial round-trip query used by the liveness probe.
    async fn ping(&self) -> Result<(), StorageError>;

    async fn find_execution(
        &self,
        id: &ExecutionId,
        include_data: bool,
    ) -> Result<Option<ExecutionRecord>, StorageError>;

    /// Minimal workflow metadata, static data included.
    async fn find_workflow(&self, id: &WorkflowId) -> Result<Option<WorkflowMeta>, StorageError>;

    async fn update_workflow_static_data(
        &self,
        id: &WorkflowId,
        data: Value,
    ) -> Result<(), StorageError>;

    async fn update_execution_status(
        &self,
        id: &ExecutionId,
        status: ExecutionStatus,
    ) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed,
    Denied { reason: String },
}

/// Permission check run before a workflow executes.
#[async_trait]
pub trait Authorizer: Send + Sync + 'static {
    async fn check(
        &self,
        workflow: &WorkflowMeta,
        owner_id: &str,
    ) -> Result<AuthDecision, StorageError>;
}
