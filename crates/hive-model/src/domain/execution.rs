use std::{fmt, str::FromStr, time::SystemTime};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ExecutionId, ModelError, WorkflowMeta};

/// How an execution was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionMode {
    Manual,
    Trigger,
    Webhook,
    Retry,
    Error,
    Integrated,
    Internal,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Manual => "manual",
            ExecutionMode::Trigger => "trigger",
            ExecutionMode::Webhook => "webhook",
            ExecutionMode::Retry => "retry",
            ExecutionMode::Error => "error",
            ExecutionMode::Integrated => "integrated",
            ExecutionMode::Internal => "internal",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(ExecutionMode::Manual),
            "trigger" => Ok(ExecutionMode::Trigger),
            "webhook" => Ok(ExecutionMode::Webhook),
            "retry" => Ok(ExecutionMode::Retry),
            "error" => Ok(ExecutionMode::Error),
            "integrated" => Ok(ExecutionMode::Integrated),
            "internal" => Ok(ExecutionMode::Internal),
            _ => Err(ModelError::UnknownMode(s.to_string())),
        }
    }
}

/// Persisted state of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionStatus {
    /// Created, not yet picked up.
    New,
    /// A worker is executing it.
    Running,
    /// Finished without error.
    Success,
    /// Finished with an error (including authorization denial).
    Error,
    /// Aborted through a cancellation signal.
    Canceled,
    /// The worker died while executing it.
    Crashed,
    /// Suspended until an external event resumes it.
    Waiting,
}

impl ExecutionStatus {
    /// Returns `true` if the execution will not transition further.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Success
                | ExecutionStatus::Error
                | ExecutionStatus::Canceled
                | ExecutionStatus::Crashed
        )
    }
}

impl FromStr for ExecutionStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(ExecutionStatus::New),
            "running" => Ok(ExecutionStatus::Running),
            "success" => Ok(ExecutionStatus::Success),
            "error" => Ok(ExecutionStatus::Error),
            "canceled" => Ok(ExecutionStatus::Canceled),
            "crashed" => Ok(ExecutionStatus::Crashed),
            "waiting" => Ok(ExecutionStatus::Waiting),
            _ => Err(ModelError::UnknownStatus(s.to_string())),
        }
    }
}

/// Stored execution as seen by the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub workflow: WorkflowMeta,
    pub mode: ExecutionMode,
    pub status: ExecutionStatus,
    /// Execution this one retries, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<ExecutionId>,
    /// When a worker last started it.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::domain::time_serde::option"
    )]
    pub started_at: Option<SystemTime>,
    /// Full run data; only populated when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ExecutionRecord {
    pub fn new(id: impl Into<ExecutionId>, workflow: WorkflowMeta, mode: ExecutionMode) -> Self {
        Self {
            id: id.into(),
            workflow,
            mode,
            status: ExecutionStatus::New,
            retry_of: None,
            started_at: None,
            data: None,
        }
    }

    pub fn with_retry_of(mut self, original: impl Into<ExecutionId>) -> Self {
        self.retry_of = Some(original.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Webhook".parse::<ExecutionMode>().unwrap(), ExecutionMode::Webhook);
        assert!("cron".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn finished_statuses() {
        assert!(ExecutionStatus::Success.is_finished());
        assert!(ExecutionStatus::Canceled.is_finished());
        assert!(!ExecutionStatus::Running.is_finished());
        assert!(!ExecutionStatus::Waiting.is_finished());
    }

    #[test]
    fn status_serializes_camel_case() {
        let json = serde_json::to_string(&ExecutionStatus::Canceled).unwrap();
        assert_eq!(json, r#""canceled""#);
    }
}
