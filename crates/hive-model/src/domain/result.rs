use serde::{Deserialize, Serialize};

/// Structured description of why a job did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDescriptor {
    /// Short machine-readable category (`"authorization"`, `"cancelled"`, ...).
    pub kind: String,
    pub message: String,
}

impl ErrorDescriptor {
    pub const AUTHORIZATION: &'static str = "authorization";
    pub const CANCELLED: &'static str = "cancelled";
    pub const EXECUTION: &'static str = "execution";

    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Final outcome reported back to the queue for a completed job.
///
/// `success: true` with an `error` means the job ran and determined it could not proceed
/// (for example an authorization denial); it is still a completed job, not a crash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
}

impl ExecutionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: ErrorDescriptor) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }

    /// Completed job that carries a domain error.
    pub fn completed_with(error: ErrorDescriptor) -> Self {
        Self {
            success: true,
            error: Some(error),
        }
    }
}
