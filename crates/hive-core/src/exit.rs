use std::fmt;

/// Why the worker process is terminating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Drain finished with the registry empty.
    Drained,
    /// Drain deadline hit with jobs still registered.
    ForcedAfterDeadline { remaining: usize },
    /// Queue stayed unreachable longer than tolerated.
    QueueUnreachable,
    /// Queue transport could not be set up at all.
    InitializationFailed,
    /// Unclassified fatal error, or a failure on the shutdown path.
    Crash(String),
}

impl ExitReason {
    pub const QUEUE_UNREACHABLE: i32 = 1;
    pub const INITIALIZATION_FAILED: i32 = 2;
    pub const CRASH: i32 = 3;

    /// Process exit code for this reason.
    pub fn code(&self) -> i32 {
        match self {
            ExitReason::Drained | ExitReason::ForcedAfterDeadline { .. } => 0,
            ExitReason::QueueUnreachable => Self::QUEUE_UNREACHABLE,
            ExitReason::InitializationFailed => Self::INITIALIZATION_FAILED,
            ExitReason::Crash(_) => Self::CRASH,
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Drained => f.write_str("drained"),
            ExitReason::ForcedAfterDeadline { remaining } => {
                write!(f, "forced exit with {remaining} job(s) still running")
            }
            ExitReason::QueueUnreachable => f.write_str("queue unreachable beyond tolerance"),
            ExitReason::InitializationFailed => {
                f.write_str("non-recoverable worker initialization failure")
            }
            ExitReason::Crash(reason) => write!(f, "crash: {reason}"),
        }
    }
}
