//! Worker-node core: job intake, the running-job registry, cancellation, connection
//! health, graceful shutdown and the fleet-facing read model.

pub mod adapter;
pub use adapter::{ExecutionAdapter, ExecutionReport, ExecutionRequest, ProgressSink};
pub mod cancel;
pub use cancel::CancellationListener;
pub mod classifier;
pub use classifier::{ConnectionFailureWindow, ConnectionHealthClassifier, Verdict};
pub mod config;
pub use config::WorkerConfig;
pub mod error;
pub use error::{CoreError, ExecError, JobFailure, QueueError, StorageError};
pub mod exit;
pub use exit::ExitReason;
pub mod fleet;
pub use fleet::{EventLog, FleetGateway, NoopEventLog};
pub mod health;
pub use health::{Dependency, HealthCheck, HealthReport};
pub mod intake;
pub use intake::JobIntake;
pub mod memory;
pub mod metrics;
pub use metrics::{JobOutcome, MetricsBackend, MetricsHandle};
pub mod processor;
pub use processor::JobProcessor;
pub mod queue;
pub use queue::{JobHandler, JobQueue, QueueSignal};
pub mod registry;
pub use registry::{RunningJobEntry, RunningJobGuard, RunningJobRegistry};
pub mod shutdown;
pub use shutdown::{DrainOutcome, ShutdownController, ShutdownHook, ShutdownState};
pub mod storage;
pub use storage::{AuthDecision, Authorizer, Storage};
pub mod system;
pub mod worker;
pub use worker::{Worker, WorkerBuilder};
