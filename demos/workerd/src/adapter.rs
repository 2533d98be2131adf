use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use hive_core::{ExecError, ExecutionAdapter, ExecutionReport, ExecutionRequest, ProgressSink};
use hive_model::{ErrorDescriptor, ExecutionResult};
use serde_json::{Value, json};
use tokio::time::sleep;
use tracing::debug;

const DEFAULT_STEPS: u64 = 3;
const DEFAULT_STEP_MS: u64 = 1_000;

/// Stand-in execution engine: walks `steps` steps of `stepMs` each, as given by the
/// execution's run data, reporting progress after every step.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepAdapter;

#[async_trait]
impl ExecutionAdapter for StepAdapter {
    async fn execute(
        &self,
        request: ExecutionRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<ExecutionReport, ExecError> {
        let data = request.execution.data.as_ref();
        let steps = field(data, "steps").unwrap_or(DEFAULT_STEPS);
        let step = Duration::from_millis(field(data, "stepMs").unwrap_or(DEFAULT_STEP_MS));

        for n in 1..=steps {
            if request
                .deadline
                .is_some_and(|deadline| SystemTime::now() + step > deadline)
            {
                return Ok(ExecutionReport::new(ExecutionResult::failed(
                    ErrorDescriptor::new(ErrorDescriptor::EXECUTION, "execution timed out"),
                )));
            }

            tokio::select! {
                _ = request.cancel.cancelled() => return Err(ExecError::Cancelled),
                _ = sleep(step) => {}
            }
            debug!(job_id = %request.job_id, step = n, of = steps, "step finished");
            progress.emit(json!({"step": n, "of": steps})).await;
        }

        let mut report = ExecutionReport::new(ExecutionResult::ok());
        if let Some(previous) = request.workflow.static_data {
            let runs = field(Some(&previous), "runs").unwrap_or(0);
            report = report.with_static_data(json!({"runs": runs + 1}));
        }
        Ok(report)
    }
}

fn field(data: Option<&Value>, key: &str) -> Option<u64> {
    data?.get(key)?.as_u64()
}
