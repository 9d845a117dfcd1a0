//! Completion hook that reports terminal run outcomes to the log.

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::workflow::{CompletedRun, CompletionHook, WorkflowOutcome};

/// Logs every finished run.
///
/// Failures are logged at error level for operational follow-up; nothing is
/// persisted beyond the run record itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingCompletionHook;

#[async_trait]
impl CompletionHook for LoggingCompletionHook {
    async fn on_complete(&self, run: &CompletedRun) {
        match &run.outcome {
            WorkflowOutcome::Success => info!(
                run_id = %run.run_id,
                workflow = run.workflow,
                email_id = %run.correlation_id,
                "run succeeded"
            ),
            WorkflowOutcome::Failed { error } => error!(
                run_id = %run.run_id,
                workflow = run.workflow,
                email_id = %run.correlation_id,
                error = %error,
                "run failed"
            ),
            WorkflowOutcome::Canceled => warn!(
                run_id = %run.run_id,
                workflow = run.workflow,
                email_id = %run.correlation_id,
                "run canceled"
            ),
        }
    }
}
