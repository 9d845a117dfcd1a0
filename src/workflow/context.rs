//! Step execution with retries and journaling.

use std::fmt::Display;
use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::journal::{RunId, StepRecord, StepStatus};
use super::retry::RetryPolicy;
use crate::storage::queries::workflow as journal;
use crate::storage::{Database, DatabaseError};

/// Errors surfaced by [`WorkflowContext::run`].
#[derive(Debug, Error)]
pub enum StepError {
    /// Every attempt failed.
    #[error("step `{step}` failed after {attempts} attempt(s): {error}")]
    Failed {
        step: String,
        attempts: u32,
        error: String,
    },

    /// The run was canceled before or while the step ran.
    #[error("run was canceled")]
    Canceled,

    /// The journal could not be read or written.
    #[error("journal error: {0}")]
    Journal(#[from] DatabaseError),
}

/// Execution context handed to a workflow for one run.
///
/// Every [`run`](Self::run) call is a checkpoint: the result of a finished
/// step is journaled, and when the run is resumed the journaled result is
/// returned instead of executing the step again.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    db: Database,
    run_id: RunId,
    cancel: CancellationToken,
}

impl WorkflowContext {
    pub(crate) fn new(db: Database, run_id: RunId, cancel: CancellationToken) -> Self {
        Self {
            db,
            run_id,
            cancel,
        }
    }

    /// Identifier of the run being executed.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Executes a named step under `policy`.
    ///
    /// `step` is invoked once per attempt. Between failed attempts the context
    /// sleeps for the policy's backoff, waking early if the run is canceled.
    pub async fn run<T, E, F, Fut>(
        &self,
        name: &str,
        policy: RetryPolicy,
        mut step: F,
    ) -> Result<T, StepError>
    where
        T: Serialize + DeserializeOwned,
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(record) = journal::get_step(&self.db, &self.run_id, name).await? {
            debug!(run_id = %self.run_id, step = name, "replaying journaled step");
            return replay(record);
        }

        let attempts = policy.attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if self.cancel.is_cancelled() {
                return Err(StepError::Canceled);
            }

            debug!(run_id = %self.run_id, step = name, attempt, "running step");

            match step().await {
                Ok(value) => {
                    let output = serde_json::to_string(&value).map_err(DatabaseError::from)?;
                    self.record(name, StepStatus::Completed, attempt, Some(output), None)
                        .await?;
                    info!(run_id = %self.run_id, step = name, attempt, "step completed");
                    return Ok(value);
                }
                Err(e) => {
                    last_error = e.to_string();

                    if attempt < attempts {
                        let delay = policy.delay_after(attempt);
                        warn!(
                            run_id = %self.run_id,
                            step = name,
                            attempt,
                            max_attempts = attempts,
                            error = %last_error,
                            "step failed, retrying in {:?}",
                            delay
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = self.cancel.cancelled() => return Err(StepError::Canceled),
                        }
                    }
                }
            }
        }

        error!(
            run_id = %self.run_id,
            step = name,
            attempts,
            error = %last_error,
            "step exhausted its attempts"
        );
        self.record(
            name,
            StepStatus::Failed,
            attempts,
            None,
            Some(last_error.clone()),
        )
        .await?;

        Err(StepError::Failed {
            step: name.to_string(),
            attempts,
            error: last_error,
        })
    }

    async fn record(
        &self,
        name: &str,
        status: StepStatus,
        attempts: u32,
        output_json: Option<String>,
        error: Option<String>,
    ) -> Result<(), StepError> {
        let record = StepRecord {
            run_id: self.run_id.clone(),
            step_name: name.to_string(),
            status,
            attempts,
            output_json,
            error,
            finished_at: chrono::Utc::now(),
        };
        journal::record_step(&self.db, &record).await?;
        Ok(())
    }
}

fn replay<T: DeserializeOwned>(record: StepRecord) -> Result<T, StepError> {
    match record.status {
        StepStatus::Completed => {
            let output = record.output_json.as_deref().unwrap_or("null");
            Ok(serde_json::from_str(output).map_err(DatabaseError::from)?)
        }
        StepStatus::Failed => Err(StepError::Failed {
            step: record.step_name,
            attempts: record.attempts,
            error: record.error.unwrap_or_default(),
        }),
    }
}
