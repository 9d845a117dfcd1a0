//! Workflow definitions, run lifecycle and completion hooks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::context::{StepError, WorkflowContext};
use super::journal::{RunId, RunRecord, RunStatus};
use crate::storage::queries::workflow as journal;
use crate::storage::{Database, DatabaseError};

/// A multi-step workflow executed through a [`WorkflowContext`].
#[async_trait]
pub trait Workflow: Send + Sync + 'static {
    /// Input persisted with the run and handed back on resume.
    type Input: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Stable name stored with every run.
    fn name(&self) -> &'static str;

    /// Business key used to correlate a run with the outside world.
    fn correlation_id(&self, input: &Self::Input) -> String;

    /// Runs the workflow body.
    async fn execute(&self, ctx: &WorkflowContext, input: &Self::Input) -> Result<(), StepError>;
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Success,
    Failed { error: String },
    Canceled,
}

impl WorkflowOutcome {
    fn status(&self) -> RunStatus {
        match self {
            WorkflowOutcome::Success => RunStatus::Succeeded,
            WorkflowOutcome::Failed { .. } => RunStatus::Failed,
            WorkflowOutcome::Canceled => RunStatus::Canceled,
        }
    }

    fn error(&self) -> Option<&str> {
        match self {
            WorkflowOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// A finished run as reported to the [`CompletionHook`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRun {
    pub run_id: RunId,
    pub workflow: &'static str,
    pub correlation_id: String,
    pub outcome: WorkflowOutcome,
}

/// Invoked once for every run that reaches a terminal outcome.
#[async_trait]
pub trait CompletionHook: Send + Sync {
    async fn on_complete(&self, run: &CompletedRun);
}

/// Starts, resumes and cancels runs of one workflow.
///
/// Each run executes in its own task; runs for different inputs are fully
/// independent of each other.
pub struct WorkflowManager<W: Workflow> {
    db: Database,
    workflow: Arc<W>,
    hook: Arc<dyn CompletionHook>,
    active: Arc<Mutex<HashMap<RunId, CancellationToken>>>,
}

impl<W: Workflow> Clone for WorkflowManager<W> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            workflow: self.workflow.clone(),
            hook: self.hook.clone(),
            active: self.active.clone(),
        }
    }
}

impl<W: Workflow> WorkflowManager<W> {
    pub fn new(db: Database, workflow: W, hook: Arc<dyn CompletionHook>) -> Self {
        Self {
            db,
            workflow: Arc::new(workflow),
            hook,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Persists a new run and executes it in the background.
    ///
    /// Returns as soon as the run is recorded.
    pub async fn start(&self, input: W::Input) -> Result<RunId, DatabaseError> {
        let record = self.create_run(&input).await?;
        let run_id = record.id.clone();
        let token = self.register(&run_id).await;

        let manager = self.clone();
        tokio::spawn(async move {
            manager.drive(record, input, token).await;
        });

        Ok(run_id)
    }

    /// Persists a new run and executes it to completion on the current task.
    pub async fn run(&self, input: W::Input) -> Result<CompletedRun, DatabaseError> {
        let record = self.create_run(&input).await?;
        let token = self.register(&record.id).await;
        Ok(self.drive(record, input, token).await)
    }

    /// Re-spawns every run of this workflow that never finished.
    ///
    /// Steps already journaled by a previous process are replayed, not re-executed.
    pub async fn resume_incomplete(&self) -> Result<Vec<RunId>, DatabaseError> {
        let pending = journal::list_running(&self.db, self.workflow.name()).await?;
        let mut resumed = Vec::with_capacity(pending.len());

        for record in pending {
            let Some(token) = self.try_register(&record.id).await else {
                continue;
            };

            // The listing may predate a run that finished since.
            let still_running = journal::get_run(&self.db, &record.id)
                .await
                .map(|run| run.is_some_and(|run| run.status == RunStatus::Running));
            match still_running {
                Ok(true) => {}
                Ok(false) => {
                    self.active.lock().await.remove(&record.id);
                    continue;
                }
                Err(e) => {
                    self.active.lock().await.remove(&record.id);
                    return Err(e);
                }
            }

            let input: W::Input = match serde_json::from_str(&record.input_json) {
                Ok(input) => input,
                Err(e) => {
                    error!(run_id = %record.id, error = %e, "cannot decode run input, failing run");
                    self.active.lock().await.remove(&record.id);
                    let outcome = WorkflowOutcome::Failed {
                        error: format!("undecodable input: {e}"),
                    };
                    self.finish(&record, outcome).await;
                    continue;
                }
            };

            info!(run_id = %record.id, correlation_id = %record.correlation_id, "resuming run");
            resumed.push(record.id.clone());

            let manager = self.clone();
            tokio::spawn(async move {
                manager.drive(record, input, token).await;
            });
        }

        Ok(resumed)
    }

    /// Requests cancellation of an active run.
    ///
    /// Returns `false` if the run is not executing in this process.
    pub async fn cancel(&self, run_id: &RunId) -> bool {
        match self.active.lock().await.get(run_id) {
            Some(token) => {
                info!(run_id = %run_id, "cancel requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of runs currently executing in this process.
    pub async fn active_runs(&self) -> usize {
        self.active.lock().await.len()
    }

    async fn create_run(&self, input: &W::Input) -> Result<RunRecord, DatabaseError> {
        let now = Utc::now();
        let record = RunRecord {
            id: RunId::generate(),
            workflow: self.workflow.name().to_string(),
            correlation_id: self.workflow.correlation_id(input),
            input_json: serde_json::to_string(input)?,
            status: RunStatus::Running,
            error: None,
            created_at: now,
            updated_at: now,
        };
        journal::insert_run(&self.db, &record).await?;
        info!(
            run_id = %record.id,
            workflow = %record.workflow,
            correlation_id = %record.correlation_id,
            "run created"
        );
        Ok(record)
    }

    async fn register(&self, run_id: &RunId) -> CancellationToken {
        let token = CancellationToken::new();
        self.active.lock().await.insert(run_id.clone(), token.clone());
        token
    }

    /// Registers `run_id` unless it is already executing in this process.
    async fn try_register(&self, run_id: &RunId) -> Option<CancellationToken> {
        let mut active = self.active.lock().await;
        if active.contains_key(run_id) {
            return None;
        }
        let token = CancellationToken::new();
        active.insert(run_id.clone(), token.clone());
        Some(token)
    }

    async fn drive(&self, record: RunRecord, input: W::Input, token: CancellationToken) -> CompletedRun {
        let ctx = WorkflowContext::new(self.db.clone(), record.id.clone(), token);

        let outcome = match self.workflow.execute(&ctx, &input).await {
            Ok(()) => WorkflowOutcome::Success,
            Err(StepError::Canceled) => WorkflowOutcome::Canceled,
            Err(e) => WorkflowOutcome::Failed {
                error: e.to_string(),
            },
        };

        // Unregister only after the outcome is persisted.
        let completed = self.finish(&record, outcome).await;
        self.active.lock().await.remove(&record.id);
        completed
    }

    async fn finish(&self, record: &RunRecord, outcome: WorkflowOutcome) -> CompletedRun {
        if let Err(e) =
            journal::finish_run(&self.db, &record.id, outcome.status(), outcome.error()).await
        {
            warn!(run_id = %record.id, error = %e, "failed to persist run outcome");
        }

        let completed = CompletedRun {
            run_id: record.id.clone(),
            workflow: self.workflow.name(),
            correlation_id: record.correlation_id.clone(),
            outcome,
        };
        self.hook.on_complete(&completed).await;
        completed
    }
}
