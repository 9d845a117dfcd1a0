//! Durable multi-step workflow execution.
//!
//! A workflow is a sequence of named steps. Each step runs under its own
//! [`RetryPolicy`] and its terminal result is journaled in the database, so a
//! run interrupted by a restart resumes at the first unfinished step.
//!
//! ```text
//! WorkflowManager::start ──> workflow_runs (running)
//!        │
//!        v
//! Workflow::execute ──> WorkflowContext::run("step", policy, f)
//!                              │  journaled?  ──> replay stored result
//!                              │  otherwise   ──> attempt, backoff, attempt...
//!                              v
//!                        workflow_steps (completed | failed)
//!        │
//!        v
//! CompletionHook::on_complete(success | failed | canceled)
//! ```

mod context;
mod journal;
mod manager;
mod retry;

pub use context::{StepError, WorkflowContext};
pub use journal::{RunId, RunRecord, RunStatus, StepRecord, StepStatus};
pub use manager::{CompletedRun, CompletionHook, Workflow, WorkflowManager, WorkflowOutcome};
pub use retry::RetryPolicy;
