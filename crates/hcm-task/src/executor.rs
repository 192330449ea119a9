//! Task submission, retry and bookkeeping.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use hcm_core::{ErrorKind, HcmError, Result, TaskId};
use hcm_store::Store;

use crate::action::DynAction;
use crate::kit::ExecuteKit;
use crate::registry::ActionRegistry;
use crate::retry::RetryPolicy;

/// Finished tasks kept for lookup before the oldest are dropped.
const MAX_RETAINED_TASKS: usize = 10_000;

/// Lifecycle of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Accepted, not started.
    Pending,
    /// An attempt is running or waiting to retry.
    Running,
    /// The Action returned `Ok`.
    Succeeded,
    /// The Action failed terminally.
    Failed,
    /// Cancelled by the submitter or at shutdown.
    Cancelled,
}

impl TaskState {
    /// Whether the task has finished.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Failure reported to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskError {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl From<&HcmError> for TaskError {
    fn from(err: &HcmError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Everything known about one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    /// Task id.
    pub id: TaskId,
    /// Action name.
    pub action: String,
    /// Parameters as submitted.
    pub params: Value,
    /// Current state.
    pub state: TaskState,
    /// Attempts started so far.
    pub attempts: u32,
    /// Last error, if any.
    pub error: Option<TaskError>,
    /// Output of the successful run.
    pub result: Option<Value>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
}

/// Handle returned by [`Executor::submit`].
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    cancel: CancellationToken,
    join: JoinHandle<TaskRecord>,
}

impl TaskHandle {
    /// The task id.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Request cancellation. The Action stops at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the task to finish and return its final record.
    ///
    /// # Errors
    ///
    /// Returns `HcmError::InvariantViolation` if the task panicked.
    pub async fn wait(self) -> Result<TaskRecord> {
        self.join
            .await
            .map_err(|e| HcmError::invariant(format!("task {} aborted: {e}", self.id)))
    }
}

struct Entry {
    record: TaskRecord,
    cancel: CancellationToken,
}

type Tasks = Arc<RwLock<BTreeMap<TaskId, Entry>>>;

/// Runs Actions as tasks with bounded retry.
#[derive(Clone)]
pub struct Executor {
    registry: Arc<ActionRegistry>,
    store: Arc<dyn Store>,
    policy: RetryPolicy,
    tasks: Tasks,
    shutdown: CancellationToken,
}

impl Executor {
    /// Create an executor.
    pub fn new(registry: Arc<ActionRegistry>, store: Arc<dyn Store>, policy: RetryPolicy) -> Self {
        Self {
            registry,
            store,
            policy,
            tasks: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown: CancellationToken::new(),
        }
    }

    /// The registry tasks are resolved against.
    #[must_use]
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// The retry policy.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Resolve `name`, check `params`, and start the task in the background.
    ///
    /// # Errors
    ///
    /// Returns `HcmError::InvalidParameter` for an unknown Action or
    /// parameters that fail to decode or validate. Nothing is started then.
    pub async fn submit(&self, name: &str, params: Value) -> Result<TaskHandle> {
        let action = self.registry.resolve(name)?;
        action.check(&params)?;

        let id = TaskId::generate();
        let cancel = self.shutdown.child_token();
        let now = Utc::now();
        let record = TaskRecord {
            id,
            action: action.name().to_string(),
            params: params.clone(),
            state: TaskState::Pending,
            attempts: 0,
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        };

        {
            let mut tasks = self.tasks.write().await;
            tasks.insert(
                id,
                Entry {
                    record,
                    cancel: cancel.clone(),
                },
            );
            prune(&mut tasks);
        }

        tracing::info!(task_id = %id, action = %action.name(), "Task submitted");

        let kit = ExecuteKit::with_token(id.to_string(), Arc::clone(&self.store), cancel.clone());
        let run = TaskRun {
            id,
            action,
            params,
            kit,
            policy: self.policy,
            tasks: Arc::clone(&self.tasks),
        };
        let join = tokio::spawn(run.execute());

        Ok(TaskHandle { id, cancel, join })
    }

    /// Current record of a task.
    pub async fn get(&self, id: &TaskId) -> Option<TaskRecord> {
        self.tasks.read().await.get(id).map(|e| e.record.clone())
    }

    /// Request cancellation of a task. Returns `false` if the task is unknown
    /// or already finished.
    pub async fn cancel(&self, id: &TaskId) -> bool {
        let tasks = self.tasks.read().await;
        match tasks.get(id) {
            Some(entry) if !entry.record.state.is_terminal() => {
                entry.cancel.cancel();
                tracing::info!(task_id = %id, "Task cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Records of tasks that have not finished.
    pub async fn active(&self) -> Vec<TaskRecord> {
        self.tasks
            .read()
            .await
            .values()
            .filter(|e| !e.record.state.is_terminal())
            .map(|e| e.record.clone())
            .collect()
    }

    /// Cancel every task started by this executor. Running tasks stop at
    /// their next checkpoint; later submissions start already cancelled.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Token cancelled by [`shutdown`](Self::shutdown).
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

/// Drop the oldest finished records once the map grows past the bound.
fn prune(tasks: &mut BTreeMap<TaskId, Entry>) {
    if tasks.len() <= MAX_RETAINED_TASKS {
        return;
    }
    let excess = tasks.len() - MAX_RETAINED_TASKS;
    let doomed: Vec<TaskId> = tasks
        .iter()
        .filter(|(_, e)| e.record.state.is_terminal())
        .map(|(id, _)| *id)
        .take(excess)
        .collect();
    for id in doomed {
        tasks.remove(&id);
    }
}

struct TaskRun {
    id: TaskId,
    action: Arc<dyn DynAction>,
    params: Value,
    kit: ExecuteKit,
    policy: RetryPolicy,
    tasks: Tasks,
}

enum Outcome {
    Succeeded(Value),
    Failed(HcmError),
    Cancelled(HcmError),
}

impl TaskRun {
    async fn execute(self) -> TaskRecord {
        let outcome = self.attempt_loop().await;
        let (state, result, error) = match outcome {
            Outcome::Succeeded(value) => {
                tracing::info!(task_id = %self.id, action = %self.action.name(), "Task succeeded");
                (TaskState::Succeeded, Some(value), None)
            }
            Outcome::Failed(e) => {
                tracing::warn!(
                    task_id = %self.id,
                    action = %self.action.name(),
                    kind = %e.kind(),
                    error = %e,
                    "Task failed"
                );
                (TaskState::Failed, None, Some(TaskError::from(&e)))
            }
            Outcome::Cancelled(e) => {
                tracing::info!(task_id = %self.id, action = %self.action.name(), "Task cancelled");
                (TaskState::Cancelled, None, Some(TaskError::from(&e)))
            }
        };

        self.update(|r| {
            r.state = state;
            r.result = result;
            r.error = error;
        })
        .await
    }

    async fn attempt_loop(&self) -> Outcome {
        let max_attempts = self.policy.attempts();
        let mut attempt = 0;

        loop {
            if let Err(e) = self.kit.ensure_active() {
                return Outcome::Cancelled(e);
            }

            attempt += 1;
            self.update(|r| {
                r.state = TaskState::Running;
                r.attempts = attempt;
            })
            .await;

            let err = match self.action.run_json(&self.kit, self.params.clone()).await {
                Ok(value) => return Outcome::Succeeded(value),
                Err(e) => e,
            };

            if err.kind() == ErrorKind::Cancelled {
                return Outcome::Cancelled(err);
            }
            if !err.is_retryable() || attempt >= max_attempts {
                return Outcome::Failed(err);
            }

            let delay = self.policy.backoff(attempt);
            tracing::debug!(
                task_id = %self.id,
                attempt = %attempt,
                delay_ms = %delay.as_millis(),
                error = %err,
                "Task attempt failed, retrying"
            );
            self.update(|r| r.error = Some(TaskError::from(&err))).await;

            tokio::select! {
                () = self.kit.cancel_token().cancelled() => {
                    return Outcome::Cancelled(HcmError::Cancelled(format!(
                        "task {} cancelled while waiting to retry",
                        self.id
                    )));
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn update(&self, apply: impl FnOnce(&mut TaskRecord)) -> TaskRecord {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&self.id) {
            Some(entry) => {
                apply(&mut entry.record);
                entry.record.updated_at = Utc::now();
                entry.record.clone()
            }
            None => {
                // Pruned while running; report a detached record.
                let now = Utc::now();
                let mut record = TaskRecord {
                    id: self.id,
                    action: self.action.name().to_string(),
                    params: self.params.clone(),
                    state: TaskState::Running,
                    attempts: 0,
                    error: None,
                    result: None,
                    created_at: now,
                    updated_at: now,
                };
                apply(&mut record);
                record
            }
        }
    }
}
