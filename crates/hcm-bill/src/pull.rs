//! Pull task lookup and transitions.

use async_trait::async_trait;

use hcm_core::{BillKey, BillPullTask, BillPullTaskPatch, HcmError, PullState, Result};
use hcm_store::Store;
use hcm_task::{Action, ExecuteKit};

use crate::lookup::at_most_one;
use crate::params::DayParams;

/// The one pull task of a day.
///
/// # Errors
///
/// Returns `InvariantViolation` when no task or more than one task matches.
pub async fn find_pull_task(
    store: &dyn Store,
    key: &BillKey,
    version_id: u32,
    bill_day: u32,
) -> Result<BillPullTask> {
    let filter = key.day_filter(version_id, bill_day);
    at_most_one(store.pull_tasks(), &filter, "pull task")
        .await?
        .ok_or_else(|| {
            HcmError::invariant(format!(
                "no pull task for {key} version {version_id} day {bill_day}"
            ))
        })
}

/// Move a task to `next`.
pub(crate) async fn transition(
    store: &dyn Store,
    task: &BillPullTask,
    next: PullState,
) -> Result<()> {
    if !task.state.can_transition_to(next) {
        return Err(HcmError::invariant(format!(
            "pull task {} cannot move from {} to {next}",
            task.id, task.state
        )));
    }
    store
        .pull_tasks()
        .update_by_id(&task.id, &BillPullTaskPatch { state: Some(next) })
        .await?;
    tracing::debug!(task_id = %task.id, from = %task.state, to = %next, "Pull task transitioned");
    Ok(())
}

/// Send an `Accounted` day back to `Splitted` so the daily summary runs
/// again. Returns whether the state changed; a `Splitted` day is left alone.
///
/// # Errors
///
/// Returns `InvariantViolation` for a missing or duplicated task and
/// `InvalidParameter` for a day that has not been split yet.
pub async fn retrigger(
    store: &dyn Store,
    key: &BillKey,
    version_id: u32,
    bill_day: u32,
) -> Result<bool> {
    let task = find_pull_task(store, key, version_id, bill_day).await?;
    match task.state {
        PullState::Splitted => Ok(false),
        PullState::Accounted => {
            transition(store, &task, PullState::Splitted).await?;
            Ok(true)
        }
        PullState::Pulling | PullState::Pulled => Err(HcmError::invalid_parameter(format!(
            "pull task {} is {}, nothing to retrigger",
            task.id, task.state
        ))),
    }
}

/// Re-runs aggregation for a day by sending it back to `Splitted`.
pub struct RetriggerAction;

#[async_trait]
impl Action for RetriggerAction {
    const NAME: &'static str = "retrigger_bill_day";
    type Params = DayParams;
    type Output = bool;

    async fn run(&self, kit: &ExecuteKit, params: DayParams) -> Result<bool> {
        kit.ensure_active()?;
        retrigger(kit.store(), &params.key, params.version_id, params.bill_day).await
    }
}
