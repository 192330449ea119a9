//! Periodic resource sync.
//!
//! Every interval the scheduler submits one `sync_resource` task per
//! configured scope. Rounds never overlap their own submission, but a slow
//! task may still be running when the next round submits the same scope;
//! the reconciler converges regardless.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use hcm_core::TaskId;
use hcm_sync::{SyncResourceAction, SyncResourceParams};
use hcm_task::{Action, Executor};

/// Submit one sync task per target. Targets that fail to submit are logged
/// and skipped.
pub async fn run_round(executor: &Executor, targets: &[SyncResourceParams]) -> Vec<TaskId> {
    let mut submitted = Vec::with_capacity(targets.len());
    for target in targets {
        let params = match serde_json::to_value(target) {
            Ok(params) => params,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode sync target");
                continue;
            }
        };
        match executor.submit(SyncResourceAction::NAME, params).await {
            Ok(handle) => submitted.push(handle.id()),
            Err(e) => {
                tracing::warn!(
                    scope = %target.scope,
                    kind = %target.kind,
                    error = %e,
                    "Scheduled sync rejected"
                );
            }
        }
    }
    tracing::debug!(submitted = submitted.len(), "Scheduled sync round");
    submitted
}

/// Run a round every `interval` until `cancel` fires. The first round starts
/// immediately.
pub fn spawn(
    executor: Executor,
    targets: Vec<SyncResourceParams>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            targets = targets.len(),
            interval_seconds = interval.as_secs(),
            "Sync scheduler started"
        );
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    run_round(&executor, &targets).await;
                }
            }
        }
        tracing::info!("Sync scheduler stopped");
    })
}
