//! Sync scheduler tests.

mod common;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::TestHarness;
use hcm_core::{ResourceKind, Scope, Vendor};
use hcm_service::scheduler;
use hcm_sync::SyncResourceParams;

fn target(kind: ResourceKind, scope: Scope) -> SyncResourceParams {
    SyncResourceParams {
        scope,
        kind,
        cloud_ids: Vec::new(),
    }
}

#[tokio::test]
async fn round_submits_one_task_per_valid_target() {
    let harness = TestHarness::new();
    harness.seed_vpcs(&["vpc-1"]);
    let executor = harness.state.executor.clone();

    let targets = vec![
        target(ResourceKind::Vpc, TestHarness::scope()),
        // Disks need a zone; this target is rejected at submission.
        target(ResourceKind::Disk, Scope::new(Vendor::Aws, "acc-1", "us-east-1")),
    ];
    let submitted = scheduler::run_round(&executor, &targets).await;

    assert_eq!(submitted.len(), 1);
    let record = harness.wait_for(&submitted[0].to_string()).await;
    assert_eq!(record["state"], "succeeded");
}

#[tokio::test]
async fn scheduler_stops_on_cancel() {
    let harness = TestHarness::new();
    let cancel = CancellationToken::new();

    let handle = scheduler::spawn(
        harness.state.executor.clone(),
        vec![target(ResourceKind::Vpc, TestHarness::scope())],
        Duration::from_secs(3600),
        cancel.clone(),
    );
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();
}
