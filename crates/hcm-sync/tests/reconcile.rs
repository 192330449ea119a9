//! Reconciler behaviour against a scripted vendor and the in-memory store.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use hcm_cloud::testing::FakeCloud;
use hcm_core::{CloudResource, ErrorKind, ResourceKind, Scope, Vendor};
use hcm_store::MemoryStore;
use hcm_sync::{DiskSync, ReconcileConfig, Reconciler, VpcSync};

use common::{kit, local, seed};

fn scope() -> Scope {
    Scope::new(Vendor::TCloud, "acc-1", "ap-guangzhou")
}

fn vpc_cloud(count: usize) -> FakeCloud {
    let fake = FakeCloud::new(Vendor::TCloud, ResourceKind::Vpc);
    for i in 0..count {
        fake.insert(&scope(), CloudResource::new(format!("vpc-{i}"), format!("net-{i}")));
    }
    fake
}

#[tokio::test]
async fn converges_for_any_page_size() {
    for page_size in [1, 2, 3, 7, 50] {
        let fake = vpc_cloud(7).with_page_size(page_size);
        let store = Arc::new(MemoryStore::new());
        let seeded = [("vpc-1", "stale-name"), ("vpc-gone", "old")];
        seed(&store, &scope(), ResourceKind::Vpc, &seeded).await;

        let report = Reconciler::default()
            .reconcile(&kit(&store), &scope(), &VpcSync, &fake)
            .await
            .unwrap();

        let records = local(&store, &scope(), ResourceKind::Vpc).await;
        let ids: BTreeSet<String> = records.keys().cloned().collect();
        let expected: BTreeSet<String> = fake.cloud_ids().into_iter().collect();
        assert_eq!(ids, expected, "page size {page_size}");
        assert_eq!(records["vpc-1"].name, "net-1");
        assert_eq!(report.listed, 7);
        assert_eq!(report.created, 6);
        assert_eq!(report.updated, 1);
        assert_eq!(report.deleted, 1);
    }
}

#[tokio::test]
async fn second_run_writes_nothing() {
    let fake = vpc_cloud(5);
    let store = Arc::new(MemoryStore::new());
    let reconciler = Reconciler::default();

    reconciler
        .reconcile(&kit(&store), &scope(), &VpcSync, &fake)
        .await
        .unwrap();
    let writes = store.resources.write_count();

    let again = reconciler
        .reconcile(&kit(&store), &scope(), &VpcSync, &fake)
        .await
        .unwrap();
    assert!(again.is_noop());
    assert_eq!(store.resources.write_count(), writes);
}

#[tokio::test]
async fn out_of_band_changes_are_picked_up() {
    let fake = vpc_cloud(3);
    let store = Arc::new(MemoryStore::new());
    let reconciler = Reconciler::default();
    reconciler
        .reconcile(&kit(&store), &scope(), &VpcSync, &fake)
        .await
        .unwrap();

    fake.rename("vpc-0", "renamed");
    fake.remove("vpc-2");
    let report = reconciler
        .reconcile(&kit(&store), &scope(), &VpcSync, &fake)
        .await
        .unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.deleted, 1);
    let records = local(&store, &scope(), ResourceKind::Vpc).await;
    assert_eq!(records["vpc-0"].name, "renamed");
    assert!(!records.contains_key("vpc-2"));
}

#[tokio::test]
async fn unlisted_resource_found_by_id_is_kept() {
    let fake = vpc_cloud(3);
    fake.hide_from_listing("vpc-1");
    let store = Arc::new(MemoryStore::new());
    seed(&store, &scope(), ResourceKind::Vpc, &[("vpc-1", "net-1")]).await;

    let report = Reconciler::default()
        .reconcile(&kit(&store), &scope(), &VpcSync, &fake)
        .await
        .unwrap();

    assert_eq!(report.candidates, 1);
    assert_eq!(report.kept, 1);
    assert_eq!(report.deleted, 0);
    assert!(local(&store, &scope(), ResourceKind::Vpc).await.contains_key("vpc-1"));
}

#[tokio::test]
async fn listing_failure_deletes_nothing() {
    let fake = vpc_cloud(5);
    fake.fail_list_call(1);
    let store = Arc::new(MemoryStore::new());
    seed(&store, &scope(), ResourceKind::Vpc, &[("vpc-gone", "old")]).await;

    let err = Reconciler::default()
        .reconcile(&kit(&store), &scope(), &VpcSync, &fake)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    assert!(local(&store, &scope(), ResourceKind::Vpc).await.contains_key("vpc-gone"));
}

#[tokio::test]
async fn confirmation_failure_deletes_nothing() {
    let fake = vpc_cloud(2);
    fake.fail_list_by_ids(true);
    let store = Arc::new(MemoryStore::new());
    seed(&store, &scope(), ResourceKind::Vpc, &[("vpc-gone", "old")]).await;

    let err = Reconciler::default()
        .reconcile(&kit(&store), &scope(), &VpcSync, &fake)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    assert!(local(&store, &scope(), ResourceKind::Vpc).await.contains_key("vpc-gone"));

    fake.fail_list_by_ids(false);
    let report = Reconciler::default()
        .reconcile(&kit(&store), &scope(), &VpcSync, &fake)
        .await
        .unwrap();
    assert_eq!(report.deleted, 1);
}

#[tokio::test]
async fn storage_failure_is_retryable_and_run_recovers() {
    let fake = vpc_cloud(4).with_page_size(10);
    let store = Arc::new(MemoryStore::new());
    store.resources.fail_next_writes(1);

    let err = Reconciler::default()
        .reconcile(&kit(&store), &scope(), &VpcSync, &fake)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageFailure);
    assert!(err.is_retryable());

    Reconciler::default()
        .reconcile(&kit(&store), &scope(), &VpcSync, &fake)
        .await
        .unwrap();
    assert_eq!(local(&store, &scope(), ResourceKind::Vpc).await.len(), 4);
}

#[tokio::test]
async fn cancelled_run_writes_nothing() {
    let fake = vpc_cloud(3);
    let store = Arc::new(MemoryStore::new());
    let kit = kit(&store);
    kit.cancel_token().cancel();

    let err = Reconciler::default()
        .reconcile(&kit, &scope(), &VpcSync, &fake)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(fake.list_calls(), 0);
    assert_eq!(store.resources.write_count(), 0);
}

#[tokio::test]
async fn writes_and_confirmations_are_chunked() {
    let fake = vpc_cloud(5).with_page_size(10).with_query_limit(3);
    let store = Arc::new(MemoryStore::new());
    let stale: Vec<(String, String)> = (0..5)
        .map(|i| (format!("old-{i}"), String::new()))
        .collect();
    let stale_refs: Vec<(&str, &str)> = stale
        .iter()
        .map(|(a, b)| (a.as_str(), b.as_str()))
        .collect();
    seed(&store, &scope(), ResourceKind::Vpc, &stale_refs).await;
    let seeded_writes = store.resources.write_count();

    let reconciler = Reconciler::new(ReconcileConfig {
        batch_size: 2,
        page_size: 2,
    });
    let report = reconciler
        .reconcile(&kit(&store), &scope(), &VpcSync, &fake)
        .await
        .unwrap();

    assert_eq!(report.created, 5);
    assert_eq!(report.deleted, 5);
    // Three create batches and three delete batches of at most two rows.
    assert_eq!(store.resources.write_count() - seeded_writes, 6);
    // Five candidates confirmed in chunks of three.
    assert_eq!(fake.list_by_ids_calls(), 2);
}

#[tokio::test]
async fn steps_are_callable_one_by_one() {
    let fake = vpc_cloud(3);
    fake.hide_from_listing("vpc-2");
    let store = Arc::new(MemoryStore::new());
    seed(&store, &scope(), ResourceKind::Vpc, &[("vpc-2", "net-2"), ("vpc-x", "")]).await;
    let kit = kit(&store);
    let reconciler = Reconciler::default();

    let forward = reconciler
        .forward_pass(&kit, &scope(), &VpcSync, &fake)
        .await
        .unwrap();
    assert_eq!(forward.cloud_ids.len(), 2);

    let local_ids = reconciler.collect_local(&kit, &scope(), &VpcSync).await.unwrap();
    assert_eq!(local_ids.len(), 4);

    let candidates = Reconciler::deletion_candidates(&local_ids, &forward.cloud_ids);
    assert_eq!(candidates, vec!["vpc-2", "vpc-x"]);

    let confirmed = reconciler
        .confirm(&kit, &scope(), &fake, &candidates)
        .await
        .unwrap();
    assert_eq!(confirmed, vec!["vpc-x"]);

    let deleted = reconciler
        .delete(&kit, &scope(), &VpcSync, &confirmed)
        .await
        .unwrap();
    assert_eq!(deleted, 1);
}

#[tokio::test]
async fn zonal_run_leaves_other_zones_alone() {
    let zone_a = scope().with_zone("ap-guangzhou-3");
    let zone_b = scope().with_zone("ap-guangzhou-4");
    let fake = FakeCloud::new(Vendor::TCloud, ResourceKind::Disk);
    fake.insert(&zone_a, CloudResource::new("disk-a", "a"));
    let store = Arc::new(MemoryStore::new());
    seed(&store, &zone_b, ResourceKind::Disk, &[("disk-b", "b")]).await;

    Reconciler::default()
        .reconcile(&kit(&store), &zone_a, &DiskSync, &fake)
        .await
        .unwrap();

    assert!(local(&store, &zone_a, ResourceKind::Disk).await.contains_key("disk-a"));
    assert!(local(&store, &zone_b, ResourceKind::Disk).await.contains_key("disk-b"));
}

#[tokio::test]
async fn zonal_kind_without_zone_is_rejected() {
    let fake = FakeCloud::new(Vendor::TCloud, ResourceKind::Disk);
    let store = Arc::new(MemoryStore::new());

    let err = Reconciler::default()
        .reconcile(&kit(&store), &scope(), &DiskSync, &fake)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert_eq!(fake.list_calls(), 0);
}

#[tokio::test]
async fn mismatched_adapter_is_rejected() {
    let fake = FakeCloud::new(Vendor::Aws, ResourceKind::Vpc);
    let store = Arc::new(MemoryStore::new());

    let err = Reconciler::default()
        .reconcile(&kit(&store), &scope(), &VpcSync, &fake)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}

#[tokio::test]
async fn sync_ids_upserts_found_and_drops_missing() {
    let fake = vpc_cloud(2);
    let store = Arc::new(MemoryStore::new());
    seed(&store, &scope(), ResourceKind::Vpc, &[("vpc-gone", ""), ("vpc-untouched", "")]).await;

    let report = Reconciler::default()
        .sync_ids(
            &kit(&store),
            &scope(),
            &VpcSync,
            &fake,
            &["vpc-0".into(), "vpc-gone".into(), "vpc-0".into()],
        )
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.deleted, 1);
    let records = local(&store, &scope(), ResourceKind::Vpc).await;
    assert!(records.contains_key("vpc-0"));
    assert!(!records.contains_key("vpc-1"));
    assert!(records.contains_key("vpc-untouched"));
}
