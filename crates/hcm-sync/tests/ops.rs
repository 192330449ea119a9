//! Mutations, their follow-up syncs, and the task actions.

mod common;

use std::sync::Arc;

use serde_json::json;

use hcm_cloud::testing::FakeCloud;
use hcm_cloud::AdapterRegistry;
use hcm_core::{CloudResource, ErrorKind, ResourceKind, Scope, Vendor};
use hcm_store::MemoryStore;
use hcm_sync::{
    CvmSync, DiskSync, EipSync, MutateResourceAction, Reconciler, ResourceOps, SyncResourceAction,
};
use hcm_task::{ActionRegistry, Executor, RetryPolicy, TaskState};

use common::{kit, local};

fn region() -> Scope {
    Scope::new(Vendor::Aws, "acc-1", "us-east-1")
}

fn zone() -> Scope {
    region().with_zone("us-east-1a")
}

struct World {
    store: Arc<MemoryStore>,
    disks: Arc<FakeCloud>,
    eips: Arc<FakeCloud>,
    cvms: Arc<FakeCloud>,
    registry: Arc<AdapterRegistry>,
}

impl World {
    fn ops(&self) -> ResourceOps {
        ResourceOps::new(self.registry.clone(), Reconciler::default())
    }
}

async fn world() -> World {
    let disks = Arc::new(FakeCloud::new(Vendor::Aws, ResourceKind::Disk));
    disks.insert(&zone(), CloudResource::new("vol-1", "data"));
    let eips = Arc::new(FakeCloud::new(Vendor::Aws, ResourceKind::Eip));
    eips.insert(&region(), CloudResource::new("eipalloc-1", ""));
    let cvms = Arc::new(FakeCloud::new(Vendor::Aws, ResourceKind::Cvm));
    cvms.insert(&zone(), CloudResource::new("i-1", "web"));
    let vpcs = Arc::new(FakeCloud::new(Vendor::Aws, ResourceKind::Vpc));
    vpcs.insert(&region(), CloudResource::new("vpc-1", "main"));
    vpcs.insert(&region(), CloudResource::new("vpc-2", "edge"));

    let registry = Arc::new(
        AdapterRegistry::new()
            .with(disks.clone())
            .with(eips.clone())
            .with(cvms.clone())
            .with(vpcs),
    );

    let store = Arc::new(MemoryStore::new());
    let reconciler = Reconciler::default();
    let kit = kit(&store);
    reconciler.reconcile(&kit, &zone(), &DiskSync, disks.as_ref()).await.unwrap();
    reconciler.reconcile(&kit, &region(), &EipSync, eips.as_ref()).await.unwrap();
    reconciler.reconcile(&kit, &region(), &CvmSync, cvms.as_ref()).await.unwrap();

    World {
        store,
        disks,
        eips,
        cvms,
        registry,
    }
}

#[tokio::test]
async fn attach_and_detach_disk() {
    let w = world().await;
    let ops = w.ops();
    let kit = kit(&w.store);

    assert_eq!(ops.attach_disk(&kit, &zone(), "vol-1", "i-1").await.unwrap(), 1);
    assert_eq!(w.disks.attachments(), vec![("vol-1".to_string(), "i-1".to_string())]);
    assert_eq!(w.store.relations.len().await, 1);
    let disk = &local(&w.store, &zone(), ResourceKind::Disk).await["vol-1"];
    assert_eq!(disk.attributes["instance_id"], "i-1");

    // Repeating converges without a second relation.
    assert_eq!(ops.attach_disk(&kit, &zone(), "vol-1", "i-1").await.unwrap(), 0);
    assert_eq!(w.store.relations.len().await, 1);

    assert_eq!(ops.detach_disk(&kit, &zone(), "vol-1", "i-1").await.unwrap(), 1);
    assert!(w.disks.attachments().is_empty());
    assert!(w.store.relations.is_empty().await);
    let disk = &local(&w.store, &zone(), ResourceKind::Disk).await["vol-1"];
    assert!(disk.attributes.is_null());
}

#[tokio::test]
async fn associate_eip_ignores_zone() {
    let w = world().await;
    let ops = w.ops();
    let kit = kit(&w.store);

    ops.associate_eip(&kit, &zone(), "eipalloc-1", "i-1").await.unwrap();
    assert_eq!(w.eips.attachments().len(), 1);
    let eip = &local(&w.store, &region(), ResourceKind::Eip).await["eipalloc-1"];
    assert_eq!(eip.attributes["instance_id"], "i-1");

    ops.disassociate_eip(&kit, &region(), "eipalloc-1", "i-1").await.unwrap();
    assert!(w.store.relations.is_empty().await);
}

#[tokio::test]
async fn unknown_local_record_never_reaches_vendor() {
    let w = world().await;
    let err = w
        .ops()
        .attach_disk(&kit(&w.store), &zone(), "vol-404", "i-1")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert!(w.disks.attachments().is_empty());
}

#[tokio::test]
async fn delete_removes_record_and_relations() {
    let w = world().await;
    let ops = w.ops();
    let kit = kit(&w.store);
    ops.attach_disk(&kit, &zone(), "vol-1", "i-1").await.unwrap();

    let deleted = ops.delete(&kit, &region(), ResourceKind::Cvm, "i-1").await.unwrap();

    assert_eq!(deleted, 1);
    assert!(w.cvms.cloud_ids().is_empty());
    assert!(!local(&w.store, &region(), ResourceKind::Cvm).await.contains_key("i-1"));
    assert!(w.store.relations.is_empty().await);
}

#[tokio::test]
async fn create_returns_local_ids() {
    let w = world().await;
    let ids = w
        .ops()
        .create(&kit(&w.store), &region(), ResourceKind::Eip, &json!({"name": "pub", "count": 2}))
        .await
        .unwrap();

    assert_eq!(ids.len(), 2);
    let records = local(&w.store, &region(), ResourceKind::Eip).await;
    assert_eq!(records.len(), 3);
    for id in &ids {
        let record = records.values().find(|r| r.id == *id).unwrap();
        assert_eq!(record.name, "pub");
    }
}

#[tokio::test]
async fn actions_run_through_the_executor() {
    let w = world().await;
    let registry = ActionRegistry::new()
        .with(SyncResourceAction::new(w.registry.clone(), Reconciler::default()))
        .with(MutateResourceAction::new(w.ops()));
    let executor = Executor::new(Arc::new(registry), w.store.clone(), RetryPolicy::default());

    let record = executor
        .submit(
            "sync_resource",
            json!({"vendor": "aws", "account_id": "acc-1", "region": "us-east-1", "kind": "vpc"}),
        )
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(record.state, TaskState::Succeeded);
    assert_eq!(record.result.unwrap()["created"], 2);
    assert_eq!(local(&w.store, &region(), ResourceKind::Vpc).await.len(), 2);

    let record = executor
        .submit(
            "mutate_resource",
            json!({
                "scope": {"vendor": "aws", "account_id": "acc-1", "region": "us-east-1", "zone": "us-east-1a"},
                "mutation": {"op": "attach_disk", "disk_id": "vol-1", "cvm_id": "i-1"}
            }),
        )
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(record.state, TaskState::Succeeded);
    assert_eq!(record.result.unwrap()["affected"], 1);

    let rejected = executor
        .submit(
            "sync_resource",
            json!({"vendor": "aws", "account_id": "acc-1", "region": "us-east-1", "kind": "disk"}),
        )
        .await
        .unwrap_err();
    assert_eq!(rejected.kind(), ErrorKind::InvalidParameter);
}
