//! Shared fixtures for sync tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use hcm_core::{CloudResource, ListOption, Page, ResourceKind, ResourceRecord, Scope};
use hcm_store::{MemoryStore, Store, Table};
use hcm_task::ExecuteKit;

pub fn kit(store: &Arc<MemoryStore>) -> ExecuteKit {
    ExecuteKit::new("test-rid", store.clone())
}

/// Seed local records directly, bypassing reconciliation.
pub async fn seed(
    store: &MemoryStore,
    scope: &Scope,
    kind: ResourceKind,
    resources: &[(&str, &str)],
) {
    let records = resources
        .iter()
        .map(|(id, name)| ResourceRecord::from_cloud(scope, kind, &CloudResource::new(*id, *name)))
        .collect();
    store.resources.batch_create(records).await.unwrap();
}

/// Local records of `kind` in `scope`, keyed by cloud id.
pub async fn local(
    store: &MemoryStore,
    scope: &Scope,
    kind: ResourceKind,
) -> BTreeMap<String, ResourceRecord> {
    store
        .resources()
        .list(&ListOption::new(scope.filter(kind), Page::default()))
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.cloud_id.clone(), r))
        .collect()
}
