//! In-memory vendor for tests.
//!
//! [`FakeCloud`] behaves like a paginating, query-limited vendor API and lets
//! tests script the awkward cases: failures on a given page, listings that
//! lag behind the vendor's point lookups, and call counting.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use hcm_core::{CloudResource, ResourceKind, Scope, Vendor};

use crate::adapter::{check_query_limit, CloudPage, ResourceAdapter};
use crate::error::{CloudError, Result};

#[derive(Clone)]
struct Entry {
    account_id: String,
    region: String,
    resource: CloudResource,
}

impl Entry {
    fn in_scope(&self, scope: &Scope) -> bool {
        self.account_id == scope.account_id
            && self.region == scope.region
            && scope
                .zone
                .as_ref()
                .map_or(true, |zone| self.resource.zone.as_ref() == Some(zone))
    }
}

#[derive(Default)]
struct State {
    resources: BTreeMap<String, Entry>,
    hidden_from_listing: BTreeSet<String>,
    attachments: BTreeSet<(String, String)>,
    fail_list_page: Option<usize>,
    fail_list_by_ids: bool,
    next_id: u64,
}

/// A scripted in-memory vendor for one resource kind.
pub struct FakeCloud {
    vendor: Vendor,
    kind: ResourceKind,
    page_size: usize,
    query_limit: usize,
    state: Mutex<State>,
    list_calls: AtomicUsize,
    list_by_ids_calls: AtomicUsize,
}

impl FakeCloud {
    /// A vendor with page size 2 and query limit 3, small enough to exercise
    /// pagination and chunking with a handful of resources.
    #[must_use]
    pub fn new(vendor: Vendor, kind: ResourceKind) -> Self {
        Self {
            vendor,
            kind,
            page_size: 2,
            query_limit: 3,
            state: Mutex::new(State::default()),
            list_calls: AtomicUsize::new(0),
            list_by_ids_calls: AtomicUsize::new(0),
        }
    }

    /// Override the listing page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Override the `list_by_ids` query limit.
    #[must_use]
    pub fn with_query_limit(mut self, query_limit: usize) -> Self {
        self.query_limit = query_limit.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unavailable(&self, message: &str) -> CloudError {
        CloudError::Api {
            code: "unavailable".into(),
            message: format!("{}/{}: {message}", self.vendor, self.kind),
            status: 503,
        }
    }

    /// Add or replace a resource in `scope`.
    pub fn insert(&self, scope: &Scope, resource: CloudResource) {
        let mut resource = resource;
        if resource.zone.is_none() {
            resource.zone.clone_from(&scope.zone);
        }
        self.state().resources.insert(
            resource.cloud_id.clone(),
            Entry {
                account_id: scope.account_id.clone(),
                region: scope.region.clone(),
                resource,
            },
        );
    }

    /// Remove a resource out of band.
    pub fn remove(&self, cloud_id: &str) {
        let mut state = self.state();
        state.resources.remove(cloud_id);
        state.hidden_from_listing.remove(cloud_id);
    }

    /// Rename a resource out of band.
    pub fn rename(&self, cloud_id: &str, name: &str) {
        if let Some(entry) = self.state().resources.get_mut(cloud_id) {
            entry.resource.name = name.to_string();
        }
    }

    /// Keep the resource reachable by id but omit it from `list`, like a
    /// listing index that lags behind the vendor.
    pub fn hide_from_listing(&self, cloud_id: &str) {
        self.state().hidden_from_listing.insert(cloud_id.to_string());
    }

    /// Fail the `n`th `list` call from now (0-based).
    pub fn fail_list_call(&self, n: usize) {
        self.state().fail_list_page = Some(self.list_calls() + n);
    }

    /// Fail every `list_by_ids` call until cleared.
    pub fn fail_list_by_ids(&self, fail: bool) {
        self.state().fail_list_by_ids = fail;
    }

    /// Cloud ids currently present, sorted.
    #[must_use]
    pub fn cloud_ids(&self) -> Vec<String> {
        self.state().resources.keys().cloned().collect()
    }

    /// `(resource, target)` pairs currently attached.
    #[must_use]
    pub fn attachments(&self) -> Vec<(String, String)> {
        self.state().attachments.iter().cloned().collect()
    }

    /// Number of `list` calls so far.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `list_by_ids` calls so far.
    #[must_use]
    pub fn list_by_ids_calls(&self) -> usize {
        self.list_by_ids_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceAdapter for FakeCloud {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn query_limit(&self) -> usize {
        self.query_limit
    }

    async fn list(&self, scope: &Scope, cursor: Option<&str>) -> Result<CloudPage> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if state.fail_list_page == Some(call) {
            return Err(self.unavailable("injected list failure"));
        }

        let offset = match cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| CloudError::InvalidRequest(format!("bad cursor: {c}")))?,
            None => 0,
        };

        let visible: Vec<&Entry> = state
            .resources
            .iter()
            .filter(|(id, e)| e.in_scope(scope) && !state.hidden_from_listing.contains(*id))
            .map(|(_, e)| e)
            .collect();

        let details: Vec<CloudResource> = visible
            .iter()
            .skip(offset)
            .take(self.page_size)
            .map(|e| e.resource.clone())
            .collect();
        let end = offset + details.len();
        let next_cursor = (end < visible.len()).then(|| end.to_string());

        Ok(CloudPage {
            details,
            next_cursor,
        })
    }

    async fn list_by_ids(&self, scope: &Scope, ids: &[String]) -> Result<Vec<CloudResource>> {
        check_query_limit(self, ids)?;
        self.list_by_ids_calls.fetch_add(1, Ordering::SeqCst);

        let state = self.state();
        if state.fail_list_by_ids {
            return Err(self.unavailable("injected list_by_ids failure"));
        }

        Ok(ids
            .iter()
            .filter_map(|id| state.resources.get(id))
            .filter(|e| e.in_scope(scope))
            .map(|e| e.resource.clone())
            .collect())
    }

    async fn create(&self, scope: &Scope, spec: &Value) -> Result<Vec<CloudResource>> {
        let name = spec
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let count = spec.get("count").and_then(Value::as_u64).unwrap_or(1);

        let mut created = Vec::new();
        for _ in 0..count {
            let id = {
                let mut state = self.state();
                state.next_id += 1;
                format!("{}-new-{}", self.kind, state.next_id)
            };
            let mut resource = CloudResource::new(id, name.clone());
            resource.attributes = spec.get("attributes").cloned().unwrap_or(Value::Null);
            self.insert(scope, resource.clone());
            created.push(resource);
        }
        Ok(created)
    }

    async fn delete(&self, _scope: &Scope, cloud_id: &str) -> Result<()> {
        self.remove(cloud_id);
        Ok(())
    }

    async fn attach(&self, _scope: &Scope, cloud_id: &str, target_cloud_id: &str) -> Result<()> {
        let mut state = self.state();
        let entry = state
            .resources
            .get_mut(cloud_id)
            .ok_or_else(|| CloudError::InvalidRequest(format!("unknown resource {cloud_id}")))?;
        entry.resource.attributes = serde_json::json!({ "instance_id": target_cloud_id });
        state
            .attachments
            .insert((cloud_id.to_string(), target_cloud_id.to_string()));
        Ok(())
    }

    async fn detach(&self, _scope: &Scope, cloud_id: &str, target_cloud_id: &str) -> Result<()> {
        let mut state = self.state();
        if let Some(entry) = state.resources.get_mut(cloud_id) {
            entry.resource.attributes = Value::Null;
        }
        state
            .attachments
            .remove(&(cloud_id.to_string(), target_cloud_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new(Vendor::Aws, "acc", "us-east-1")
    }

    #[tokio::test]
    async fn pages_until_cursor_exhausted() {
        let fake = FakeCloud::new(Vendor::Aws, ResourceKind::Vpc);
        for i in 0..5 {
            fake.insert(&scope(), CloudResource::new(format!("vpc-{i}"), ""));
        }

        let mut cursor = None;
        let mut seen = Vec::new();
        loop {
            let page = fake.list(&scope(), cursor.as_deref()).await.unwrap();
            seen.extend(page.details.into_iter().map(|r| r.cloud_id));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(fake.list_calls(), 3);
    }

    #[tokio::test]
    async fn hidden_resources_resolve_by_id() {
        let fake = FakeCloud::new(Vendor::Aws, ResourceKind::Vpc);
        fake.insert(&scope(), CloudResource::new("vpc-1", ""));
        fake.hide_from_listing("vpc-1");

        assert!(fake.list(&scope(), None).await.unwrap().details.is_empty());
        let found = fake
            .list_by_ids(&scope(), &["vpc-1".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn query_limit_is_enforced() {
        let fake = FakeCloud::new(Vendor::Aws, ResourceKind::Vpc).with_query_limit(1);
        let ids = vec!["a".to_string(), "b".to_string()];
        assert!(matches!(
            fake.list_by_ids(&scope(), &ids).await,
            Err(CloudError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn scripted_list_failure() {
        let fake = FakeCloud::new(Vendor::Aws, ResourceKind::Vpc);
        fake.fail_list_call(1);
        assert!(fake.list(&scope(), None).await.is_ok());
        assert!(fake.list(&scope(), None).await.is_err());
        assert!(fake.list(&scope(), None).await.is_ok());
    }

    #[tokio::test]
    async fn zone_scoped_listing() {
        let fake = FakeCloud::new(Vendor::Gcp, ResourceKind::Disk);
        let zone_a = Scope::new(Vendor::Gcp, "acc", "r").with_zone("a");
        let zone_b = Scope::new(Vendor::Gcp, "acc", "r").with_zone("b");
        fake.insert(&zone_a, CloudResource::new("d-1", ""));
        fake.insert(&zone_b, CloudResource::new("d-2", ""));

        let page = fake.list(&zone_a, None).await.unwrap();
        assert_eq!(page.details.len(), 1);
        assert_eq!(page.details[0].zone.as_deref(), Some("a"));
    }
}
