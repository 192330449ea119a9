//! The reconciliation pipeline.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use hcm_cloud::{CloudError, ResourceAdapter};
use hcm_core::{
    CloudResource, HcmError, ListOption, Page, ResourceRecord, Result, Rule, Scope,
    DEFAULT_MAX_PAGE_LIMIT,
};
use hcm_task::ExecuteKit;

use crate::config::ReconcileConfig;
use crate::jobs::SyncJob;

/// Counters of one reconciliation or targeted sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Distinct cloud ids the vendor reported.
    pub listed: usize,
    /// Local records created.
    pub created: usize,
    /// Local records patched.
    pub updated: usize,
    /// Local records the listing did not report.
    pub candidates: usize,
    /// Candidates the vendor still resolved by id, and so kept.
    pub kept: usize,
    /// Local records deleted.
    pub deleted: u64,
}

impl ReconcileReport {
    /// Whether the run wrote anything.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// Result of the forward pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardOutcome {
    /// Every cloud id the listing reported.
    pub cloud_ids: BTreeSet<String>,
    /// Vendor pages fetched.
    pub pages: usize,
    /// Local records created.
    pub created: usize,
    /// Local records patched.
    pub updated: usize,
}

/// Drives one resource kind in one scope to convergence with the vendor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

fn upstream(scope: &Scope) -> impl Fn(CloudError) -> HcmError + '_ {
    move |err| err.into_hcm(scope.vendor.as_str())
}

fn page_limit(len: usize) -> u32 {
    u32::try_from(len).map_or(DEFAULT_MAX_PAGE_LIMIT, |n| n.clamp(1, DEFAULT_MAX_PAGE_LIMIT))
}

impl Reconciler {
    /// Create a reconciler.
    #[must_use]
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> ReconcileConfig {
        self.config
    }

    fn check(&self, scope: &Scope, job: &dyn SyncJob, adapter: &dyn ResourceAdapter) -> Result<()> {
        self.config.validate()?;
        job.validate_scope(scope)?;
        if adapter.kind() != job.kind() || adapter.vendor() != scope.vendor {
            return Err(HcmError::invalid_parameter(format!(
                "adapter {}/{} cannot reconcile {} in {scope}",
                adapter.vendor(),
                adapter.kind(),
                job.kind()
            )));
        }
        Ok(())
    }

    /// Run the full pipeline: forward pass, reverse pass, confirmation pass
    /// and batched delete.
    ///
    /// A vendor error at any point aborts the run before anything is
    /// deleted. A retry re-derives the deletion set from scratch.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for an incomplete scope or mismatched
    /// adapter, `UpstreamUnavailable` or `StorageFailure` from the
    /// collaborators, and `Cancelled` at a checkpoint.
    pub async fn reconcile(
        &self,
        kit: &ExecuteKit,
        scope: &Scope,
        job: &dyn SyncJob,
        adapter: &dyn ResourceAdapter,
    ) -> Result<ReconcileReport> {
        self.check(scope, job, adapter)?;
        tracing::info!(rid = %kit.rid(), scope = %scope, kind = %job.kind(), "Reconcile started");

        let forward = self.forward_pass(kit, scope, job, adapter).await?;
        let local = self.collect_local(kit, scope, job).await?;
        let candidates = Self::deletion_candidates(&local, &forward.cloud_ids);
        let confirmed = self.confirm(kit, scope, adapter, &candidates).await?;
        let deleted = self.delete(kit, scope, job, &confirmed).await?;

        let report = ReconcileReport {
            listed: forward.cloud_ids.len(),
            created: forward.created,
            updated: forward.updated,
            candidates: candidates.len(),
            kept: candidates.len() - confirmed.len(),
            deleted,
        };
        tracing::info!(
            rid = %kit.rid(),
            scope = %scope,
            kind = %job.kind(),
            listed = report.listed,
            created = report.created,
            updated = report.updated,
            kept = report.kept,
            deleted = report.deleted,
            "Reconcile finished"
        );
        Ok(report)
    }

    /// Page the vendor listing until it is exhausted, upserting each page.
    ///
    /// # Errors
    ///
    /// Returns the first vendor or storage error, or `Cancelled` before a
    /// page or write batch.
    pub async fn forward_pass(
        &self,
        kit: &ExecuteKit,
        scope: &Scope,
        job: &dyn SyncJob,
        adapter: &dyn ResourceAdapter,
    ) -> Result<ForwardOutcome> {
        let mut outcome = ForwardOutcome::default();
        let mut cursor: Option<String> = None;

        loop {
            kit.ensure_active()?;
            let page = adapter
                .list(scope, cursor.as_deref())
                .await
                .map_err(upstream(scope))?;
            outcome.pages += 1;

            if page.details.is_empty() {
                break;
            }

            let (created, updated) = self.upsert(kit, scope, job, &page.details).await?;
            outcome.created += created;
            outcome.updated += updated;
            outcome
                .cloud_ids
                .extend(page.details.into_iter().map(|r| r.cloud_id));

            tracing::debug!(
                rid = %kit.rid(),
                page = outcome.pages,
                seen = outcome.cloud_ids.len(),
                "Vendor page reconciled"
            );

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(outcome)
    }

    /// Page every local record in `scope` and return their cloud ids.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or `Cancelled` before a page.
    pub async fn collect_local(
        &self,
        kit: &ExecuteKit,
        scope: &Scope,
        job: &dyn SyncJob,
    ) -> Result<BTreeSet<String>> {
        let filter = job.filter(scope);
        let mut local = BTreeSet::new();
        let mut page = Page::first(self.config.page_size);

        loop {
            kit.ensure_active()?;
            let rows = kit
                .store()
                .resources()
                .list(&ListOption::new(filter.clone(), page))
                .await?;
            let fetched = rows.len();
            local.extend(rows.into_iter().map(|r| r.cloud_id));
            if fetched < page.limit as usize {
                break;
            }
            page = page.next();
        }

        Ok(local)
    }

    /// Local ids the listing did not report.
    #[must_use]
    pub fn deletion_candidates(local: &BTreeSet<String>, cloud: &BTreeSet<String>) -> Vec<String> {
        local.difference(cloud).cloned().collect()
    }

    /// Look candidates up by id at the vendor, in chunks of the adapter's
    /// query limit. Returns the candidates the vendor no longer knows.
    ///
    /// # Errors
    ///
    /// Returns the first vendor error, or `Cancelled` before a chunk. No
    /// partial result is returned, so nothing is deleted on failure.
    pub async fn confirm(
        &self,
        kit: &ExecuteKit,
        scope: &Scope,
        adapter: &dyn ResourceAdapter,
        candidates: &[String],
    ) -> Result<Vec<String>> {
        let mut confirmed = Vec::with_capacity(candidates.len());

        for chunk in candidates.chunks(adapter.query_limit().max(1)) {
            kit.ensure_active()?;
            let found: BTreeSet<String> = adapter
                .list_by_ids(scope, chunk)
                .await
                .map_err(upstream(scope))?
                .into_iter()
                .map(|r| r.cloud_id)
                .collect();

            for id in chunk {
                if found.contains(id) {
                    tracing::debug!(
                        rid = %kit.rid(),
                        cloud_id = %id,
                        "Unlisted resource still exists, kept"
                    );
                } else {
                    confirmed.push(id.clone());
                }
            }
        }

        Ok(confirmed)
    }

    /// Delete local records by cloud id, one transaction per chunk.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or `Cancelled` before a chunk. Chunks deleted
    /// before the failure stay deleted.
    pub async fn delete(
        &self,
        kit: &ExecuteKit,
        scope: &Scope,
        job: &dyn SyncJob,
        cloud_ids: &[String],
    ) -> Result<u64> {
        let mut deleted = 0;
        for chunk in cloud_ids.chunks(self.config.batch_size.max(1)) {
            kit.ensure_active()?;
            let filter = job
                .filter(scope)
                .with(Rule::in_("cloud_id", chunk.iter().map(String::as_str)));
            deleted += kit.store().resources().delete_by_filter(&filter).await?;
        }
        if deleted > 0 {
            tracing::info!(
                rid = %kit.rid(),
                scope = %scope,
                kind = %job.kind(),
                deleted,
                "Local records deleted"
            );
        }
        Ok(deleted)
    }

    /// Sync specific cloud ids: upsert what the vendor resolves and delete
    /// local records among `cloud_ids` the vendor no longer reports.
    ///
    /// # Errors
    ///
    /// As [`reconcile`](Self::reconcile).
    pub async fn sync_ids(
        &self,
        kit: &ExecuteKit,
        scope: &Scope,
        job: &dyn SyncJob,
        adapter: &dyn ResourceAdapter,
        cloud_ids: &[String],
    ) -> Result<ReconcileReport> {
        self.check(scope, job, adapter)?;
        let ids: Vec<String> = cloud_ids
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut report = ReconcileReport::default();
        let mut missing = Vec::new();

        for chunk in ids.chunks(adapter.query_limit().max(1)) {
            kit.ensure_active()?;
            let found = adapter
                .list_by_ids(scope, chunk)
                .await
                .map_err(upstream(scope))?;
            let found_ids: BTreeSet<&str> = found.iter().map(|r| r.cloud_id.as_str()).collect();
            missing.extend(
                chunk
                    .iter()
                    .filter(|id| !found_ids.contains(id.as_str()))
                    .cloned(),
            );

            let (created, updated) = self.upsert(kit, scope, job, &found).await?;
            report.listed += found_ids.len();
            report.created += created;
            report.updated += updated;
        }

        report.candidates = missing.len();
        report.deleted = self.delete(kit, scope, job, &missing).await?;

        tracing::debug!(
            rid = %kit.rid(),
            scope = %scope,
            kind = %job.kind(),
            requested = ids.len(),
            listed = report.listed,
            deleted = report.deleted,
            "Targeted sync finished"
        );
        Ok(report)
    }

    /// Local records in `scope` for the given cloud ids, keyed by cloud id.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn find_records(
        &self,
        kit: &ExecuteKit,
        scope: &Scope,
        job: &dyn SyncJob,
        cloud_ids: &[String],
    ) -> Result<BTreeMap<String, ResourceRecord>> {
        let mut found = BTreeMap::new();
        for chunk in cloud_ids.chunks(self.config.batch_size.max(1)) {
            let filter = job
                .filter(scope)
                .with(Rule::in_("cloud_id", chunk.iter().map(String::as_str)));
            let rows = kit
                .store()
                .resources()
                .list(&ListOption::new(filter, Page::first(page_limit(chunk.len()))))
                .await?;
            found.extend(rows.into_iter().map(|r| (r.cloud_id.clone(), r)));
        }
        Ok(found)
    }

    /// Create missing records and patch diverging ones for one vendor page.
    async fn upsert(
        &self,
        kit: &ExecuteKit,
        scope: &Scope,
        job: &dyn SyncJob,
        details: &[CloudResource],
    ) -> Result<(usize, usize)> {
        // Last descriptor wins when a page repeats an id.
        let page: BTreeMap<&str, &CloudResource> =
            details.iter().map(|r| (r.cloud_id.as_str(), r)).collect();
        let ids: Vec<String> = page.keys().map(|id| (*id).to_string()).collect();
        let existing = self.find_records(kit, scope, job, &ids).await?;

        let mut to_create = Vec::new();
        let mut updated = 0;
        for (cloud_id, cloud) in &page {
            match existing.get(*cloud_id) {
                Some(record) => {
                    if let Some(patch) = record.diff(cloud) {
                        kit.ensure_active()?;
                        kit.store()
                            .resources()
                            .update_by_id(&record.id, &patch)
                            .await?;
                        updated += 1;
                    }
                }
                None => to_create.push(job.to_record(scope, cloud)),
            }
        }

        let mut created = 0;
        for chunk in to_create.chunks(self.config.batch_size.max(1)) {
            kit.ensure_active()?;
            kit.store().resources().batch_create(chunk.to_vec()).await?;
            created += chunk.len();
        }

        Ok((created, updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn candidates_are_local_minus_cloud() {
        let local = set(&["a", "b", "c"]);
        let cloud = set(&["b", "d"]);
        assert_eq!(Reconciler::deletion_candidates(&local, &cloud), vec!["a", "c"]);
    }

    #[test]
    fn lookup_page_never_exceeds_storage_bound() {
        assert_eq!(page_limit(0), 1);
        assert_eq!(page_limit(42), 42);
        assert_eq!(page_limit(10_000), DEFAULT_MAX_PAGE_LIMIT);
    }
}
