//! Vendor mutations followed by the local writes they imply.

use std::sync::Arc;

use serde_json::Value;

use hcm_cloud::AdapterRegistry;
use hcm_core::{
    HcmError, LocalId, RelationKind, ResourceKind, ResourceRecord, ResourceRelation, Result, Rule,
    Scope,
};
use hcm_task::ExecuteKit;

use crate::jobs::{job_for, SyncJob};
use crate::reconciler::Reconciler;
use crate::relations;

/// Resource mutations with their follow-up syncs.
///
/// Every mutation calls the vendor first, then brings the local records
/// (and relations) in line. A failure after the vendor call leaves the local
/// side for the next reconciliation to repair.
#[derive(Clone)]
pub struct ResourceOps {
    adapters: Arc<AdapterRegistry>,
    reconciler: Reconciler,
}

/// Instances are region scoped even when the mutation names a zone.
fn region_scope(scope: &Scope) -> Scope {
    Scope {
        zone: None,
        ..scope.clone()
    }
}

const fn left_kind(relation: RelationKind) -> ResourceKind {
    match relation {
        RelationKind::DiskCvm => ResourceKind::Disk,
        RelationKind::EipCvm => ResourceKind::Eip,
    }
}

/// Scope of the dependent side: zonal kinds keep the zone.
fn left_scope(relation: RelationKind, scope: &Scope) -> Scope {
    if left_kind(relation).is_zonal() {
        scope.clone()
    } else {
        region_scope(scope)
    }
}

impl ResourceOps {
    /// Create the ops over an adapter registry.
    #[must_use]
    pub fn new(adapters: Arc<AdapterRegistry>, reconciler: Reconciler) -> Self {
        Self {
            adapters,
            reconciler,
        }
    }

    /// Create resources at the vendor, sync them in, and return their local
    /// ids in the order the vendor reported them.
    ///
    /// Vendor creation is not idempotent, so this is not exposed as a
    /// retried task.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for an incomplete scope, or the vendor or
    /// storage error.
    pub async fn create(
        &self,
        kit: &ExecuteKit,
        scope: &Scope,
        kind: ResourceKind,
        spec: &Value,
    ) -> Result<Vec<LocalId>> {
        let job = job_for(kind);
        job.validate_scope(scope)?;
        let adapter = self.adapters.get(scope.vendor, kind)?;

        kit.ensure_active()?;
        let created = adapter
            .create(scope, spec)
            .await
            .map_err(|e| e.into_hcm(scope.vendor.as_str()))?;
        let cloud_ids: Vec<String> = created.into_iter().map(|r| r.cloud_id).collect();
        tracing::info!(
            rid = %kit.rid(),
            scope = %scope,
            kind = %kind,
            count = cloud_ids.len(),
            "Resources created at vendor"
        );
        if cloud_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.reconciler
            .sync_ids(kit, scope, job, adapter.as_ref(), &cloud_ids)
            .await?;
        let records = self.reconciler.find_records(kit, scope, job, &cloud_ids).await?;
        Ok(cloud_ids
            .iter()
            .filter_map(|id| records.get(id).map(|r| r.id))
            .collect())
    }

    /// Delete a resource at the vendor, then its local record and every
    /// relation that references it. Returns the local records deleted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for an incomplete scope, or the vendor or
    /// storage error.
    pub async fn delete(
        &self,
        kit: &ExecuteKit,
        scope: &Scope,
        kind: ResourceKind,
        cloud_id: &str,
    ) -> Result<u64> {
        let job = job_for(kind);
        job.validate_scope(scope)?;
        let adapter = self.adapters.get(scope.vendor, kind)?;

        kit.ensure_active()?;
        adapter
            .delete(scope, cloud_id)
            .await
            .map_err(|e| e.into_hcm(scope.vendor.as_str()))?;

        let ids = [cloud_id.to_string()];
        let records = self.reconciler.find_records(kit, scope, job, &ids).await?;
        if let Some(record) = records.get(cloud_id) {
            relations::delete_relations(kit.store(), &relations::involving(&record.id)).await?;
        }
        let filter = job.filter(scope).with(Rule::eq("cloud_id", cloud_id));
        let deleted = kit.store().resources().delete_by_filter(&filter).await?;

        tracing::info!(
            rid = %kit.rid(),
            scope = %scope,
            kind = %kind,
            cloud_id = %cloud_id,
            "Resource deleted"
        );
        Ok(deleted)
    }

    /// Attach a disk to an instance. `scope` names the disk's zone.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if either record is unknown locally, or
    /// the vendor or storage error.
    pub async fn attach_disk(
        &self,
        kit: &ExecuteKit,
        scope: &Scope,
        disk_id: &str,
        cvm_id: &str,
    ) -> Result<u64> {
        self.link(kit, RelationKind::DiskCvm, scope, disk_id, cvm_id).await
    }

    /// Detach a disk from an instance. `scope` names the disk's zone.
    ///
    /// # Errors
    ///
    /// As [`attach_disk`](Self::attach_disk).
    pub async fn detach_disk(
        &self,
        kit: &ExecuteKit,
        scope: &Scope,
        disk_id: &str,
        cvm_id: &str,
    ) -> Result<u64> {
        self.unlink(kit, RelationKind::DiskCvm, scope, disk_id, cvm_id).await
    }

    /// Associate an elastic IP with an instance. A zone on `scope` is
    /// ignored.
    ///
    /// # Errors
    ///
    /// As [`attach_disk`](Self::attach_disk).
    pub async fn associate_eip(
        &self,
        kit: &ExecuteKit,
        scope: &Scope,
        eip_id: &str,
        cvm_id: &str,
    ) -> Result<u64> {
        self.link(kit, RelationKind::EipCvm, scope, eip_id, cvm_id).await
    }

    /// Disassociate an elastic IP from an instance.
    ///
    /// # Errors
    ///
    /// As [`attach_disk`](Self::attach_disk).
    pub async fn disassociate_eip(
        &self,
        kit: &ExecuteKit,
        scope: &Scope,
        eip_id: &str,
        cvm_id: &str,
    ) -> Result<u64> {
        self.unlink(kit, RelationKind::EipCvm, scope, eip_id, cvm_id).await
    }

    async fn require(
        &self,
        kit: &ExecuteKit,
        scope: &Scope,
        job: &dyn SyncJob,
        cloud_id: &str,
    ) -> Result<ResourceRecord> {
        let ids = [cloud_id.to_string()];
        self.reconciler
            .find_records(kit, scope, job, &ids)
            .await?
            .remove(cloud_id)
            .ok_or_else(|| {
                HcmError::invalid_parameter(format!(
                    "{} {cloud_id} not found in {scope}",
                    job.kind()
                ))
            })
    }

    async fn link(
        &self,
        kit: &ExecuteKit,
        relation: RelationKind,
        scope: &Scope,
        left_id: &str,
        cvm_id: &str,
    ) -> Result<u64> {
        let (left, right) = self.endpoints(kit, relation, scope, left_id, cvm_id).await?;
        let adapter = self.adapters.get(scope.vendor, left.kind)?;

        kit.ensure_active()?;
        adapter
            .attach(&left_scope(relation, scope), left_id, cvm_id)
            .await
            .map_err(|e| e.into_hcm(scope.vendor.as_str()))?;

        let created = relations::ensure_relation(kit.store(), relation, left.id, right.id).await?;
        tracing::info!(
            rid = %kit.rid(),
            relation = relation.as_str(),
            left = %left_id,
            right = %cvm_id,
            "Resources linked"
        );

        self.follow_up(kit, relation, scope, left_id, cvm_id).await?;
        Ok(u64::from(created))
    }

    async fn unlink(
        &self,
        kit: &ExecuteKit,
        relation: RelationKind,
        scope: &Scope,
        left_id: &str,
        cvm_id: &str,
    ) -> Result<u64> {
        let (left, right) = self.endpoints(kit, relation, scope, left_id, cvm_id).await?;
        let adapter = self.adapters.get(scope.vendor, left.kind)?;

        kit.ensure_active()?;
        adapter
            .detach(&left_scope(relation, scope), left_id, cvm_id)
            .await
            .map_err(|e| e.into_hcm(scope.vendor.as_str()))?;

        let pair = ResourceRelation::pair_filter(relation, &left.id, &right.id);
        let removed = relations::delete_relations(kit.store(), &pair).await?;
        tracing::info!(
            rid = %kit.rid(),
            relation = relation.as_str(),
            left = %left_id,
            right = %cvm_id,
            "Resources unlinked"
        );

        self.follow_up(kit, relation, scope, left_id, cvm_id).await?;
        Ok(removed)
    }

    async fn endpoints(
        &self,
        kit: &ExecuteKit,
        relation: RelationKind,
        scope: &Scope,
        left_id: &str,
        cvm_id: &str,
    ) -> Result<(ResourceRecord, ResourceRecord)> {
        let left_job = job_for(left_kind(relation));
        let dependent = left_scope(relation, scope);
        left_job.validate_scope(&dependent)?;
        let left = self.require(kit, &dependent, left_job, left_id).await?;
        let right = self
            .require(kit, &region_scope(scope), job_for(ResourceKind::Cvm), cvm_id)
            .await?;
        Ok((left, right))
    }

    /// Re-sync both sides so their attributes reflect the new attachment.
    async fn follow_up(
        &self,
        kit: &ExecuteKit,
        relation: RelationKind,
        scope: &Scope,
        left_id: &str,
        cvm_id: &str,
    ) -> Result<()> {
        let kind = left_kind(relation);
        let left_adapter = self.adapters.get(scope.vendor, kind)?;
        self.reconciler
            .sync_ids(
                kit,
                &left_scope(relation, scope),
                job_for(kind),
                left_adapter.as_ref(),
                &[left_id.to_string()],
            )
            .await?;

        let cvm_adapter = self.adapters.get(scope.vendor, ResourceKind::Cvm)?;
        self.reconciler
            .sync_ids(
                kit,
                &region_scope(scope),
                job_for(ResourceKind::Cvm),
                cvm_adapter.as_ref(),
                &[cvm_id.to_string()],
            )
            .await?;
        Ok(())
    }
}
