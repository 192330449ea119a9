//! Task actions for resource sync and mutation.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use hcm_cloud::AdapterRegistry;
use hcm_core::{HcmError, ResourceKind, Result, Scope};
use hcm_task::{Action, ExecuteKit, Validate};

use crate::jobs::job_for;
use crate::ops::ResourceOps;
use crate::reconciler::{ReconcileReport, Reconciler};

fn require_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(HcmError::invalid_parameter(format!("{field} is required")));
    }
    Ok(())
}

/// Parameters of [`SyncResourceAction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SyncResourceParams {
    /// Vendor, account, region and optional zone.
    #[serde(flatten)]
    pub scope: Scope,
    /// Resource kind to reconcile.
    pub kind: ResourceKind,
    /// When set, sync only these cloud ids instead of the whole scope.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cloud_ids: Vec<String>,
}

impl Validate for SyncResourceParams {
    fn validate(&self) -> Result<()> {
        self.scope.validate_for(self.kind)?;
        for id in &self.cloud_ids {
            require_id("cloud_ids[]", id)?;
        }
        Ok(())
    }
}

/// Reconciles one resource kind in one scope, or a set of cloud ids.
pub struct SyncResourceAction {
    adapters: Arc<AdapterRegistry>,
    reconciler: Reconciler,
}

impl SyncResourceAction {
    /// Create the action.
    #[must_use]
    pub fn new(adapters: Arc<AdapterRegistry>, reconciler: Reconciler) -> Self {
        Self {
            adapters,
            reconciler,
        }
    }
}

#[async_trait]
impl Action for SyncResourceAction {
    const NAME: &'static str = "sync_resource";
    type Params = SyncResourceParams;
    type Output = ReconcileReport;

    async fn run(&self, kit: &ExecuteKit, params: SyncResourceParams) -> Result<ReconcileReport> {
        let job = job_for(params.kind);
        let adapter = self.adapters.get(params.scope.vendor, params.kind)?;

        if params.cloud_ids.is_empty() {
            self.reconciler
                .reconcile(kit, &params.scope, job, adapter.as_ref())
                .await
        } else {
            self.reconciler
                .sync_ids(kit, &params.scope, job, adapter.as_ref(), &params.cloud_ids)
                .await
        }
    }
}

/// A resource mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// Delete a resource and its local record.
    Delete {
        /// Resource kind.
        kind: ResourceKind,
        /// Vendor id of the resource.
        cloud_id: String,
    },
    /// Attach a disk to an instance.
    AttachDisk {
        /// Vendor id of the disk.
        disk_id: String,
        /// Vendor id of the instance.
        cvm_id: String,
    },
    /// Detach a disk from an instance.
    DetachDisk {
        /// Vendor id of the disk.
        disk_id: String,
        /// Vendor id of the instance.
        cvm_id: String,
    },
    /// Associate an elastic IP with an instance.
    AssociateEip {
        /// Vendor id of the elastic IP.
        eip_id: String,
        /// Vendor id of the instance.
        cvm_id: String,
    },
    /// Disassociate an elastic IP from an instance.
    DisassociateEip {
        /// Vendor id of the elastic IP.
        eip_id: String,
        /// Vendor id of the instance.
        cvm_id: String,
    },
}

/// Parameters of [`MutateResourceAction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MutateResourceParams {
    /// Where the resource lives. Disk mutations need the disk's zone.
    pub scope: Scope,
    /// What to do.
    pub mutation: Mutation,
}

impl Validate for MutateResourceParams {
    fn validate(&self) -> Result<()> {
        match &self.mutation {
            Mutation::Delete { kind, cloud_id } => {
                self.scope.validate_for(*kind)?;
                require_id("cloud_id", cloud_id)
            }
            Mutation::AttachDisk { disk_id, cvm_id } | Mutation::DetachDisk { disk_id, cvm_id } => {
                self.scope.validate_for(ResourceKind::Disk)?;
                require_id("disk_id", disk_id)?;
                require_id("cvm_id", cvm_id)
            }
            Mutation::AssociateEip { eip_id, cvm_id }
            | Mutation::DisassociateEip { eip_id, cvm_id } => {
                self.scope.validate_for(ResourceKind::Eip)?;
                require_id("eip_id", eip_id)?;
                require_id("cvm_id", cvm_id)
            }
        }
    }
}

/// Outcome of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MutationReport {
    /// Local rows written or removed (records for deletes, relations for
    /// attachments).
    pub affected: u64,
}

/// Applies a [`Mutation`] through [`ResourceOps`].
///
/// Every mutation converges when repeated: vendor deletes of a missing
/// resource succeed and relations are only created once.
pub struct MutateResourceAction {
    ops: ResourceOps,
}

impl MutateResourceAction {
    /// Create the action.
    #[must_use]
    pub fn new(ops: ResourceOps) -> Self {
        Self { ops }
    }
}

#[async_trait]
impl Action for MutateResourceAction {
    const NAME: &'static str = "mutate_resource";
    type Params = MutateResourceParams;
    type Output = MutationReport;

    async fn run(&self, kit: &ExecuteKit, params: MutateResourceParams) -> Result<MutationReport> {
        let scope = &params.scope;
        let affected = match &params.mutation {
            Mutation::Delete { kind, cloud_id } => {
                self.ops.delete(kit, scope, *kind, cloud_id).await?
            }
            Mutation::AttachDisk { disk_id, cvm_id } => {
                self.ops.attach_disk(kit, scope, disk_id, cvm_id).await?
            }
            Mutation::DetachDisk { disk_id, cvm_id } => {
                self.ops.detach_disk(kit, scope, disk_id, cvm_id).await?
            }
            Mutation::AssociateEip { eip_id, cvm_id } => {
                self.ops.associate_eip(kit, scope, eip_id, cvm_id).await?
            }
            Mutation::DisassociateEip { eip_id, cvm_id } => {
                self.ops.disassociate_eip(kit, scope, eip_id, cvm_id).await?
            }
        };
        Ok(MutationReport { affected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcm_core::{ErrorKind, Vendor};
    use serde_json::json;

    #[test]
    fn sync_params_flatten_scope() {
        let params: SyncResourceParams = serde_json::from_value(json!({
            "vendor": "huawei",
            "account_id": "acc-1",
            "region": "cn-north-4",
            "kind": "eip"
        }))
        .unwrap();
        assert_eq!(params.scope.vendor, Vendor::HuaWei);
        assert!(params.cloud_ids.is_empty());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn disk_sync_without_zone_is_rejected() {
        let params = SyncResourceParams {
            scope: Scope::new(Vendor::Gcp, "acc-1", "us-central1"),
            kind: ResourceKind::Disk,
            cloud_ids: Vec::new(),
        };
        assert_eq!(params.validate().unwrap_err().kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn mutation_is_tagged_by_op() {
        let params: MutateResourceParams = serde_json::from_value(json!({
            "scope": {"vendor": "aws", "account_id": "acc-1", "region": "us-east-1"},
            "mutation": {"op": "associate_eip", "eip_id": "eipalloc-1", "cvm_id": "i-1"}
        }))
        .unwrap();
        assert!(matches!(params.mutation, Mutation::AssociateEip { .. }));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn blank_ids_are_rejected() {
        let params = MutateResourceParams {
            scope: Scope::new(Vendor::Aws, "acc-1", "us-east-1").with_zone("us-east-1a"),
            mutation: Mutation::AttachDisk {
                disk_id: " ".into(),
                cvm_id: "i-1".into(),
            },
        };
        assert!(params.validate().is_err());
    }
}
