use hcm_core::ResourceKind;

use super::SyncJob;

/// VPC reconciliation. Region scoped.
#[derive(Debug, Clone, Copy, Default)]
pub struct VpcSync;

impl SyncJob for VpcSync {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Vpc
    }
}
