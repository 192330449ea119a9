use hcm_core::ResourceKind;

use super::SyncJob;

/// Elastic IP reconciliation. Region scoped.
#[derive(Debug, Clone, Copy, Default)]
pub struct EipSync;

impl SyncJob for EipSync {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Eip
    }
}
