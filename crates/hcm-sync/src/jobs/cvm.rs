use hcm_core::ResourceKind;

use super::SyncJob;

/// Compute instance reconciliation. Region scoped; instances keep the zone
/// the vendor reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct CvmSync;

impl SyncJob for CvmSync {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Cvm
    }
}
