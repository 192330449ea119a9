//! Resource sync jobs.
//!
//! A job tells the [`Reconciler`](crate::Reconciler) which resource kind it
//! reconciles, how a vendor descriptor becomes a local record, and which
//! local records belong to a scope.

mod cvm;
mod disk;
mod eip;
mod vpc;

pub use cvm::CvmSync;
pub use disk::DiskSync;
pub use eip::EipSync;
pub use vpc::VpcSync;

use hcm_core::{CloudResource, Expression, ResourceKind, ResourceRecord, Result, Scope};

/// One resource kind's instantiation of the reconciler.
pub trait SyncJob: Send + Sync {
    /// The kind reconciled.
    fn kind(&self) -> ResourceKind;

    /// Check the scope is complete for this kind.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for an incomplete scope.
    fn validate_scope(&self, scope: &Scope) -> Result<()> {
        scope.validate_for(self.kind())
    }

    /// Local record for a vendor descriptor.
    fn to_record(&self, scope: &Scope, cloud: &CloudResource) -> ResourceRecord {
        ResourceRecord::from_cloud(scope, self.kind(), cloud)
    }

    /// Storage filter for every local record of this kind in `scope`.
    fn filter(&self, scope: &Scope) -> Expression {
        scope.filter(self.kind())
    }
}

/// The job for a resource kind.
#[must_use]
pub fn job_for(kind: ResourceKind) -> &'static dyn SyncJob {
    match kind {
        ResourceKind::Vpc => &VpcSync,
        ResourceKind::Disk => &DiskSync,
        ResourceKind::Eip => &EipSync,
        ResourceKind::Cvm => &CvmSync,
    }
}
