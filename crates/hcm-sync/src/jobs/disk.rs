use hcm_core::ResourceKind;

use super::SyncJob;

/// Disk reconciliation. Zone scoped: the scope must name a zone, and records
/// fall back to the scope's zone when the vendor omits it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskSync;

impl SyncJob for DiskSync {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Disk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcm_core::{CloudResource, ErrorKind, Scope, Vendor};

    #[test]
    fn requires_zone() {
        let scope = Scope::new(Vendor::Azure, "acc", "eastus");
        let err = DiskSync.validate_scope(&scope).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert!(DiskSync.validate_scope(&scope.with_zone("1")).is_ok());
    }

    #[test]
    fn record_inherits_scope_zone() {
        let scope = Scope::new(Vendor::Azure, "acc", "eastus").with_zone("2");
        let record = DiskSync.to_record(&scope, &CloudResource::new("disk-1", "data"));
        assert_eq!(record.zone.as_deref(), Some("2"));
        assert_eq!(record.kind, ResourceKind::Disk);
    }
}
