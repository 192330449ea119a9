//! The vendor adapter contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use hcm_core::{CloudResource, ResourceKind, Scope, Vendor};

use crate::error::{CloudError, Result};

/// One page of a vendor listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudPage {
    /// Resources on this page.
    #[serde(default)]
    pub details: Vec<CloudResource>,
    /// Opaque continuation token; `None` when the listing is exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Paginated listing and mutation of one resource kind at one vendor.
///
/// Implementations are stateless with respect to reconciliation: every call
/// carries the full scope, and cursors are opaque strings produced by the
/// adapter itself.
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// The vendor this adapter talks to.
    fn vendor(&self) -> Vendor;

    /// The resource kind this adapter lists.
    fn kind(&self) -> ResourceKind;

    /// Maximum number of ids accepted by one `list_by_ids` call.
    fn query_limit(&self) -> usize;

    /// List one page of resources in `scope`, starting at `cursor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the vendor call fails.
    async fn list(&self, scope: &Scope, cursor: Option<&str>) -> Result<CloudPage>;

    /// Fetch the resources among `ids` that currently exist in `scope`.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::InvalidRequest` if `ids` exceeds
    /// [`query_limit`](Self::query_limit), or an error if the vendor call
    /// fails.
    async fn list_by_ids(&self, scope: &Scope, ids: &[String]) -> Result<Vec<CloudResource>>;

    /// Create resources from a vendor-specific spec and return their
    /// descriptors.
    ///
    /// # Errors
    ///
    /// Returns an error if the vendor call fails.
    async fn create(&self, scope: &Scope, spec: &Value) -> Result<Vec<CloudResource>>;

    /// Delete one resource. Deleting an absent resource succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the vendor call fails.
    async fn delete(&self, scope: &Scope, cloud_id: &str) -> Result<()>;

    /// Attach this resource to a compute instance.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::Unsupported` unless the adapter overrides it.
    async fn attach(&self, scope: &Scope, cloud_id: &str, target_cloud_id: &str) -> Result<()> {
        let _ = (scope, cloud_id, target_cloud_id);
        Err(self.unsupported("attach"))
    }

    /// Detach this resource from a compute instance.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::Unsupported` unless the adapter overrides it.
    async fn detach(&self, scope: &Scope, cloud_id: &str, target_cloud_id: &str) -> Result<()> {
        let _ = (scope, cloud_id, target_cloud_id);
        Err(self.unsupported("detach"))
    }

    /// Build the error returned by operations the adapter lacks.
    fn unsupported(&self, operation: &'static str) -> CloudError {
        CloudError::Unsupported {
            vendor: self.vendor().to_string(),
            kind: self.kind().to_string(),
            operation,
        }
    }
}

/// Reject an id set larger than the adapter's query limit.
pub(crate) fn check_query_limit(adapter: &dyn ResourceAdapter, ids: &[String]) -> Result<()> {
    if ids.len() > adapter.query_limit() {
        return Err(CloudError::InvalidRequest(format!(
            "{} ids exceed the {}/{} query limit of {}",
            ids.len(),
            adapter.vendor(),
            adapter.kind(),
            adapter.query_limit()
        )));
    }
    Ok(())
}
