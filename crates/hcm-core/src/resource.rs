//! Cloud resources and their local records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::entity::Entity;
use crate::error::{HcmError, Result};
use crate::filter::{Expression, Rule};
use crate::ids::LocalId;
use crate::vendor::{ResourceKind, Vendor};

/// A resource as reported by a Vendor Adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudResource {
    /// The vendor's identifier.
    pub cloud_id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Availability zone, for zonal resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    /// Vendor-specific extension attributes.
    #[serde(default)]
    pub attributes: Value,
}

impl CloudResource {
    /// A descriptor with only an id and a name.
    pub fn new(cloud_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            cloud_id: cloud_id.into(),
            name: name.into(),
            zone: None,
            attributes: Value::Null,
        }
    }
}

/// The vendor, account, region and optional zone a reconciliation covers.
///
/// Together with a [`ResourceKind`] the scope fully determines both the vendor
/// query and the storage filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Scope {
    /// Cloud vendor.
    pub vendor: Vendor,
    /// Local cloud account identifier.
    pub account_id: String,
    /// Region name.
    pub region: String,
    /// Zone, required for zonal resource kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

impl Scope {
    /// A region-level scope.
    pub fn new(vendor: Vendor, account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            vendor,
            account_id: account_id.into(),
            region: region.into(),
            zone: None,
        }
    }

    /// Narrow the scope to a zone.
    #[must_use]
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Check the scope is complete for the given kind.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the account or region is empty, or if a
    /// zonal kind is requested without a zone.
    pub fn validate_for(&self, kind: ResourceKind) -> Result<()> {
        if self.account_id.trim().is_empty() {
            return Err(HcmError::invalid_parameter("account_id is required"));
        }
        if self.region.trim().is_empty() {
            return Err(HcmError::invalid_parameter("region is required"));
        }
        if kind.is_zonal() && self.zone.as_deref().map_or(true, str::is_empty) {
            return Err(HcmError::invalid_parameter(format!(
                "zone is required for {kind} resources"
            )));
        }
        Ok(())
    }

    /// Storage filter selecting every local record of `kind` in this scope.
    #[must_use]
    pub fn filter(&self, kind: ResourceKind) -> Expression {
        let mut rules = vec![
            Rule::eq("vendor", self.vendor.as_str()),
            Rule::eq("account_id", self.account_id.as_str()),
            Rule::eq("kind", kind.as_str()),
            Rule::eq("region", self.region.as_str()),
        ];
        if let Some(zone) = &self.zone {
            rules.push(Rule::eq("zone", zone.as_str()));
        }
        Expression::and(rules)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.vendor, self.account_id, self.region)?;
        if let Some(zone) = &self.zone {
            write!(f, "/{zone}")?;
        }
        Ok(())
    }
}

/// The local system-of-record entry for one cloud resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Local identifier, assigned by the Storage Layer.
    pub id: LocalId,
    /// Cloud vendor.
    pub vendor: Vendor,
    /// Local cloud account identifier.
    pub account_id: String,
    /// Resource type.
    pub kind: ResourceKind,
    /// The vendor's identifier.
    pub cloud_id: String,
    /// Region name.
    pub region: String,
    /// Zone, for zonal resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    /// Display name.
    pub name: String,
    /// Vendor-specific extension attributes.
    #[serde(default)]
    pub attributes: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ResourceRecord {
    /// Build a record for a cloud resource discovered in `scope`.
    ///
    /// The id is a placeholder until the Storage Layer assigns one.
    #[must_use]
    pub fn from_cloud(scope: &Scope, kind: ResourceKind, cloud: &CloudResource) -> Self {
        let now = Utc::now();
        Self {
            id: LocalId::generate(),
            vendor: scope.vendor,
            account_id: scope.account_id.clone(),
            kind,
            cloud_id: cloud.cloud_id.clone(),
            region: scope.region.clone(),
            zone: cloud.zone.clone().or_else(|| scope.zone.clone()),
            name: cloud.name.clone(),
            attributes: cloud.attributes.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The patch that brings this record in line with `cloud`, or `None` when
    /// nothing diverges.
    #[must_use]
    pub fn diff(&self, cloud: &CloudResource) -> Option<ResourcePatch> {
        let mut patch = ResourcePatch::default();
        if self.name != cloud.name {
            patch.name = Some(cloud.name.clone());
        }
        if cloud.zone.is_some() && self.zone != cloud.zone {
            patch.zone.clone_from(&cloud.zone);
        }
        if self.attributes != cloud.attributes {
            patch.attributes = Some(cloud.attributes.clone());
        }
        (!patch.is_empty()).then_some(patch)
    }
}

impl Entity for ResourceRecord {
    const TABLE: &'static str = "resources";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "vendor",
        "account_id",
        "kind",
        "cloud_id",
        "region",
        "zone",
        "name",
    ];
    type Patch = ResourcePatch;

    fn id(&self) -> &LocalId {
        &self.id
    }

    fn assign_id(&mut self, id: LocalId) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<String> {
        Some(format!(
            "{}/{}/{}/{}",
            self.vendor, self.account_id, self.kind, self.cloud_id
        ))
    }

    fn touch(&mut self, now: DateTime<Utc>, created: bool) {
        if created {
            self.created_at = now;
        }
        self.updated_at = now;
    }
}

/// Fields of a [`ResourceRecord`] the reconciler may change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcePatch {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    /// New extension attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,
}

impl ResourcePatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.zone.is_none() && self.attributes.is_none()
    }
}

/// Type of a relation between two resource records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// A disk (left) attached to a compute instance (right).
    DiskCvm,
    /// An elastic IP (left) associated with a compute instance (right).
    EipCvm,
}

impl RelationKind {
    /// Stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DiskCvm => "disk_cvm",
            Self::EipCvm => "eip_cvm",
        }
    }
}

/// A denormalised reverse relation between two local records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRelation {
    /// Local identifier.
    pub id: LocalId,
    /// Relation type.
    pub kind: RelationKind,
    /// The dependent record (disk or EIP).
    pub left_id: LocalId,
    /// The owning record (compute instance).
    pub right_id: LocalId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ResourceRelation {
    /// A new relation. The id is assigned by the Storage Layer.
    #[must_use]
    pub fn new(kind: RelationKind, left_id: LocalId, right_id: LocalId) -> Self {
        let now = Utc::now();
        Self {
            id: LocalId::generate(),
            kind,
            left_id,
            right_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Filter selecting exactly this relation pair.
    #[must_use]
    pub fn pair_filter(kind: RelationKind, left_id: &LocalId, right_id: &LocalId) -> Expression {
        Expression::and(vec![
            Rule::eq("kind", kind.as_str()),
            Rule::eq("left_id", left_id.to_string()),
            Rule::eq("right_id", right_id.to_string()),
        ])
    }
}

impl Entity for ResourceRelation {
    const TABLE: &'static str = "resource_relations";
    const FIELDS: &'static [&'static str] = &["id", "kind", "left_id", "right_id"];
    type Patch = crate::entity::NoPatch;

    fn id(&self) -> &LocalId {
        &self.id
    }

    fn assign_id(&mut self, id: LocalId) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<String> {
        Some(format!(
            "{}/{}/{}",
            self.kind.as_str(),
            self.left_id,
            self.right_id
        ))
    }

    fn touch(&mut self, now: DateTime<Utc>, created: bool) {
        if created {
            self.created_at = now;
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> Scope {
        Scope::new(Vendor::Aws, "acc-1", "us-east-1")
    }

    #[test]
    fn scope_filter_matches_own_records() {
        let record = ResourceRecord::from_cloud(
            &scope(),
            ResourceKind::Vpc,
            &CloudResource::new("vpc-1", "main"),
        );
        let doc = serde_json::to_value(&record).unwrap();
        assert!(scope().filter(ResourceKind::Vpc).matches(&doc));
        assert!(!scope().filter(ResourceKind::Eip).matches(&doc));

        let other = Scope::new(Vendor::Aws, "acc-1", "eu-west-1");
        assert!(!other.filter(ResourceKind::Vpc).matches(&doc));
    }

    #[test]
    fn disk_scope_requires_zone() {
        assert!(scope().validate_for(ResourceKind::Disk).is_err());
        assert!(scope()
            .with_zone("us-east-1a")
            .validate_for(ResourceKind::Disk)
            .is_ok());
        assert!(Scope::new(Vendor::Gcp, "", "r").validate_for(ResourceKind::Vpc).is_err());
    }

    #[test]
    fn diff_reports_only_divergent_fields() {
        let mut cloud = CloudResource::new("vpc-1", "main");
        cloud.attributes = json!({"cidr": "10.0.0.0/16"});
        let record = ResourceRecord::from_cloud(&scope(), ResourceKind::Vpc, &cloud);
        assert_eq!(record.diff(&cloud), None);

        cloud.name = "renamed".into();
        let patch = record.diff(&cloud).unwrap();
        assert_eq!(patch.name.as_deref(), Some("renamed"));
        assert!(patch.attributes.is_none());
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"name": "renamed"})
        );
    }

    #[test]
    fn unique_key_ignores_region() {
        let a =
            ResourceRecord::from_cloud(&scope(), ResourceKind::Vpc, &CloudResource::new("x", ""));
        let b = ResourceRecord::from_cloud(
            &Scope::new(Vendor::Aws, "acc-1", "eu-west-1"),
            ResourceKind::Vpc,
            &CloudResource::new("x", ""),
        );
        assert_eq!(a.unique_key(), b.unique_key());
    }

    #[test]
    fn scope_display() {
        assert_eq!(scope().with_zone("a").to_string(), "aws/acc-1/us-east-1/a");
    }
}
