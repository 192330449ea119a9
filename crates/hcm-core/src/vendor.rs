//! Cloud vendors and resource kinds.
//!
//! Vendor dispatch happens exactly once, at the adapter registry boundary.
//! Everything downstream is vendor-agnostic and only carries these tags.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HcmError;

/// An external cloud vendor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Tencent Cloud.
    #[serde(rename = "tcloud")]
    TCloud,
    /// Amazon Web Services.
    Aws,
    /// Google Cloud Platform.
    Gcp,
    /// Microsoft Azure.
    Azure,
    /// Huawei Cloud.
    #[serde(rename = "huawei")]
    HuaWei,
}

impl Vendor {
    /// All supported vendors.
    pub const ALL: [Self; 5] = [Self::TCloud, Self::Aws, Self::Gcp, Self::Azure, Self::HuaWei];

    /// Stable lowercase name, used in URLs, filters and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TCloud => "tcloud",
            Self::Aws => "aws",
            Self::Gcp => "gcp",
            Self::Azure => "azure",
            Self::HuaWei => "huawei",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = HcmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| HcmError::invalid_parameter(format!("unknown vendor: {s}")))
    }
}

/// A reconciled resource type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Virtual private cloud.
    Vpc,
    /// Block storage disk. Zone scoped.
    Disk,
    /// Elastic IP address.
    Eip,
    /// Compute instance.
    Cvm,
}

impl ResourceKind {
    /// All resource kinds.
    pub const ALL: [Self; 4] = [Self::Vpc, Self::Disk, Self::Eip, Self::Cvm];

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vpc => "vpc",
            Self::Disk => "disk",
            Self::Eip => "eip",
            Self::Cvm => "cvm",
        }
    }

    /// Whether listing this kind requires a zone in the scope.
    #[must_use]
    pub const fn is_zonal(self) -> bool {
        matches!(self, Self::Disk)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = HcmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| HcmError::invalid_parameter(format!("unknown resource kind: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_names_match_serde() {
        for vendor in Vendor::ALL {
            let json = serde_json::to_value(vendor).unwrap();
            assert_eq!(json, serde_json::Value::String(vendor.as_str().to_string()));
            assert_eq!(vendor.as_str().parse::<Vendor>().unwrap(), vendor);
        }
    }

    #[test]
    fn unknown_vendor_is_invalid_parameter() {
        let err = "oracle".parse::<Vendor>().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidParameter);
    }

    #[test]
    fn only_disks_are_zonal() {
        assert!(ResourceKind::Disk.is_zonal());
        assert!(!ResourceKind::Vpc.is_zonal());
        assert_eq!("CVM".parse::<ResourceKind>().unwrap(), ResourceKind::Cvm);
    }
}
