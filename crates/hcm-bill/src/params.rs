//! Action parameters.

use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use hcm_core::{BillKey, HcmError, Result};
use hcm_task::Validate;

fn check_day(bill_day: u32) -> Result<()> {
    if !(1..=31).contains(&bill_day) {
        return Err(HcmError::invalid_parameter(format!(
            "bill_day must be in 1..=31, got {bill_day}"
        )));
    }
    Ok(())
}

fn check_version(version_id: u32) -> Result<()> {
    if version_id == 0 {
        return Err(HcmError::invalid_parameter("version_id must be positive"));
    }
    Ok(())
}

/// One day of one bill version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DayParams {
    /// Ownership and month.
    #[serde(flatten)]
    pub key: BillKey,
    /// Bill version.
    pub version_id: u32,
    /// Bill day, `1..=31`.
    pub bill_day: u32,
}

impl Validate for DayParams {
    fn validate(&self) -> Result<()> {
        self.key.validate()?;
        check_version(self.version_id)?;
        check_day(self.bill_day)
    }
}

/// One month of one bill version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MonthParams {
    /// Ownership and month.
    #[serde(flatten)]
    pub key: BillKey,
    /// Bill version to roll up.
    pub version_id: u32,
    /// Conversion rate to RMB. Defaults to the stored rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
}

impl Validate for MonthParams {
    fn validate(&self) -> Result<()> {
        self.key.validate()?;
        check_version(self.version_id)?;
        if let Some(rate) = self.rate {
            if rate <= Decimal::ZERO {
                return Err(HcmError::invalid_parameter(format!(
                    "rate must be positive, got {rate}"
                )));
            }
        }
        Ok(())
    }
}

/// One month to promote. The version comes from the stored summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PromoteParams {
    /// Ownership and month.
    #[serde(flatten)]
    pub key: BillKey,
}

impl Validate for PromoteParams {
    fn validate(&self) -> Result<()> {
        self.key.validate()
    }
}

/// A line item as delivered by the bill puller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawBillItem {
    /// Cost, exact.
    pub cost: Decimal,
    /// ISO currency code.
    #[serde(default)]
    pub currency: String,
    /// Internal product code.
    #[serde(default)]
    pub hc_product_code: String,
    /// Vendor-specific raw fields.
    #[serde(default)]
    pub extension: Value,
}

/// Items of one day to split into line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SplitParams {
    /// The day.
    #[serde(flatten)]
    pub day: DayParams,
    /// The day's items.
    #[serde(default)]
    pub items: Vec<RawBillItem>,
}

impl Validate for SplitParams {
    fn validate(&self) -> Result<()> {
        self.day.validate()
    }
}
