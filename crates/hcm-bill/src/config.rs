//! Billing action configuration.

use serde::{Deserialize, Serialize};

use hcm_core::{HcmError, Result, DEFAULT_MAX_PAGE_LIMIT};

/// Paging of billing aggregation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailySummaryConfig {
    /// Rows per storage page when summing items or daily summaries.
    pub item_page_size: u32,
}

impl Default for DailySummaryConfig {
    fn default() -> Self {
        Self {
            item_page_size: DEFAULT_MAX_PAGE_LIMIT,
        }
    }
}

impl DailySummaryConfig {
    /// Check the page size is within the storage bound.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` otherwise.
    pub fn validate(&self) -> Result<()> {
        if self.item_page_size == 0 || self.item_page_size > DEFAULT_MAX_PAGE_LIMIT {
            return Err(HcmError::invalid_parameter(format!(
                "item_page_size must be in 1..={DEFAULT_MAX_PAGE_LIMIT}, got {}",
                self.item_page_size
            )));
        }
        Ok(())
    }
}
