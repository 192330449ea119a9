//! Reconciler configuration.

use serde::{Deserialize, Serialize};

use hcm_core::{HcmError, Result, DEFAULT_MAX_PAGE_LIMIT};

/// Default rows per storage write batch and per id lookup chunk.
const DEFAULT_BATCH_SIZE: usize = 100;

/// Tuning for reconciliation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Maximum records per `batch_create`, per local id lookup and per
    /// `delete_by_filter` call.
    pub batch_size: usize,
    /// Page size of the reverse pass over local records.
    pub page_size: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            page_size: DEFAULT_MAX_PAGE_LIMIT,
        }
    }
}

impl ReconcileConfig {
    /// Check both sizes are within the storage page bound.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if a size is zero or above the storage
    /// layer's page limit.
    pub fn validate(&self) -> Result<()> {
        let max = DEFAULT_MAX_PAGE_LIMIT as usize;
        if self.batch_size == 0 || self.batch_size > max {
            return Err(HcmError::invalid_parameter(format!(
                "batch_size must be in 1..={max}, got {}",
                self.batch_size
            )));
        }
        if self.page_size == 0 || self.page_size > DEFAULT_MAX_PAGE_LIMIT {
            return Err(HcmError::invalid_parameter(format!(
                "page_size must be in 1..={DEFAULT_MAX_PAGE_LIMIT}, got {}",
                self.page_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ReconcileConfig::default().validate().is_ok());
    }

    #[test]
    fn oversized_batch_rejected() {
        let config = ReconcileConfig {
            batch_size: 501,
            ..ReconcileConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
