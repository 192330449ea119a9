//! Pagination options for Storage Layer reads.

use serde::{Deserialize, Serialize};

use crate::error::{HcmError, Result};
use crate::filter::Expression;

/// Largest page a single Storage Layer read may return.
pub const DEFAULT_MAX_PAGE_LIMIT: u32 = 500;

/// A page window: skip `start` rows, return at most `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Rows to skip.
    pub start: u32,
    /// Maximum rows to return. Must be in `1..=DEFAULT_MAX_PAGE_LIMIT`.
    pub limit: u32,
}

impl Page {
    /// A page starting at `start`.
    #[must_use]
    pub const fn new(start: u32, limit: u32) -> Self {
        Self { start, limit }
    }

    /// The first page with the given limit.
    #[must_use]
    pub const fn first(limit: u32) -> Self {
        Self { start: 0, limit }
    }

    /// The page after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            start: self.start.saturating_add(self.limit),
            limit: self.limit,
        }
    }

    /// Check the limit bounds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the limit is zero or above
    /// [`DEFAULT_MAX_PAGE_LIMIT`].
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 || self.limit > DEFAULT_MAX_PAGE_LIMIT {
            return Err(HcmError::invalid_parameter(format!(
                "page limit must be in 1..={DEFAULT_MAX_PAGE_LIMIT}, got {}",
                self.limit
            )));
        }
        Ok(())
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::first(DEFAULT_MAX_PAGE_LIMIT)
    }
}

/// Options of a Storage Layer `list` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListOption {
    /// Row filter.
    pub filter: Expression,
    /// Page window.
    pub page: Page,
}

impl ListOption {
    /// List rows matching `filter` within `page`.
    #[must_use]
    pub fn new(filter: Expression, page: Page) -> Self {
        Self { filter, page }
    }
}
