//! Calendar helpers for bill months.

use crate::error::{HcmError, Result};

/// The `(year, month)` before the given bill month.
///
/// # Errors
///
/// Returns `InvalidParameter` if `month` is not in `1..=12` or the year would
/// underflow.
pub fn last_month(year: u32, month: u32) -> Result<(u32, u32)> {
    match month {
        1 => year
            .checked_sub(1)
            .map(|y| (y, 12))
            .ok_or_else(|| HcmError::invalid_parameter("bill_year out of range")),
        2..=12 => Ok((year, month - 1)),
        _ => Err(HcmError::invalid_parameter(format!(
            "bill_month must be in 1..=12, got {month}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_january() {
        assert_eq!(last_month(2024, 1).unwrap(), (2023, 12));
        assert_eq!(last_month(2024, 7).unwrap(), (2024, 6));
    }

    #[test]
    fn rejects_bad_month() {
        assert!(last_month(2024, 0).is_err());
        assert!(last_month(2024, 13).is_err());
        assert!(last_month(0, 1).is_err());
    }
}
