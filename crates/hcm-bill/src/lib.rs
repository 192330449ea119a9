//! Billing pipeline for the hybrid cloud control plane.
//!
//! Each day of vendor bills moves through a pull task state machine:
//!
//! ```text
//! Pulling --split--> Splitted --daily summary--> Accounted
//! ```
//!
//! - [`SplitAction`] replaces the day's line items and marks the task
//!   `Splitted`.
//! - [`DailySummaryAction`] sums the day's items with exact decimals, upserts
//!   the daily summary, and marks the task `Accounted`.
//! - [`MonthlySummaryAction`] rolls the daily summaries of one version up
//!   into the monthly summary.
//! - [`PromoteVersionAction`] promotes the current monthly figures to the
//!   synced figures and records a version snapshot.
//! - [`RetriggerAction`] sends an `Accounted` day back to `Splitted`.
//!
//! Every action is idempotent: a repeat run converges to the same rows.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
mod daily;
mod lookup;
mod monthly;
mod params;
mod promote;
mod pull;
mod split;

pub use config::DailySummaryConfig;
pub use daily::{DailyReport, DailySummaryAction};
pub use monthly::{MonthlyReport, MonthlySummaryAction};
pub use params::{DayParams, MonthParams, PromoteParams, RawBillItem, SplitParams};
pub use promote::{PromoteReport, PromoteVersionAction};
pub use pull::{find_pull_task, retrigger, RetriggerAction};
pub use split::{SplitAction, SplitReport};

use hcm_task::ActionRegistry;

/// Register every billing action.
pub fn register_actions(registry: &mut ActionRegistry, config: DailySummaryConfig) {
    registry
        .register(SplitAction)
        .register(DailySummaryAction::new(config))
        .register(MonthlySummaryAction::new(config))
        .register(PromoteVersionAction)
        .register(RetriggerAction);
}
