//! Daily aggregation of line items.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use hcm_core::{
    BillSummaryDaily, BillSummaryDailyPatch, PullState, Result, DEFAULT_CURRENCY,
};
use hcm_task::{Action, ExecuteKit};

use crate::config::DailySummaryConfig;
use crate::lookup::{at_most_one, sum_pages};
use crate::params::DayParams;
use crate::pull::{find_pull_task, transition};

/// Outcome of a daily aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyReport {
    /// Summed cost.
    pub cost: Decimal,
    /// Items summed.
    pub count: u64,
    /// Currency of `cost`.
    pub currency: String,
    /// Whether the task was not `Splitted` and nothing was done.
    pub skipped: bool,
}

impl DailyReport {
    fn skipped() -> Self {
        Self {
            cost: Decimal::ZERO,
            count: 0,
            currency: String::new(),
            skipped: true,
        }
    }
}

/// Sums a `Splitted` day's line items into its daily summary and marks the
/// pull task `Accounted`.
///
/// The lookup requires exactly one pull task; anything else fails with
/// `InvariantViolation` before any write. A task in any state other than
/// `Splitted` is left alone.
pub struct DailySummaryAction {
    config: DailySummaryConfig,
}

impl DailySummaryAction {
    /// Create the action.
    #[must_use]
    pub fn new(config: DailySummaryConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Action for DailySummaryAction {
    const NAME: &'static str = "daily_summary";
    type Params = DayParams;
    type Output = DailyReport;

    async fn run(&self, kit: &ExecuteKit, params: DayParams) -> Result<DailyReport> {
        self.config.validate()?;
        let store = kit.store();
        let task = find_pull_task(store, &params.key, params.version_id, params.bill_day).await?;

        if task.state != PullState::Splitted {
            tracing::debug!(
                rid = %kit.rid(),
                task_id = %task.id,
                state = %task.state,
                "Pull task not splitted, skipping"
            );
            return Ok(DailyReport::skipped());
        }

        let filter = params.key.day_filter(params.version_id, params.bill_day);
        let total = sum_pages(
            kit,
            store.bill_items(),
            &filter,
            self.config.item_page_size,
            |t, item| t.add(item.cost, &item.currency),
        )
        .await?;
        let currency = total
            .currency
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        kit.ensure_active()?;
        let existing = at_most_one(store.daily_summaries(), &filter, "daily summary").await?;
        match existing {
            None => {
                let summary = BillSummaryDaily::new(
                    params.key.clone(),
                    params.version_id,
                    params.bill_day,
                    total.cost,
                    total.count,
                    currency.clone(),
                );
                store.daily_summaries().batch_create(vec![summary]).await?;
            }
            Some(summary) => {
                if summary.cost != total.cost
                    || summary.count != total.count
                    || summary.currency != currency
                {
                    let patch = BillSummaryDailyPatch {
                        cost: Some(total.cost),
                        count: Some(total.count),
                        currency: Some(currency.clone()),
                    };
                    store
                        .daily_summaries()
                        .update_by_id(&summary.id, &patch)
                        .await?;
                }
            }
        }

        transition(store, &task, PullState::Accounted).await?;

        tracing::info!(
            rid = %kit.rid(),
            key = %params.key,
            version_id = params.version_id,
            bill_day = params.bill_day,
            cost = %total.cost,
            count = total.count,
            "Daily summary accounted"
        );
        Ok(DailyReport {
            cost: total.cost,
            count: total.count,
            currency,
            skipped: false,
        })
    }
}
