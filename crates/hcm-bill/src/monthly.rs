//! Monthly rollup of daily summaries.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use hcm_core::{
    BillSummaryMain, BillSummaryMainPatch, Expression, HcmError, Result, SummaryState,
    DEFAULT_CURRENCY,
};
use hcm_task::{Action, ExecuteKit};

use crate::config::DailySummaryConfig;
use crate::lookup::{at_most_one, sum_pages};
use crate::params::MonthParams;

/// Outcome of a monthly rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyReport {
    /// Rolled-up version.
    pub version_id: u32,
    /// Summed cost.
    pub cost: Decimal,
    /// `cost` converted at the rate.
    pub rmb_cost: Decimal,
    /// Daily summaries summed.
    pub days: u64,
}

/// Rolls every daily summary of one version up into the monthly summary.
///
/// Only the `current_*` figures change; synced figures are left to
/// promotion. Rolling up a version older than the last synced one fails with
/// `InvariantViolation`.
pub struct MonthlySummaryAction {
    config: DailySummaryConfig,
}

impl MonthlySummaryAction {
    /// Create the action.
    #[must_use]
    pub fn new(config: DailySummaryConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Action for MonthlySummaryAction {
    const NAME: &'static str = "monthly_summary";
    type Params = MonthParams;
    type Output = MonthlyReport;

    async fn run(&self, kit: &ExecuteKit, params: MonthParams) -> Result<MonthlyReport> {
        self.config.validate()?;
        let store = kit.store();
        let key_filter = Expression::and(params.key.rules());
        let existing = at_most_one(store.main_summaries(), &key_filter, "monthly summary").await?;

        if let Some(main) = &existing {
            if params.version_id < main.last_synced_version {
                return Err(HcmError::invariant(format!(
                    "{} version {} is older than synced version {}",
                    params.key, params.version_id, main.last_synced_version
                )));
            }
        }

        let days = params.key.day_filter(params.version_id, 0);
        let total = sum_pages(
            kit,
            store.daily_summaries(),
            &days,
            self.config.item_page_size,
            |t, day| t.add(day.cost, &day.currency),
        )
        .await?;

        let rate = params
            .rate
            .or_else(|| existing.as_ref().map(|m| m.rate))
            .unwrap_or(Decimal::ONE);
        let rmb_cost = total.cost * rate;
        let currency = total
            .currency
            .or_else(|| existing.as_ref().map(|m| m.currency.clone()))
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        kit.ensure_active()?;
        match existing {
            None => {
                let mut main = BillSummaryMain::new(params.key.clone());
                main.current_version = params.version_id;
                main.current_month_cost = total.cost;
                main.current_month_rmb_cost = rmb_cost;
                main.currency = currency;
                main.rate = rate;
                main.state = SummaryState::Accounted;
                store.main_summaries().batch_create(vec![main]).await?;
            }
            Some(main) => {
                let patch = BillSummaryMainPatch {
                    current_version: Some(params.version_id),
                    current_month_cost: Some(total.cost),
                    current_month_rmb_cost: Some(rmb_cost),
                    currency: Some(currency),
                    rate: Some(rate),
                    state: Some(SummaryState::Accounted),
                    ..BillSummaryMainPatch::default()
                };
                store.main_summaries().update_by_id(&main.id, &patch).await?;
            }
        }

        tracing::info!(
            rid = %kit.rid(),
            key = %params.key,
            version_id = params.version_id,
            cost = %total.cost,
            rmb_cost = %rmb_cost,
            days = total.count,
            "Monthly summary rolled up"
        );
        Ok(MonthlyReport {
            version_id: params.version_id,
            cost: total.cost,
            rmb_cost,
            days: total.count,
        })
    }
}
