//! Promotion of the current monthly figures to the synced figures.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use hcm_core::{
    last_month, BillSummaryMainPatch, BillSummaryVersion, Expression, HcmError, Result,
    SummaryState,
};
use hcm_task::{Action, ExecuteKit};

use crate::lookup::at_most_one;
use crate::params::PromoteParams;

/// Outcome of a promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromoteReport {
    /// Promoted version.
    pub version_id: u32,
    /// Promoted cost.
    pub cost: Decimal,
    /// Promoted RMB cost.
    pub rmb_cost: Decimal,
    /// Whether this run wrote the version snapshot.
    pub snapshot_created: bool,
}

/// Promotes a month's current figures: copies them into the synced fields,
/// carries the previous month's synced cost forward, and records an
/// immutable snapshot of the version.
pub struct PromoteVersionAction;

#[async_trait]
impl Action for PromoteVersionAction {
    const NAME: &'static str = "promote_version";
    type Params = PromoteParams;
    type Output = PromoteReport;

    async fn run(&self, kit: &ExecuteKit, params: PromoteParams) -> Result<PromoteReport> {
        let store = kit.store();
        let key = &params.key;
        let main = at_most_one(
            store.main_summaries(),
            &Expression::and(key.rules()),
            "monthly summary",
        )
        .await?
        .ok_or_else(|| HcmError::invariant(format!("no monthly summary for {key}")))?;

        if main.current_version < main.last_synced_version {
            return Err(HcmError::invariant(format!(
                "{key} current version {} is behind synced version {}",
                main.current_version, main.last_synced_version
            )));
        }

        let (year, month) = last_month(key.bill_year, key.bill_month)?;
        let previous = at_most_one(
            store.main_summaries(),
            &Expression::and(key.with_month(year, month).rules()),
            "monthly summary",
        )
        .await?;
        let (last_cost, last_rmb) = previous.map_or((Decimal::ZERO, Decimal::ZERO), |p| {
            (p.current_month_cost_synced, p.current_month_rmb_cost_synced)
        });

        kit.ensure_active()?;
        let snapshot_filter = BillSummaryVersion::version_filter(key, main.current_version);
        let snapshot_created = if store.summary_versions().count(&snapshot_filter).await? == 0 {
            store
                .summary_versions()
                .batch_create(vec![BillSummaryVersion::snapshot(&main)])
                .await?;
            true
        } else {
            false
        };

        let patch = BillSummaryMainPatch {
            last_synced_version: Some(main.current_version),
            current_month_cost_synced: Some(main.current_month_cost),
            current_month_rmb_cost_synced: Some(main.current_month_rmb_cost),
            last_month_cost_synced: Some(last_cost),
            last_month_rmb_cost_synced: Some(last_rmb),
            state: Some(SummaryState::Synced),
            ..BillSummaryMainPatch::default()
        };
        store.main_summaries().update_by_id(&main.id, &patch).await?;

        tracing::info!(
            rid = %kit.rid(),
            key = %key,
            version_id = main.current_version,
            cost = %main.current_month_cost,
            snapshot_created,
            "Monthly version promoted"
        );
        Ok(PromoteReport {
            version_id: main.current_version,
            cost: main.current_month_cost,
            rmb_cost: main.current_month_rmb_cost,
            snapshot_created,
        })
    }
}
