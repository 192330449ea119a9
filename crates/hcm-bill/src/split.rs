//! Splitting a pulled day into line items.

use async_trait::async_trait;
use serde::Serialize;

use hcm_core::{BillItem, PullState, Result, DEFAULT_MAX_PAGE_LIMIT};
use hcm_task::{Action, ExecuteKit};

use crate::params::SplitParams;
use crate::pull::{find_pull_task, transition};

/// Outcome of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitReport {
    /// Line items written.
    pub items: usize,
    /// Whether the day was already split and nothing was written.
    pub skipped: bool,
}

/// Replaces a day's line items and marks its pull task `Splitted`.
///
/// The day's previous items are deleted first, so a repeated run leaves
/// exactly one copy of each item.
pub struct SplitAction;

#[async_trait]
impl Action for SplitAction {
    const NAME: &'static str = "split_bill_items";
    type Params = SplitParams;
    type Output = SplitReport;

    async fn run(&self, kit: &ExecuteKit, params: SplitParams) -> Result<SplitReport> {
        let day = &params.day;
        let store = kit.store();
        let task = find_pull_task(store, &day.key, day.version_id, day.bill_day).await?;

        if matches!(task.state, PullState::Splitted | PullState::Accounted) {
            tracing::debug!(
                rid = %kit.rid(),
                task_id = %task.id,
                state = %task.state,
                "Day already split"
            );
            return Ok(SplitReport {
                items: 0,
                skipped: true,
            });
        }

        kit.ensure_active()?;
        let filter = day.key.day_filter(day.version_id, day.bill_day);
        let replaced = store.bill_items().delete_by_filter(&filter).await?;

        let items: Vec<BillItem> = params
            .items
            .iter()
            .map(|raw| {
                let mut item =
                    BillItem::new(day.key.clone(), day.version_id, day.bill_day, raw.cost);
                item.currency.clone_from(&raw.currency);
                item.hc_product_code.clone_from(&raw.hc_product_code);
                item.extension = raw.extension.clone();
                item
            })
            .collect();

        for chunk in items.chunks(DEFAULT_MAX_PAGE_LIMIT as usize) {
            kit.ensure_active()?;
            store.bill_items().batch_create(chunk.to_vec()).await?;
        }

        transition(store, &task, PullState::Splitted).await?;

        tracing::info!(
            rid = %kit.rid(),
            key = %day.key,
            version_id = day.version_id,
            bill_day = day.bill_day,
            items = items.len(),
            replaced,
            "Bill day split"
        );
        Ok(SplitReport {
            items: items.len(),
            skipped: false,
        })
    }
}
