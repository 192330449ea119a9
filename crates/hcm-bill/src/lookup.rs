//! Cardinality-checked reads and paged decimal sums.

use rust_decimal::Decimal;

use hcm_core::{Entity, Expression, HcmError, ListOption, Page, Result};
use hcm_store::Table;
use hcm_task::ExecuteKit;

/// The row matching `filter`, if any. More than one match is an invariant
/// violation, since every filter passed here covers a unique key.
pub(crate) async fn at_most_one<E: Entity>(
    table: &dyn Table<E>,
    filter: &Expression,
    what: &str,
) -> Result<Option<E>> {
    let mut rows = table
        .list(&ListOption::new(filter.clone(), Page::first(2)))
        .await?;
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        _ => Err(HcmError::invariant(format!("more than one {what}"))),
    }
}

/// Running total of a paged aggregation.
#[derive(Debug, Default)]
pub(crate) struct Total {
    pub cost: Decimal,
    pub count: u64,
    pub currency: Option<String>,
}

impl Total {
    pub fn add(&mut self, cost: Decimal, currency: &str) {
        self.cost += cost;
        self.count += 1;
        if self.currency.is_none() && !currency.is_empty() {
            self.currency = Some(currency.to_string());
        }
    }
}

/// Count the rows once, then page through them folding each into a
/// [`Total`].
pub(crate) async fn sum_pages<E: Entity>(
    kit: &ExecuteKit,
    table: &dyn Table<E>,
    filter: &Expression,
    page_size: u32,
    fold: impl Fn(&mut Total, &E),
) -> Result<Total> {
    let expected = table.count(filter).await?;
    let mut total = Total::default();
    let mut page = Page::first(page_size);

    while u64::from(page.start) < expected {
        kit.ensure_active()?;
        let rows = table
            .list(&ListOption::new(filter.clone(), page))
            .await?;
        if rows.is_empty() {
            break;
        }
        for row in &rows {
            fold(&mut total, row);
        }
        page = page.next();
    }

    Ok(total)
}
