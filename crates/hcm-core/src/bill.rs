//! Billing pipeline entities.
//!
//! Every billing row is scoped by a [`BillKey`]: the accounts, product and
//! business that own the spend, the vendor, and the bill month. Pull tasks,
//! line items and daily summaries add a bill version and a day; monthly
//! summaries carry versions as data instead.
//!
//! # Pull task lifecycle
//!
//! ```text
//! Pulling -> Pulled -> Splitted -> Accounted
//!    \______________/^     ^          |
//!                          \__________/  (explicit retrigger)
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::entity::{Entity, NoPatch};
use crate::error::{HcmError, Result};
use crate::filter::{Expression, Rule};
use crate::ids::LocalId;
use crate::vendor::Vendor;

/// Currency assumed when no line item names one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Ownership and month of a set of billing rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct BillKey {
    /// Root (payer) account.
    pub root_account_id: String,
    /// Main (member) account.
    pub main_account_id: String,
    /// Operation product the spend is attributed to.
    pub product_id: i64,
    /// Business the spend is attributed to.
    pub bk_biz_id: i64,
    /// Cloud vendor.
    pub vendor: Vendor,
    /// Bill year.
    pub bill_year: u32,
    /// Bill month, `1..=12`.
    pub bill_month: u32,
}

impl BillKey {
    /// Check the key is complete.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if an account id is empty or the month is
    /// out of range.
    pub fn validate(&self) -> Result<()> {
        if self.root_account_id.trim().is_empty() {
            return Err(HcmError::invalid_parameter("root_account_id is required"));
        }
        if self.main_account_id.trim().is_empty() {
            return Err(HcmError::invalid_parameter("main_account_id is required"));
        }
        if self.bill_year == 0 {
            return Err(HcmError::invalid_parameter("bill_year is required"));
        }
        if !(1..=12).contains(&self.bill_month) {
            return Err(HcmError::invalid_parameter(format!(
                "bill_month must be in 1..=12, got {}",
                self.bill_month
            )));
        }
        Ok(())
    }

    /// Equality rules over every key field.
    #[must_use]
    pub fn rules(&self) -> Vec<Rule> {
        vec![
            Rule::eq("root_account_id", self.root_account_id.as_str()),
            Rule::eq("main_account_id", self.main_account_id.as_str()),
            Rule::eq("product_id", self.product_id),
            Rule::eq("bk_biz_id", self.bk_biz_id),
            Rule::eq("vendor", self.vendor.as_str()),
            Rule::eq("bill_year", self.bill_year),
            Rule::eq("bill_month", self.bill_month),
        ]
    }

    /// Filter over the key plus a bill version and, when non-zero, a day.
    #[must_use]
    pub fn day_filter(&self, version_id: u32, bill_day: u32) -> Expression {
        let mut rules = self.rules();
        rules.push(Rule::eq("version_id", version_id));
        if bill_day != 0 {
            rules.push(Rule::eq("bill_day", bill_day));
        }
        Expression::and(rules)
    }

    /// The same ownership for another month.
    #[must_use]
    pub fn with_month(&self, bill_year: u32, bill_month: u32) -> Self {
        Self {
            bill_year,
            bill_month,
            ..self.clone()
        }
    }
}

impl fmt::Display for BillKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}/{:04}-{:02}",
            self.root_account_id,
            self.main_account_id,
            self.product_id,
            self.bk_biz_id,
            self.vendor,
            self.bill_year,
            self.bill_month
        )
    }
}

/// Lifecycle state of a [`BillPullTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PullState {
    /// Raw bill data is being pulled from the vendor.
    Pulling,
    /// Raw data pulled, not yet split into line items.
    Pulled,
    /// Line items written; ready for daily aggregation.
    Splitted,
    /// Daily summary written.
    Accounted,
}

impl PullState {
    /// Whether the pipeline may move from `self` to `next`.
    ///
    /// `Accounted -> Splitted` is allowed only as an explicit retrigger.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pulling, Self::Pulled | Self::Splitted)
                | (Self::Pulled | Self::Accounted, Self::Splitted)
                | (Self::Splitted, Self::Accounted)
        )
    }

    /// Stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pulling => "pulling",
            Self::Pulled => "pulled",
            Self::Splitted => "splitted",
            Self::Accounted => "accounted",
        }
    }
}

impl fmt::Display for PullState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the pull of one day of raw bills for one key and version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillPullTask {
    /// Local identifier.
    pub id: LocalId,
    /// Ownership and month.
    #[serde(flatten)]
    pub key: BillKey,
    /// Bill version.
    pub version_id: u32,
    /// Bill day.
    pub bill_day: u32,
    /// Lifecycle state.
    pub state: PullState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl BillPullTask {
    /// A new task in `state`. The id is assigned by the Storage Layer.
    #[must_use]
    pub fn new(key: BillKey, version_id: u32, bill_day: u32, state: PullState) -> Self {
        let now = Utc::now();
        Self {
            id: LocalId::generate(),
            key,
            version_id,
            bill_day,
            state,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Filterable fields of the pull task table.
const PULL_TASK_FIELDS: &[&str] = &[
    "id",
    "root_account_id",
    "main_account_id",
    "product_id",
    "bk_biz_id",
    "vendor",
    "bill_year",
    "bill_month",
    "version_id",
    "bill_day",
    "state",
];

impl Entity for BillPullTask {
    const TABLE: &'static str = "bill_pull_tasks";
    const FIELDS: &'static [&'static str] = PULL_TASK_FIELDS;
    type Patch = BillPullTaskPatch;

    fn id(&self) -> &LocalId {
        &self.id
    }

    fn assign_id(&mut self, id: LocalId) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<String> {
        Some(format!("{}/v{}/{}", self.key, self.version_id, self.bill_day))
    }

    fn touch(&mut self, now: DateTime<Utc>, created: bool) {
        if created {
            self.created_at = now;
        }
        self.updated_at = now;
    }
}

/// State change of a [`BillPullTask`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillPullTaskPatch {
    /// New state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PullState>,
}

/// A raw vendor bill line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillItem {
    /// Local identifier.
    pub id: LocalId,
    /// Ownership and month.
    #[serde(flatten)]
    pub key: BillKey,
    /// Bill version.
    pub version_id: u32,
    /// Bill day.
    pub bill_day: u32,
    /// Cost in `currency`. Exact.
    pub cost: Decimal,
    /// ISO currency code; may be empty.
    #[serde(default)]
    pub currency: String,
    /// Internal product code.
    #[serde(default)]
    pub hc_product_code: String,
    /// Vendor-specific raw fields.
    #[serde(default)]
    pub extension: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl BillItem {
    /// A line item with no currency, product code or extension. The id is
    /// assigned by the Storage Layer.
    #[must_use]
    pub fn new(key: BillKey, version_id: u32, bill_day: u32, cost: Decimal) -> Self {
        Self {
            id: LocalId::generate(),
            key,
            version_id,
            bill_day,
            cost,
            currency: String::new(),
            hc_product_code: String::new(),
            extension: Value::Null,
            created_at: Utc::now(),
        }
    }
}

impl Entity for BillItem {
    const TABLE: &'static str = "bill_items";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "root_account_id",
        "main_account_id",
        "product_id",
        "bk_biz_id",
        "vendor",
        "bill_year",
        "bill_month",
        "version_id",
        "bill_day",
        "currency",
        "hc_product_code",
    ];
    type Patch = NoPatch;

    fn id(&self) -> &LocalId {
        &self.id
    }

    fn assign_id(&mut self, id: LocalId) {
        self.id = id;
    }

    fn touch(&mut self, now: DateTime<Utc>, created: bool) {
        if created {
            self.created_at = now;
        }
    }
}

/// Aggregated cost of one day for one key and version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillSummaryDaily {
    /// Local identifier.
    pub id: LocalId,
    /// Ownership and month.
    #[serde(flatten)]
    pub key: BillKey,
    /// Bill version.
    pub version_id: u32,
    /// Bill day.
    pub bill_day: u32,
    /// Sum of line item costs.
    pub cost: Decimal,
    /// Number of line items summed.
    pub count: u64,
    /// Currency of `cost`.
    pub currency: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl BillSummaryDaily {
    /// A summary row for one day. The id is assigned by the Storage Layer.
    #[must_use]
    pub fn new(
        key: BillKey,
        version_id: u32,
        bill_day: u32,
        cost: Decimal,
        count: u64,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: LocalId::generate(),
            key,
            version_id,
            bill_day,
            cost,
            count,
            currency: currency.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for BillSummaryDaily {
    const TABLE: &'static str = "bill_summary_daily";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "root_account_id",
        "main_account_id",
        "product_id",
        "bk_biz_id",
        "vendor",
        "bill_year",
        "bill_month",
        "version_id",
        "bill_day",
    ];
    type Patch = BillSummaryDailyPatch;

    fn id(&self) -> &LocalId {
        &self.id
    }

    fn assign_id(&mut self, id: LocalId) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<String> {
        Some(format!("{}/v{}/{}", self.key, self.version_id, self.bill_day))
    }

    fn touch(&mut self, now: DateTime<Utc>, created: bool) {
        if created {
            self.created_at = now;
        }
        self.updated_at = now;
    }
}

/// In-place update of a [`BillSummaryDaily`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillSummaryDailyPatch {
    /// New cost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<Decimal>,
    /// New item count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// New currency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Accounting state of a monthly summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SummaryState {
    /// Daily figures are still arriving.
    Accounting,
    /// The current version has been rolled up.
    Accounted,
    /// The current version has been promoted to the synced figures.
    Synced,
}

/// Monthly rollup of one key across versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillSummaryMain {
    /// Local identifier.
    pub id: LocalId,
    /// Ownership and month.
    #[serde(flatten)]
    pub key: BillKey,
    /// Version of the `current_month_*` figures.
    pub current_version: u32,
    /// Version last promoted to the `*_synced` figures.
    pub last_synced_version: u32,
    /// Cost of the current version.
    pub current_month_cost: Decimal,
    /// `current_month_cost` converted at `rate`.
    pub current_month_rmb_cost: Decimal,
    /// Cost as of the last promotion.
    pub current_month_cost_synced: Decimal,
    /// RMB cost as of the last promotion.
    pub current_month_rmb_cost_synced: Decimal,
    /// Previous month's synced cost, captured at promotion.
    pub last_month_cost_synced: Decimal,
    /// Previous month's synced RMB cost, captured at promotion.
    pub last_month_rmb_cost_synced: Decimal,
    /// Manual adjustment.
    pub adjustment_cost: Decimal,
    /// Manual adjustment in RMB.
    pub adjustment_rmb_cost: Decimal,
    /// Currency of the non-RMB figures.
    pub currency: String,
    /// Conversion rate to RMB.
    pub rate: Decimal,
    /// Accounting state.
    pub state: SummaryState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl BillSummaryMain {
    /// An empty summary at version zero.
    #[must_use]
    pub fn new(key: BillKey) -> Self {
        let now = Utc::now();
        Self {
            id: LocalId::generate(),
            key,
            current_version: 0,
            last_synced_version: 0,
            current_month_cost: Decimal::ZERO,
            current_month_rmb_cost: Decimal::ZERO,
            current_month_cost_synced: Decimal::ZERO,
            current_month_rmb_cost_synced: Decimal::ZERO,
            last_month_cost_synced: Decimal::ZERO,
            last_month_rmb_cost_synced: Decimal::ZERO,
            adjustment_cost: Decimal::ZERO,
            adjustment_rmb_cost: Decimal::ZERO,
            currency: DEFAULT_CURRENCY.to_string(),
            rate: Decimal::ONE,
            state: SummaryState::Accounting,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for BillSummaryMain {
    const TABLE: &'static str = "bill_summary_main";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "root_account_id",
        "main_account_id",
        "product_id",
        "bk_biz_id",
        "vendor",
        "bill_year",
        "bill_month",
        "state",
    ];
    type Patch = BillSummaryMainPatch;

    fn id(&self) -> &LocalId {
        &self.id
    }

    fn assign_id(&mut self, id: LocalId) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.key.to_string())
    }

    fn touch(&mut self, now: DateTime<Utc>, created: bool) {
        if created {
            self.created_at = now;
        }
        self.updated_at = now;
    }
}

/// In-place update of a [`BillSummaryMain`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct BillSummaryMainPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_month_cost: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_month_rmb_cost: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_month_cost_synced: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_month_rmb_cost_synced: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_month_cost_synced: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_month_rmb_cost_synced: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SummaryState>,
}

/// Immutable snapshot of a promoted monthly figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillSummaryVersion {
    /// Local identifier.
    pub id: LocalId,
    /// Ownership and month.
    #[serde(flatten)]
    pub key: BillKey,
    /// The promoted version.
    pub version_id: u32,
    /// Monthly cost.
    pub cost: Decimal,
    /// Monthly cost in RMB.
    pub rmb_cost: Decimal,
    /// Currency of `cost`.
    pub currency: String,
    /// Conversion rate used for `rmb_cost`.
    pub rate: Decimal,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl BillSummaryVersion {
    /// Snapshot the current figures of a monthly summary.
    #[must_use]
    pub fn snapshot(main: &BillSummaryMain) -> Self {
        Self {
            id: LocalId::generate(),
            key: main.key.clone(),
            version_id: main.current_version,
            cost: main.current_month_cost,
            rmb_cost: main.current_month_rmb_cost,
            currency: main.currency.clone(),
            rate: main.rate,
            created_at: Utc::now(),
        }
    }

    /// Filter selecting the snapshot of `version_id` for `key`.
    #[must_use]
    pub fn version_filter(key: &BillKey, version_id: u32) -> Expression {
        let mut rules = key.rules();
        rules.push(Rule::eq("version_id", version_id));
        Expression::and(rules)
    }
}

impl Entity for BillSummaryVersion {
    const TABLE: &'static str = "bill_summary_versions";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "root_account_id",
        "main_account_id",
        "product_id",
        "bk_biz_id",
        "vendor",
        "bill_year",
        "bill_month",
        "version_id",
    ];
    type Patch = NoPatch;

    fn id(&self) -> &LocalId {
        &self.id
    }

    fn assign_id(&mut self, id: LocalId) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<String> {
        Some(format!("{}/v{}", self.key, self.version_id))
    }

    fn touch(&mut self, now: DateTime<Utc>, created: bool) {
        if created {
            self.created_at = now;
        }
    }
}
