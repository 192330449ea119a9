//! Core types and utilities for the hybrid cloud control plane.
//!
//! This crate provides the foundational types shared by every other crate:
//!
//! - **Identifiers**: `LocalId`, `TaskId`
//! - **Errors**: `HcmError`, `ErrorKind` (the retry classification)
//! - **Vendors**: `Vendor`, `ResourceKind`
//! - **Resources**: `ResourceRecord`, `CloudResource`, `Scope`, `ResourceRelation`
//! - **Billing**: `BillPullTask`, `BillItem`, `BillSummaryDaily`, `BillSummaryMain`,
//!   `BillSummaryVersion`
//! - **Queries**: `Expression`, `Rule`, `Page`, `ListOption`
//!
//! # Money
//!
//! Every monetary amount is a `rust_decimal::Decimal`. Costs are summed with
//! exact decimal arithmetic and serialized as strings, so no rounding error is
//! introduced anywhere between the vendor bill and the monthly rollup.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bill;
pub mod entity;
pub mod error;
pub mod filter;
pub mod ids;
pub mod page;
pub mod resource;
pub mod times;
pub mod vendor;

pub use bill::{
    BillItem, BillKey, BillPullTask, BillPullTaskPatch, BillSummaryDaily, BillSummaryDailyPatch,
    BillSummaryMain, BillSummaryMainPatch, BillSummaryVersion, PullState, SummaryState,
    DEFAULT_CURRENCY,
};
pub use entity::{Entity, NoPatch};
pub use error::{ErrorKind, HcmError, Result};
pub use filter::{Expression, LogicOp, Op, Rule};
pub use ids::{IdError, LocalId, TaskId};
pub use page::{ListOption, Page, DEFAULT_MAX_PAGE_LIMIT};
pub use times::last_month;
pub use resource::{
    CloudResource, RelationKind, ResourcePatch, ResourceRecord, ResourceRelation, Scope,
};
pub use vendor::{ResourceKind, Vendor};
