//! Storage layer for the hybrid cloud control plane.
//!
//! This crate provides the system-of-record for resource records, relations
//! and billing rows. Every table exposes the same narrow contract:
//!
//! - `list` with a structured filter and a bounded page window
//! - `count` with a structured filter
//! - `batch_create`, atomic across the batch
//! - `update_by_id` with a typed partial patch
//! - `delete_by_filter`, atomic, and never unscoped
//!
//! Filters are [`hcm_core::Expression`] trees validated against the entity's
//! field whitelist; raw query strings are never accepted.
//!
//! # Backends
//!
//! - [`MemoryStore`]: in-process tables, used by tests and when no database
//!   is configured.
//! - `PgStore` (feature `postgres`, on by default): `PostgreSQL` tables that
//!   keep each entity as a JSONB document.
//!
//! # Example
//!
//! ```no_run
//! use hcm_core::{CloudResource, ListOption, ResourceKind, ResourceRecord, Scope, Vendor};
//! use hcm_store::{MemoryStore, Store};
//!
//! # async fn example() -> hcm_store::Result<()> {
//! let store = MemoryStore::new();
//! let scope = Scope::new(Vendor::Aws, "acc-1", "us-east-1");
//! let vpc = CloudResource::new("vpc-1", "main");
//! let record = ResourceRecord::from_cloud(&scope, ResourceKind::Vpc, &vpc);
//!
//! let ids = store.resources().batch_create(vec![record]).await?;
//!
//! let opt = ListOption {
//!     filter: scope.filter(ResourceKind::Vpc),
//!     ..ListOption::default()
//! };
//! let found = store.resources().list(&opt).await?;
//! assert_eq!(found[0].id, ids[0]);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod document;
pub mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use error::{Result, StoreError};
pub use memory::{MemoryStore, MemoryTable};
#[cfg(feature = "postgres")]
pub use postgres::{PgStore, PgTable};

use async_trait::async_trait;

use hcm_core::{
    BillItem, BillPullTask, BillSummaryDaily, BillSummaryMain, BillSummaryVersion, Entity,
    Expression, ListOption, LocalId, ResourceRecord, ResourceRelation,
};

/// One table of entities of type `E`.
#[async_trait]
pub trait Table<E: Entity>: Send + Sync {
    /// List entities matching the filter within the page window, in
    /// insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidFilter` for a non-whitelisted field or an
    /// out-of-range page, or a database error.
    async fn list(&self, opt: &ListOption) -> Result<Vec<E>>;

    /// Count entities matching the filter.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidFilter` for a non-whitelisted field, or a
    /// database error.
    async fn count(&self, filter: &Expression) -> Result<u64>;

    /// Insert entities in one transaction and return their new ids, in input
    /// order. Ids carried by the inputs are ignored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if any natural key already exists (and
    /// nothing is written), or a database error.
    async fn batch_create(&self, records: Vec<E>) -> Result<Vec<LocalId>>;

    /// Apply a partial patch to one entity.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no entity has the id, or a database
    /// error.
    async fn update_by_id(&self, id: &LocalId, patch: &E::Patch) -> Result<()>;

    /// Delete every entity matching the filter in one transaction and return
    /// the number removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidFilter` for an empty filter or a
    /// non-whitelisted field, or a database error.
    async fn delete_by_filter(&self, filter: &Expression) -> Result<u64>;
}

/// The storage trait grouping every table the control plane uses.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (`PostgreSQL`, in-memory for testing).
pub trait Store: Send + Sync {
    /// Resource records.
    fn resources(&self) -> &dyn Table<ResourceRecord>;

    /// Disk/EIP to CVM relations.
    fn relations(&self) -> &dyn Table<ResourceRelation>;

    /// Bill pull tasks.
    fn pull_tasks(&self) -> &dyn Table<BillPullTask>;

    /// Raw bill line items.
    fn bill_items(&self) -> &dyn Table<BillItem>;

    /// Daily bill summaries.
    fn daily_summaries(&self) -> &dyn Table<BillSummaryDaily>;

    /// Monthly bill summaries.
    fn main_summaries(&self) -> &dyn Table<BillSummaryMain>;

    /// Promoted monthly snapshots.
    fn summary_versions(&self) -> &dyn Table<BillSummaryVersion>;
}
