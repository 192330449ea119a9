//! The persisted-entity contract.
//!
//! Each table of the Storage Layer stores exactly one [`Entity`] type. The
//! trait carries the metadata an engine needs to store the type generically:
//! the table name, the whitelist of filterable fields, the patch type used by
//! `update_by_id`, and the natural unique key.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};

use crate::ids::LocalId;

/// A type persisted in a Storage Layer table.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Table name.
    const TABLE: &'static str;

    /// Field names that filter expressions may reference.
    const FIELDS: &'static [&'static str];

    /// Partial update applied by `update_by_id`. `None` fields are skipped
    /// when serialized and leave the stored value untouched.
    type Patch: Serialize + Send + Sync;

    /// The local identifier.
    fn id(&self) -> &LocalId;

    /// Overwrite the local identifier. Called once by the engine on create.
    fn assign_id(&mut self, id: LocalId);

    /// The natural key that must be unique within the table, if any.
    fn unique_key(&self) -> Option<String> {
        None
    }

    /// Refresh bookkeeping timestamps. `created` is true on insertion.
    fn touch(&mut self, _now: DateTime<Utc>, _created: bool) {}
}

/// Patch type for append-only entities that are never updated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoPatch {}

impl Serialize for NoPatch {
    fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        match *self {}
    }
}
