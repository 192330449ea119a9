//! JSON document helpers shared by the storage engines.
//!
//! Both engines store an entity as its serde JSON document. Filters are
//! evaluated against that document and patches are merged into it
//! field-by-field.

use chrono::Utc;
use serde_json::Value;

use hcm_core::{Entity, Expression, Page};

use crate::error::{Result, StoreError};

/// Check a filter against the entity's field whitelist.
pub(crate) fn check_filter<E: Entity>(filter: &Expression) -> Result<()> {
    filter.validate(E::FIELDS)?;
    Ok(())
}

/// Check a page window.
pub(crate) fn check_page(page: &Page) -> Result<()> {
    page.validate()?;
    Ok(())
}

/// Deletes must always be scoped.
pub(crate) fn check_delete_filter<E: Entity>(filter: &Expression) -> Result<()> {
    if filter.is_empty() {
        return Err(StoreError::InvalidFilter(format!(
            "delete from {} requires a filter",
            E::TABLE
        )));
    }
    check_filter::<E>(filter)
}

/// Prepare a new record for insertion: assign its id, stamp it and render the
/// stored document.
pub(crate) fn prepare_insert<E: Entity>(mut record: E) -> Result<(E, Value)> {
    record.assign_id(hcm_core::LocalId::generate());
    record.touch(Utc::now(), true);
    let doc = serde_json::to_value(&record)?;
    Ok((record, doc))
}

/// Merge a patch into a stored document and return the updated entity and
/// document.
pub(crate) fn apply_patch<E: Entity>(doc: &Value, patch: &E::Patch) -> Result<(E, Value)> {
    let mut merged = doc.clone();
    if let (Value::Object(target), Value::Object(fields)) =
        (&mut merged, serde_json::to_value(patch)?)
    {
        for (name, value) in fields {
            target.insert(name, value);
        }
    }
    let mut record: E = serde_json::from_value(merged)?;
    record.touch(Utc::now(), false);
    let doc = serde_json::to_value(&record)?;
    Ok((record, doc))
}
