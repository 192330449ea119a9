//! Helpers over the resource relation table.
//!
//! Relations are denormalised links between two local records (a disk or an
//! EIP and the instance it belongs to). They are created and removed by the
//! mutation follow-ups in [`ResourceOps`](crate::ResourceOps).

use hcm_core::{
    Expression, ListOption, LocalId, Page, RelationKind, ResourceRelation, Result, Rule,
    DEFAULT_MAX_PAGE_LIMIT,
};
use hcm_store::Store;

/// Filter selecting every relation that references `id` on either side.
#[must_use]
pub fn involving(id: &LocalId) -> Expression {
    Expression::or(vec![
        Rule::eq("left_id", id.to_string()),
        Rule::eq("right_id", id.to_string()),
    ])
}

/// Create relations in batches of at most the storage page bound.
///
/// # Errors
///
/// Returns a storage error; batches before the failure stay created.
pub async fn create_relations(
    store: &dyn Store,
    relations: Vec<ResourceRelation>,
) -> Result<Vec<LocalId>> {
    let mut ids = Vec::with_capacity(relations.len());
    for chunk in relations.chunks(DEFAULT_MAX_PAGE_LIMIT as usize) {
        ids.extend(store.relations().batch_create(chunk.to_vec()).await?);
    }
    Ok(ids)
}

/// Create the relation unless the pair already exists. Returns whether a row
/// was written.
///
/// # Errors
///
/// Returns a storage error. A concurrent creator surfaces as a retryable
/// storage conflict, after which the pair exists.
pub async fn ensure_relation(
    store: &dyn Store,
    kind: RelationKind,
    left_id: LocalId,
    right_id: LocalId,
) -> Result<bool> {
    let pair = ResourceRelation::pair_filter(kind, &left_id, &right_id);
    if store.relations().count(&pair).await? > 0 {
        return Ok(false);
    }
    create_relations(store, vec![ResourceRelation::new(kind, left_id, right_id)]).await?;
    Ok(true)
}

/// Every relation matching `filter`.
///
/// # Errors
///
/// Returns a storage error.
pub async fn list_relations(
    store: &dyn Store,
    filter: &Expression,
) -> Result<Vec<ResourceRelation>> {
    let mut all = Vec::new();
    let mut page = Page::first(DEFAULT_MAX_PAGE_LIMIT);
    loop {
        let rows = store
            .relations()
            .list(&ListOption::new(filter.clone(), page))
            .await?;
        let fetched = rows.len();
        all.extend(rows);
        if fetched < page.limit as usize {
            return Ok(all);
        }
        page = page.next();
    }
}

/// Delete every relation matching `filter`: list the ids, then delete by id
/// set. Nothing is written when no relation matches.
///
/// # Errors
///
/// Returns a storage error.
pub async fn delete_relations(store: &dyn Store, filter: &Expression) -> Result<u64> {
    let ids: Vec<String> = list_relations(store, filter)
        .await?
        .into_iter()
        .map(|r| r.id.to_string())
        .collect();

    let mut deleted = 0;
    for chunk in ids.chunks(DEFAULT_MAX_PAGE_LIMIT as usize) {
        let by_id = Expression::and(vec![Rule::in_("id", chunk.iter().map(String::as_str))]);
        deleted += store.relations().delete_by_filter(&by_id).await?;
    }
    Ok(deleted)
}
