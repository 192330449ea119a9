//! In-memory storage implementation.
//!
//! Tables keep documents in insertion order behind a `tokio` lock, so every
//! write is atomic with respect to concurrent readers. Write counting and
//! failure injection make the engine usable as a test double.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use hcm_core::{
    BillItem, BillPullTask, BillSummaryDaily, BillSummaryMain, BillSummaryVersion, Entity,
    Expression, ListOption, LocalId, ResourceRecord, ResourceRelation,
};

use crate::document::{apply_patch, check_delete_filter, check_filter, check_page, prepare_insert};
use crate::error::{Result, StoreError};
use crate::{Store, Table};

struct Row {
    id: LocalId,
    unique_key: Option<String>,
    doc: Value,
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    rows: BTreeMap<u64, Row>,
    by_id: HashMap<LocalId, u64>,
    unique: HashSet<String>,
}

impl Inner {
    fn matching(&self, filter: &Expression) -> impl Iterator<Item = (&u64, &Row)> + '_ {
        let filter = filter.clone();
        self.rows
            .iter()
            .filter(move |(_, row)| filter.matches(&row.doc))
    }
}

/// An in-memory table of `E`.
pub struct MemoryTable<E> {
    inner: RwLock<Inner>,
    writes: AtomicU64,
    fail_writes: AtomicUsize,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> MemoryTable<E> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            writes: AtomicU64::new(0),
            fail_writes: AtomicUsize::new(0),
            _marker: PhantomData,
        }
    }

    /// Number of successful write calls (create, update, delete) so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make the next `n` write calls fail with a database error.
    pub fn fail_next_writes(&self, n: usize) {
        self.fail_writes.store(n, Ordering::SeqCst);
    }

    /// Number of stored rows.
    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }

    /// Whether the table is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Seed rows without the natural-key check and without counting a write.
    ///
    /// Lets tests build states the checked path refuses, such as two rows
    /// sharing one natural key.
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn insert_unchecked(&self, records: Vec<E>) -> Result<Vec<LocalId>> {
        let mut inner = self.inner.write().await;
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let (record, doc) = prepare_insert(record)?;
            let id = *record.id();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.by_id.insert(id, seq);
            inner.rows.insert(
                seq,
                Row {
                    id,
                    unique_key: None,
                    doc,
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }

    fn injected_failure(&self) -> Result<()> {
        let armed = self
            .fail_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if armed {
            return Err(StoreError::Database(format!(
                "injected write failure on {}",
                E::TABLE
            )));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl<E: Entity> Default for MemoryTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> Table<E> for MemoryTable<E> {
    async fn list(&self, opt: &ListOption) -> Result<Vec<E>> {
        check_filter::<E>(&opt.filter)?;
        check_page(&opt.page)?;

        let inner = self.inner.read().await;
        inner
            .matching(&opt.filter)
            .skip(opt.page.start as usize)
            .take(opt.page.limit as usize)
            .map(|(_, row)| serde_json::from_value(row.doc.clone()).map_err(StoreError::from))
            .collect()
    }

    async fn count(&self, filter: &Expression) -> Result<u64> {
        check_filter::<E>(filter)?;
        let inner = self.inner.read().await;
        Ok(inner.matching(filter).count() as u64)
    }

    async fn batch_create(&self, records: Vec<E>) -> Result<Vec<LocalId>> {
        self.injected_failure()?;

        let mut prepared = Vec::with_capacity(records.len());
        for record in records {
            prepared.push(prepare_insert(record)?);
        }

        let mut inner = self.inner.write().await;

        let mut batch_keys = HashSet::new();
        for (record, _) in &prepared {
            if let Some(key) = record.unique_key() {
                if inner.unique.contains(&key) || !batch_keys.insert(key.clone()) {
                    return Err(StoreError::Conflict {
                        table: E::TABLE,
                        key,
                    });
                }
            }
        }

        let mut ids = Vec::with_capacity(prepared.len());
        for (record, doc) in prepared {
            let id = *record.id();
            let unique_key = record.unique_key();
            if let Some(key) = &unique_key {
                inner.unique.insert(key.clone());
            }
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.by_id.insert(id, seq);
            inner.rows.insert(
                seq,
                Row {
                    id,
                    unique_key,
                    doc,
                },
            );
            ids.push(id);
        }

        self.record_write();
        tracing::trace!(table = E::TABLE, count = ids.len(), "Rows created");
        Ok(ids)
    }

    async fn update_by_id(&self, id: &LocalId, patch: &E::Patch) -> Result<()> {
        self.injected_failure()?;

        let mut inner = self.inner.write().await;
        let seq = *inner.by_id.get(id).ok_or_else(|| StoreError::NotFound {
            table: E::TABLE,
            id: id.to_string(),
        })?;
        let row = inner.rows.get_mut(&seq).ok_or_else(|| StoreError::NotFound {
            table: E::TABLE,
            id: id.to_string(),
        })?;

        let (_, doc) = apply_patch::<E>(&row.doc, patch)?;
        row.doc = doc;

        self.record_write();
        Ok(())
    }

    async fn delete_by_filter(&self, filter: &Expression) -> Result<u64> {
        check_delete_filter::<E>(filter)?;
        self.injected_failure()?;

        let mut inner = self.inner.write().await;
        let doomed: Vec<u64> = inner.matching(filter).map(|(seq, _)| *seq).collect();
        for seq in &doomed {
            if let Some(row) = inner.rows.remove(seq) {
                inner.by_id.remove(&row.id);
                if let Some(key) = row.unique_key {
                    inner.unique.remove(&key);
                }
            }
        }

        self.record_write();
        tracing::trace!(table = E::TABLE, count = doomed.len(), "Rows deleted");
        Ok(doomed.len() as u64)
    }
}

/// In-memory storage implementation.
#[derive(Default)]
pub struct MemoryStore {
    /// Resource records.
    pub resources: MemoryTable<ResourceRecord>,
    /// Resource relations.
    pub relations: MemoryTable<ResourceRelation>,
    /// Bill pull tasks.
    pub pull_tasks: MemoryTable<BillPullTask>,
    /// Bill line items.
    pub bill_items: MemoryTable<BillItem>,
    /// Daily summaries.
    pub daily_summaries: MemoryTable<BillSummaryDaily>,
    /// Monthly summaries.
    pub main_summaries: MemoryTable<BillSummaryMain>,
    /// Promoted monthly snapshots.
    pub summary_versions: MemoryTable<BillSummaryVersion>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn resources(&self) -> &dyn Table<ResourceRecord> {
        &self.resources
    }

    fn relations(&self) -> &dyn Table<ResourceRelation> {
        &self.relations
    }

    fn pull_tasks(&self) -> &dyn Table<BillPullTask> {
        &self.pull_tasks
    }

    fn bill_items(&self) -> &dyn Table<BillItem> {
        &self.bill_items
    }

    fn daily_summaries(&self) -> &dyn Table<BillSummaryDaily> {
        &self.daily_summaries
    }

    fn main_summaries(&self) -> &dyn Table<BillSummaryMain> {
        &self.main_summaries
    }

    fn summary_versions(&self) -> &dyn Table<BillSummaryVersion> {
        &self.summary_versions
    }
}
