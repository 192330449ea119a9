//! `PostgreSQL` storage implementation.
//!
//! Every entity table has the same shape: an insertion sequence, the local
//! id, the natural unique key, and the entity as a JSONB document. Filter
//! expressions compile to predicates over the document with bound parameters
//! only; the whitelist check runs before any SQL is built.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Row};

use hcm_core::{
    BillItem, BillPullTask, BillSummaryDaily, BillSummaryMain, BillSummaryVersion, Entity,
    Expression, ListOption, LocalId, LogicOp, Op, ResourceRecord, ResourceRelation, Rule,
};

use crate::document::{apply_patch, check_delete_filter, check_filter, check_page, prepare_insert};
use crate::error::{Result, StoreError};
use crate::{Store, Table};

/// `PostgreSQL` error code for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Append `expr` as a parenthesised SQL predicate.
fn push_expression(qb: &mut QueryBuilder<'_, Postgres>, expr: &Expression) {
    if expr.rules.is_empty() {
        qb.push(match expr.op {
            LogicOp::And => "TRUE",
            LogicOp::Or => "FALSE",
        });
        return;
    }

    let joiner = match expr.op {
        LogicOp::And => " AND ",
        LogicOp::Or => " OR ",
    };

    qb.push("(");
    for (i, rule) in expr.rules.iter().enumerate() {
        if i > 0 {
            qb.push(joiner);
        }
        match rule {
            Rule::Atom { field, op, value } => {
                // Missing keys compare as JSON null, matching the in-memory engine.
                qb.push("COALESCE(doc -> ");
                qb.push_bind(field.clone());
                qb.push(", 'null'::jsonb)");
                match op {
                    Op::Eq => {
                        qb.push(" = ");
                        qb.push_bind(Json(value.clone()));
                    }
                    Op::Neq => {
                        qb.push(" <> ");
                        qb.push_bind(Json(value.clone()));
                    }
                    Op::In => {
                        qb.push(" IN (SELECT jsonb_array_elements(");
                        qb.push_bind(Json(value.clone()));
                        qb.push("))");
                    }
                    Op::NotIn => {
                        qb.push(" NOT IN (SELECT jsonb_array_elements(");
                        qb.push_bind(Json(value.clone()));
                        qb.push("))");
                    }
                }
            }
            Rule::Nested(inner) => push_expression(qb, inner),
        }
    }
    qb.push(")");
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(sqlx::error::DatabaseError::code)
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

/// A `PostgreSQL` table of `E`.
pub struct PgTable<E> {
    pool: PgPool,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> PgTable<E> {
    /// Bind a table to a pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<E: Entity> Table<E> for PgTable<E> {
    async fn list(&self, opt: &ListOption) -> Result<Vec<E>> {
        check_filter::<E>(&opt.filter)?;
        check_page(&opt.page)?;

        let mut qb = QueryBuilder::new(format!("SELECT doc FROM {} WHERE ", E::TABLE));
        push_expression(&mut qb, &opt.filter);
        qb.push(" ORDER BY seq LIMIT ");
        qb.push_bind(i64::from(opt.page.limit));
        qb.push(" OFFSET ");
        qb.push_bind(i64::from(opt.page.start));

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<E> {
                let Json(doc): Json<Value> = row.try_get("doc")?;
                Ok(serde_json::from_value(doc)?)
            })
            .collect()
    }

    async fn count(&self, filter: &Expression) -> Result<u64> {
        check_filter::<E>(filter)?;

        let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {} WHERE ", E::TABLE));
        push_expression(&mut qb, filter);

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        u64::try_from(count).map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn batch_create(&self, records: Vec<E>) -> Result<Vec<LocalId>> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(records.len());

        for record in records {
            let (record, doc) = prepare_insert(record)?;
            let key = record.unique_key();
            let result = sqlx::query(&format!(
                "INSERT INTO {} (id, unique_key, doc) VALUES ($1, $2, $3)",
                E::TABLE
            ))
            .bind(*record.id().as_uuid())
            .bind(key.clone())
            .bind(Json(doc))
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => ids.push(*record.id()),
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::Conflict {
                        table: E::TABLE,
                        key: key.unwrap_or_default(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;
        tracing::trace!(table = E::TABLE, count = ids.len(), "Rows created");
        Ok(ids)
    }

    async fn update_by_id(&self, id: &LocalId, patch: &E::Patch) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT doc FROM {} WHERE id = $1 FOR UPDATE",
            E::TABLE
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            table: E::TABLE,
            id: id.to_string(),
        })?;

        let Json(doc): Json<Value> = row.try_get("doc")?;
        let (_, doc) = apply_patch::<E>(&doc, patch)?;

        sqlx::query(&format!(
            "UPDATE {} SET doc = $2, updated_at = now() WHERE id = $1",
            E::TABLE
        ))
        .bind(*id.as_uuid())
        .bind(Json(doc))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_by_filter(&self, filter: &Expression) -> Result<u64> {
        check_delete_filter::<E>(filter)?;

        let mut qb = QueryBuilder::new(format!("DELETE FROM {} WHERE ", E::TABLE));
        push_expression(&mut qb, filter);

        let result = qb.build().execute(&self.pool).await?;
        tracing::trace!(
            table = E::TABLE,
            count = result.rows_affected(),
            "Rows deleted"
        );
        Ok(result.rows_affected())
    }
}

/// PostgreSQL-backed storage implementation.
pub struct PgStore {
    resources: PgTable<ResourceRecord>,
    relations: PgTable<ResourceRelation>,
    pull_tasks: PgTable<BillPullTask>,
    bill_items: PgTable<BillItem>,
    daily_summaries: PgTable<BillSummaryDaily>,
    main_summaries: PgTable<BillSummaryMain>,
    summary_versions: PgTable<BillSummaryVersion>,
}

impl PgStore {
    /// Connect to the database and apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or a migration fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(format!("migration failed: {e}")))?;

        tracing::info!(max_connections, "PostgreSQL store ready");
        Ok(Self::from_pool(pool))
    }

    /// Build the store over an existing pool. Migrations are not run.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            resources: PgTable::new(pool.clone()),
            relations: PgTable::new(pool.clone()),
            pull_tasks: PgTable::new(pool.clone()),
            bill_items: PgTable::new(pool.clone()),
            daily_summaries: PgTable::new(pool.clone()),
            main_summaries: PgTable::new(pool.clone()),
            summary_versions: PgTable::new(pool),
        }
    }
}

impl Store for PgStore {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn sql(expr: &Expression) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT doc FROM t WHERE ");
        push_expression(&mut qb, expr);
        qb.sql().to_string()
    }

    #[test]
    fn empty_and_is_true() {
        assert_eq!(sql(&Expression::all()), "SELECT doc FROM t WHERE TRUE");
        assert_eq!(
            sql(&Expression::or(Vec::new())),
            "SELECT doc FROM t WHERE FALSE"
        );
    }

    #[test]
    fn atoms_use_bound_parameters() {
        let expr = Expression::and(vec![
            Rule::eq("vendor", "aws"),
            Rule::in_("cloud_id", ["a", "b"]),
        ]);
        assert_eq!(
            sql(&expr),
            "SELECT doc FROM t WHERE (COALESCE(doc -> $1, 'null'::jsonb) = $2 AND \
             COALESCE(doc -> $3, 'null'::jsonb) IN (SELECT jsonb_array_elements($4)))"
        );
    }

    #[test]
    fn nested_or_is_parenthesised() {
        let expr = Expression::and(vec![
            Rule::eq("vendor", "aws"),
            Rule::Nested(Expression::or(vec![
                Rule::eq("region", "a"),
                Rule::neq("region", "b"),
            ])),
        ]);
        let sql = sql(&expr);
        assert!(sql.contains(" AND (COALESCE(doc -> $3, 'null'::jsonb) = $4 OR "));
        assert!(sql.ends_with("<> $6))"));
    }
}
