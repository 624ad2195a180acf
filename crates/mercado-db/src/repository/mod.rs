//! # Repository Module
//!
//! Repository implementations for the Mercado store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Caller                                                                │
//! │       │                                                                 │
//! │       │  db.products().update_many(&filter, &patch)                    │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── validate input            (mercado-core, no connection yet)       │
//! │  ├── build SQL                 (QueryBuilder, columns from enums)      │
//! │  └── run with timeout/retry    (Runner)                                │
//! │       │                                                                 │
//! │       │  UPDATE products SET price = ? WHERE (price < ? AND ...)       │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CustomerRepository`](customer::CustomerRepository) - Customer writes and reads
//! - [`ProductRepository`](product::ProductRepository) - Product writes and reads
//! - [`TransactionRepository`](transaction::TransactionRepository) - Sale records
//!
//! The helpers below are shared by all three. Identifiers in generated SQL
//! come from [`Column`] only; every value goes through `push_bind`.

pub mod customer;
pub mod product;
pub mod transaction;

use mercado_core::{Assignment, Column, Predicate, SqlValue, SqlWriter};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::error::DbResult;

// =============================================================================
// QueryBuilder Bridge
// =============================================================================

/// Lets core predicates render straight into a `QueryBuilder`.
struct BoundSql<'q, 'args>(&'q mut QueryBuilder<'args, Sqlite>);

impl SqlWriter for BoundSql<'_, '_> {
    fn push_sql(&mut self, sql: &str) {
        self.0.push(sql);
    }

    fn push_value(&mut self, value: &SqlValue) {
        bind(self.0, value);
    }
}

/// Appends a placeholder for `value`.
fn bind(qb: &mut QueryBuilder<'_, Sqlite>, value: &SqlValue) {
    match value {
        SqlValue::Integer(v) => qb.push_bind(*v),
        SqlValue::Real(v) => qb.push_bind(*v),
        SqlValue::Text(v) => qb.push_bind(v.clone()),
        SqlValue::Null => qb.push_bind(None::<String>),
    };
}

fn push_where<C: Column>(qb: &mut QueryBuilder<'_, Sqlite>, predicate: &Predicate<C>) {
    qb.push(" WHERE ");
    predicate.render(&mut BoundSql(qb));
}

fn select_all<C: Column>() -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new("SELECT ");
    for (i, column) in C::ALL.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(column.name());
    }
    qb.push(" FROM ");
    qb.push(C::TABLE);
    qb
}

// =============================================================================
// Shared Statements
// =============================================================================

/// `UPDATE <table> SET a = ?, b = ? WHERE <predicate>`; returns rows affected.
async fn update_rows<C: Column>(
    pool: &SqlitePool,
    assignments: &[Assignment<C>],
    predicate: &Predicate<C>,
) -> DbResult<u64> {
    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE ");
    qb.push(C::TABLE);
    qb.push(" SET ");
    for (i, assignment) in assignments.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(assignment.column.name());
        qb.push(" = ");
        bind(&mut qb, &assignment.value);
    }
    push_where(&mut qb, predicate);

    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected())
}

/// `DELETE FROM <table> WHERE <predicate>`; returns rows affected.
async fn delete_rows<C: Column>(pool: &SqlitePool, predicate: &Predicate<C>) -> DbResult<u64> {
    let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM ");
    qb.push(C::TABLE);
    push_where(&mut qb, predicate);

    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected())
}

/// Every row matching `predicate` (all rows for `None`), by primary key.
async fn fetch_rows<C, R>(pool: &SqlitePool, predicate: Option<&Predicate<C>>) -> DbResult<Vec<R>>
where
    C: Column,
    R: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let mut qb = select_all::<C>();
    if let Some(predicate) = predicate {
        push_where(&mut qb, predicate);
    }
    qb.push(" ORDER BY ");
    qb.push(C::primary_key().name());

    let rows = qb.build_query_as::<R>().fetch_all(pool).await?;
    Ok(rows)
}

async fn fetch_by_id<C, R>(pool: &SqlitePool, id: i64) -> DbResult<Option<R>>
where
    C: Column,
    R: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let mut qb = select_all::<C>();
    qb.push(" WHERE ");
    qb.push(C::primary_key().name());
    qb.push(" = ");
    qb.push_bind(id);

    let row = qb.build_query_as::<R>().fetch_optional(pool).await?;
    Ok(row)
}

async fn count_rows<C: Column>(pool: &SqlitePool) -> DbResult<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ");
    qb.push(C::TABLE);

    let count = qb.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(count)
}
