//! # Customer Repository
//!
//! Database operations for customers.
//!
//! ## Key Operations
//! - Single and batch insert (batch in one transaction)
//! - Update by id or by filter, with only the supplied fields written
//! - Delete by id or by filter
//!
//! ## Uniqueness
//! `phone` and `email` are both UNIQUE. A customer inserted without an
//! email gets `none@none.none`, so only one such customer can exist; the
//! second fails with a UNIQUE constraint violation on `customers.email`.

use mercado_core::validation::validate_batch;
use mercado_core::{Customer, CustomerColumn, CustomerPatch, CustomerRecord, Filter, NewCustomer, Patch, SqlValue};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{count_rows, delete_rows, fetch_by_id, fetch_rows, update_rows};
use crate::error::DbResult;
use crate::runner::Runner;

/// Repository for customer database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.customers();
///
/// let id = repo.insert_one(&NewCustomer::new("Ana", "555-0100")).await?;
/// repo.update_one(id, &CustomerPatch::default().email("ana@example.com")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
    runner: Runner,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository with default timeout and no retries.
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_runner(pool, Runner::default())
    }

    pub(crate) fn with_runner(pool: SqlitePool, runner: Runner) -> Self {
        CustomerRepository { pool, runner }
    }

    /// Inserts one customer and returns its generated id.
    ///
    /// ## Returns
    /// * `Err(DbError::Validation)` - name or phone not supplied
    /// * `Err(DbError::ConstraintViolation)` - phone or email already used
    pub async fn insert_one(&self, customer: &NewCustomer) -> DbResult<i64> {
        let record = customer.validate()?;
        debug!(phone = %record.phone, "Inserting customer");

        let record = &record;
        let id = self
            .runner
            .write("customers.insert_one", || async move {
                let mut conn = self.pool.acquire().await?;
                insert(&mut conn, record).await
            })
            .await?;

        debug!(customer_id = id, "Customer inserted");
        Ok(id)
    }

    /// Inserts every customer or none of them.
    ///
    /// All items are validated first; the first invalid one aborts the
    /// batch with its zero-based position. Returns ids in input order.
    pub async fn insert_many(&self, customers: &[NewCustomer]) -> DbResult<Vec<i64>> {
        let records = validate_batch(customers, NewCustomer::validate)?;
        if records.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = records.len(), "Inserting customer batch");

        let records = &records;
        self.runner
            .write("customers.insert_many", || async move {
                let mut tx = self.pool.begin().await?;
                let mut ids = Vec::with_capacity(records.len());
                for record in records {
                    ids.push(insert(&mut tx, record).await?);
                }
                tx.commit().await?;
                Ok(ids)
            })
            .await
    }

    /// Writes the supplied fields to one customer.
    ///
    /// A missing id is not an error: the result is `Ok(0)`.
    pub async fn update_one(&self, customer_id: i64, patch: &CustomerPatch) -> DbResult<u64> {
        self.update_many(&Filter::by_id(customer_id), patch).await
    }

    /// Writes the supplied fields to every customer matching `filter`.
    ///
    /// An empty filter is rejected rather than updating the whole table.
    pub async fn update_many(&self, filter: &Filter<CustomerColumn>, patch: &CustomerPatch) -> DbResult<u64> {
        let assignments = patch.assignments()?;
        let predicate = filter.require_predicate()?;
        debug!(fields = assignments.len(), "Updating customers");

        self.runner
            .write("customers.update", || update_rows(&self.pool, &assignments, predicate))
            .await
    }

    /// Like [`update_many`](Self::update_many) with a raw predicate such as
    /// `"phone LIKE ?"`.
    pub async fn update_where(&self, predicate: &str, params: Vec<SqlValue>, patch: &CustomerPatch) -> DbResult<u64> {
        let filter = Filter::parse(predicate, params)?;
        self.update_many(&filter, patch).await
    }

    /// Deletes one customer. A missing id deletes nothing and is not an error.
    pub async fn delete_one(&self, customer_id: i64) -> DbResult<u64> {
        self.delete_many(&Filter::by_id(customer_id)).await
    }

    /// Deletes every customer matching `filter`.
    pub async fn delete_many(&self, filter: &Filter<CustomerColumn>) -> DbResult<u64> {
        let predicate = filter.require_predicate()?;
        debug!("Deleting customers");

        self.runner
            .write("customers.delete", || delete_rows(&self.pool, predicate))
            .await
    }

    /// Like [`delete_many`](Self::delete_many) with a raw predicate.
    pub async fn delete_where(&self, predicate: &str, params: Vec<SqlValue>) -> DbResult<u64> {
        let filter = Filter::parse(predicate, params)?;
        self.delete_many(&filter).await
    }

    pub async fn get_by_id(&self, customer_id: i64) -> DbResult<Option<Customer>> {
        self.runner
            .read("customers.get_by_id", || {
                fetch_by_id::<CustomerColumn, Customer>(&self.pool, customer_id)
            })
            .await
    }

    /// Customers matching `filter` by id; an empty filter returns everyone.
    pub async fn find(&self, filter: &Filter<CustomerColumn>) -> DbResult<Vec<Customer>> {
        let predicate = filter.checked_predicate()?;
        self.runner
            .read("customers.find", || fetch_rows(&self.pool, predicate))
            .await
    }

    pub async fn count(&self) -> DbResult<i64> {
        self.runner
            .read("customers.count", || count_rows::<CustomerColumn>(&self.pool))
            .await
    }
}

async fn insert(conn: &mut SqliteConnection, record: &CustomerRecord) -> DbResult<i64> {
    let result = sqlx::query("INSERT INTO customers (name, phone, email) VALUES (?1, ?2, ?3)")
        .bind(record.name.as_str())
        .bind(record.phone.as_str())
        .bind(record.email.as_str())
        .execute(conn)
        .await?;

    Ok(result.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConstraintKind, DbError};
    use crate::pool::{Database, DbConfig};
    use mercado_core::{ValidationError, DEFAULT_EMAIL};

    async fn setup() -> CustomerRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().customers()
    }

    #[tokio::test]
    async fn test_insert_applies_email_default() {
        let repo = setup().await;

        let id = repo.insert_one(&NewCustomer::new("Ana", "555-0100")).await.unwrap();
        let ana = repo.get_by_id(id).await.unwrap().unwrap();

        assert_eq!(ana.name, "Ana");
        assert_eq!(ana.email.as_deref(), Some(DEFAULT_EMAIL));
    }

    #[tokio::test]
    async fn test_missing_phone_is_rejected_before_storage() {
        let repo = setup().await;
        let input = NewCustomer {
            name: Some("Ana".into()),
            ..Default::default()
        };

        let err = repo.insert_one(&input).await.unwrap_err();
        assert_eq!(err.validation(), Some(&ValidationError::Required { field: "phone" }));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_name_is_stored_as_given() {
        let repo = setup().await;

        let id = repo.insert_one(&NewCustomer::new("", "555-0100")).await.unwrap();
        assert_eq!(repo.get_by_id(id).await.unwrap().unwrap().name, "");

        let rows = repo
            .update_one(id, &CustomerPatch::default().phone(""))
            .await
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(repo.get_by_id(id).await.unwrap().unwrap().phone, "");
    }

    #[tokio::test]
    async fn test_duplicate_phone_is_a_constraint_violation() {
        let repo = setup().await;
        repo.insert_one(&NewCustomer::new("Ana", "555-0100").email("ana@example.com"))
            .await
            .unwrap();

        let err = repo
            .insert_one(&NewCustomer::new("Bea", "555-0100").email("bea@example.com"))
            .await
            .unwrap_err();

        match err {
            DbError::ConstraintViolation { kind, constraint } => {
                assert_eq!(kind, ConstraintKind::Unique);
                assert_eq!(constraint, "customers.phone");
            }
            other => panic!("expected constraint violation, got {other:?}"),
        }
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_second_customer_without_email_collides_on_default() {
        let repo = setup().await;
        repo.insert_one(&NewCustomer::new("Ana", "555-0100")).await.unwrap();

        let err = repo.insert_one(&NewCustomer::new("Bea", "555-0101")).await.unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_batch_rejects_invalid_item_with_position() {
        let repo = setup().await;
        let batch = vec![
            NewCustomer::new("Ana", "555-0100").email("ana@example.com"),
            NewCustomer::new("Bea", "555-0101").email("bea@example.com"),
            NewCustomer {
                phone: Some("555-0102".into()),
                ..Default::default()
            },
        ];

        let err = repo.insert_many(&batch).await.unwrap_err();
        assert_eq!(err.validation().and_then(|e| e.batch_index()), Some(2));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_rolls_back_on_storage_failure() {
        let repo = setup().await;
        let batch = vec![
            NewCustomer::new("Ana", "555-0100").email("ana@example.com"),
            NewCustomer::new("Bea", "555-0100").email("bea@example.com"),
        ];

        let err = repo.insert_many(&batch).await.unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_returns_ids_in_order() {
        let repo = setup().await;
        let batch = vec![
            NewCustomer::new("Ana", "555-0100").email("ana@example.com"),
            NewCustomer::new("Bea", "555-0101").email("bea@example.com"),
        ];

        let ids = repo.insert_many(&batch).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(repo.get_by_id(ids[1]).await.unwrap().unwrap().name, "Bea");
        assert!(repo.insert_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_writes_only_supplied_fields() {
        let repo = setup().await;
        let id = repo
            .insert_one(&NewCustomer::new("Ana", "555-0100").email("ana@example.com"))
            .await
            .unwrap();

        let rows = repo
            .update_one(id, &CustomerPatch::default().email("ana@mercado.test"))
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let ana = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(ana.name, "Ana");
        assert_eq!(ana.phone, "555-0100");
        assert_eq!(ana.email.as_deref(), Some("ana@mercado.test"));
    }

    #[tokio::test]
    async fn test_update_missing_id_affects_nothing() {
        let repo = setup().await;
        let rows = repo
            .update_one(42, &CustomerPatch::default().name("Nobody"))
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_empty_patch_is_rejected() {
        let repo = setup().await;
        let id = repo.insert_one(&NewCustomer::new("Ana", "555-0100")).await.unwrap();

        let err = repo.update_one(id, &CustomerPatch::default()).await.unwrap_err();
        assert_eq!(err.validation(), Some(&ValidationError::NothingToUpdate));
    }

    #[tokio::test]
    async fn test_filtered_update_and_delete() {
        let repo = setup().await;
        repo.insert_many(&[
            NewCustomer::new("Ana", "555-0100").email("ana@example.com"),
            NewCustomer::new("Bea", "555-0101").email("bea@example.com"),
            NewCustomer::new("Cai", "777-0100").email("cai@example.com"),
        ])
        .await
        .unwrap();

        let rows = repo
            .update_where("phone LIKE ?", vec!["555-%".into()], &CustomerPatch::default().name("Local"))
            .await
            .unwrap();
        assert_eq!(rows, 2);

        let locals = repo.find(&Filter::eq(CustomerColumn::Name, "Local")).await.unwrap();
        assert_eq!(locals.len(), 2);

        let rows = repo
            .delete_many(&Filter::like(CustomerColumn::Phone, "555-%"))
            .await
            .unwrap();
        assert_eq!(rows, 2);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_filter_never_touches_the_table() {
        let repo = setup().await;
        repo.insert_one(&NewCustomer::new("Ana", "555-0100")).await.unwrap();

        let err = repo.delete_many(&Filter::new()).await.unwrap_err();
        assert_eq!(err.validation(), Some(&ValidationError::EmptyFilter));

        let err = repo.delete_where("  ", vec![]).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_injected_predicate_is_rejected() {
        let repo = setup().await;
        repo.insert_one(&NewCustomer::new("Ana", "555-0100")).await.unwrap();

        let err = repo
            .delete_where("1=1; DROP TABLE customers", vec![])
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = repo
            .delete_where("phone = ? OR 1 = 1", vec!["x".into()])
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_one() {
        let repo = setup().await;
        let id = repo.insert_one(&NewCustomer::new("Ana", "555-0100")).await.unwrap();

        assert_eq!(repo.delete_one(id).await.unwrap(), 1);
        assert_eq!(repo.delete_one(id).await.unwrap(), 0);
        assert!(repo.get_by_id(id).await.unwrap().is_none());
    }
}
