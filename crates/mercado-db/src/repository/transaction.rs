//! # Transaction Repository
//!
//! Database operations for sale records (a seller, a buyer, a product).
//!
//! "Transaction" here is the business record stored in the `transactions`
//! table, not a database transaction.
//!
//! ## References
//! ```text
//! transactions.seller_id  ──► customers.customer_id
//! transactions.buyer_id   ──► customers.customer_id
//! transactions.product_id ──► products.product_id
//! ```
//! Foreign keys are enforced on every connection, so a record pointing at
//! a missing customer or product fails with a FOREIGN KEY constraint
//! violation.

use mercado_core::validation::validate_batch;
use mercado_core::{Filter, NewTransaction, Patch, SqlValue, Transaction, TransactionColumn, TransactionPatch, TransactionRecord};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{count_rows, delete_rows, fetch_by_id, fetch_rows, update_rows};
use crate::error::DbResult;
use crate::runner::Runner;

/// Repository for sale records.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
    runner: Runner,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository with default timeout and no retries.
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_runner(pool, Runner::default())
    }

    pub(crate) fn with_runner(pool: SqlitePool, runner: Runner) -> Self {
        TransactionRepository { pool, runner }
    }

    /// Records one sale and returns its generated id.
    pub async fn insert_one(&self, transaction: &NewTransaction) -> DbResult<i64> {
        let record = transaction.validate()?;
        debug!(
            seller_id = record.seller_id,
            buyer_id = record.buyer_id,
            product_id = record.product_id,
            "Inserting transaction"
        );

        let record = &record;
        let id = self
            .runner
            .write("transactions.insert_one", || async move {
                let mut conn = self.pool.acquire().await?;
                insert(&mut conn, record).await
            })
            .await?;

        debug!(transaction_id = id, "Transaction inserted");
        Ok(id)
    }

    /// Records every sale or none of them.
    pub async fn insert_many(&self, transactions: &[NewTransaction]) -> DbResult<Vec<i64>> {
        let records = validate_batch(transactions, NewTransaction::validate)?;
        if records.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = records.len(), "Inserting transaction batch");

        let records = &records;
        self.runner
            .write("transactions.insert_many", || async move {
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

    pub async fn update_one(&self, transaction_id: i64, patch: &TransactionPatch) -> DbResult<u64> {
        self.update_many(&Filter::by_id(transaction_id), patch).await
    }

    /// Writes the supplied fields to every record matching `filter`.
    pub async fn update_many(&self, filter: &Filter<TransactionColumn>, patch: &TransactionPatch) -> DbResult<u64> {
        let assignments = patch.assignments()?;
        let predicate = filter.require_predicate()?;
        debug!(fields = assignments.len(), "Updating transactions");

        self.runner
            .write("transactions.update", || update_rows(&self.pool, &assignments, predicate))
            .await
    }

    pub async fn update_where(&self, predicate: &str, params: Vec<SqlValue>, patch: &TransactionPatch) -> DbResult<u64> {
        let filter = Filter::parse(predicate, params)?;
        self.update_many(&filter, patch).await
    }

    pub async fn delete_one(&self, transaction_id: i64) -> DbResult<u64> {
        self.delete_many(&Filter::by_id(transaction_id)).await
    }

    pub async fn delete_many(&self, filter: &Filter<TransactionColumn>) -> DbResult<u64> {
        let predicate = filter.require_predicate()?;
        debug!("Deleting transactions");

        self.runner
            .write("transactions.delete", || delete_rows(&self.pool, predicate))
            .await
    }

    pub async fn delete_where(&self, predicate: &str, params: Vec<SqlValue>) -> DbResult<u64> {
        let filter = Filter::parse(predicate, params)?;
        self.delete_many(&filter).await
    }

    pub async fn get_by_id(&self, transaction_id: i64) -> DbResult<Option<Transaction>> {
        self.runner
            .read("transactions.get_by_id", || {
                fetch_by_id::<TransactionColumn, Transaction>(&self.pool, transaction_id)
            })
            .await
    }

    pub async fn find(&self, filter: &Filter<TransactionColumn>) -> DbResult<Vec<Transaction>> {
        let predicate = filter.checked_predicate()?;
        self.runner
            .read("transactions.find", || fetch_rows(&self.pool, predicate))
            .await
    }

    pub async fn count(&self) -> DbResult<i64> {
        self.runner
            .read("transactions.count", || count_rows::<TransactionColumn>(&self.pool))
            .await
    }
}

async fn insert(conn: &mut SqliteConnection, record: &TransactionRecord) -> DbResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO transactions (
            seller_id, buyer_id, product_id, quantity, total_price
        ) VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(record.seller_id)
    .bind(record.buyer_id)
    .bind(record.product_id)
    .bind(record.quantity)
    .bind(record.total_price)
    .execute(conn)
    .await?;

    Ok(result.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConstraintKind, DbError};
    use crate::pool::{Database, DbConfig};
    use mercado_core::{CustomerColumn, NewCustomer, NewProduct, ValidationError};

    /// Two customers and one product.
    async fn setup() -> (Database, i64, i64, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ids = db
            .customers()
            .insert_many(&[
                NewCustomer::new("Ana", "555-0100").email("ana@example.com"),
                NewCustomer::new("Bea", "555-0101").email("bea@example.com"),
            ])
            .await
            .unwrap();
        let lamp = db
            .products()
            .insert_one(&NewProduct::new("Lamp", 9.99, 41.38, 2.17))
            .await
            .unwrap();
        (db, ids[0], ids[1], lamp)
    }

    #[tokio::test]
    async fn test_store_walkthrough() {
        let (db, ana, bea, lamp) = setup().await;

        let sale = db
            .transactions()
            .insert_one(&NewTransaction::new(ana, bea, lamp, 2, 19.98))
            .await
            .unwrap();

        let stored = db.transactions().get_by_id(sale).await.unwrap().unwrap();
        assert_eq!(stored.seller_id, ana);
        assert_eq!(stored.buyer_id, bea);
        assert_eq!(stored.quantity, 2);
        assert_eq!(stored.total_price, 19.98);

        let rows = db
            .transactions()
            .update_one(sale, &TransactionPatch::default().quantity(3).total_price(29.97))
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let stored = db.transactions().get_by_id(sale).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 3);
        assert_eq!(stored.product_id, lamp);

        assert_eq!(db.transactions().delete_one(sale).await.unwrap(), 1);
        assert_eq!(db.transactions().count().await.unwrap(), 0);

        // With no sale left the buyer can go.
        let rows = db
            .customers()
            .delete_many(&Filter::eq(CustomerColumn::Name, "Bea"))
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_unknown_reference_is_a_foreign_key_violation() {
        let (db, ana, bea, _) = setup().await;

        let err = db
            .transactions()
            .insert_one(&NewTransaction::new(ana, bea, 999, 1, 9.99))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::ConstraintViolation {
                kind: ConstraintKind::ForeignKey,
                ..
            }
        ));
        assert_eq!(db.transactions().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_referenced_customer_cannot_be_deleted() {
        let (db, ana, bea, lamp) = setup().await;
        db.transactions()
            .insert_one(&NewTransaction::new(ana, bea, lamp, 1, 9.99))
            .await
            .unwrap();

        let err = db.customers().delete_one(ana).await.unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(db.customers().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_batch_rolls_back_on_bad_reference() {
        let (db, ana, bea, lamp) = setup().await;
        let batch = vec![
            NewTransaction::new(ana, bea, lamp, 1, 9.99),
            NewTransaction::new(bea, ana, lamp, 1, 9.99),
            NewTransaction::new(ana, 999, lamp, 1, 9.99),
        ];

        let err = db.transactions().insert_many(&batch).await.unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(db.transactions().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_quantity_reports_position() {
        let (db, ana, bea, lamp) = setup().await;
        let batch = vec![
            NewTransaction::new(ana, bea, lamp, 1, 9.99),
            NewTransaction {
                seller_id: Some(ana),
                buyer_id: Some(bea),
                product_id: Some(lamp),
                total_price: Some(9.99),
                ..Default::default()
            },
        ];

        let err = db.transactions().insert_many(&batch).await.unwrap_err();
        assert_eq!(
            err.validation(),
            Some(&ValidationError::Required { field: "quantity" }.in_batch(1))
        );
        assert_eq!(db.transactions().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_by_seller() {
        let (db, ana, bea, lamp) = setup().await;
        db.transactions()
            .insert_many(&[
                NewTransaction::new(ana, bea, lamp, 1, 9.99),
                NewTransaction::new(bea, ana, lamp, 2, 19.98),
                NewTransaction::new(ana, bea, lamp, 3, 29.97),
            ])
            .await
            .unwrap();

        let sales = db
            .transactions()
            .find(&Filter::eq(TransactionColumn::SellerId, ana))
            .await
            .unwrap();
        assert_eq!(sales.iter().map(|t| t.quantity).collect::<Vec<_>>(), vec![1, 3]);

        let rows = db
            .transactions()
            .delete_where("seller_id = ? AND quantity > ?", vec![ana.into(), 1_i64.into()])
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }
}
