//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Defaults
//! ```text
//! NewProduct::new("Lamp", 9.99, 41.38, 2.17)
//!       │
//!       ▼
//! stock_quantity = 1      (not supplied)
//! description    = NULL   (not supplied)
//! created_at     = CURRENT_TIMESTAMP (set by SQLite)
//! ```

use mercado_core::validation::validate_batch;
use mercado_core::{Filter, NewProduct, Patch, Product, ProductColumn, ProductPatch, ProductRecord, SqlValue};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{count_rows, delete_rows, fetch_by_id, fetch_rows, update_rows};
use crate::error::DbResult;
use crate::runner::Runner;

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let id = repo.insert_one(&NewProduct::new("Lamp", 9.99, 41.38, 2.17)).await?;
///
/// // Restock everything that ran out
/// repo.update_where("stock_quantity <= ?", vec![0.into()], &ProductPatch::default().stock_quantity(10))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    runner: Runner,
}

impl ProductRepository {
    /// Creates a new ProductRepository with default timeout and no retries.
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_runner(pool, Runner::default())
    }

    pub(crate) fn with_runner(pool: SqlitePool, runner: Runner) -> Self {
        ProductRepository { pool, runner }
    }

    /// Inserts one product and returns its generated id.
    ///
    /// ## Returns
    /// * `Err(DbError::Validation)` - name, price, latitude or longitude
    ///   missing, or price negative
    pub async fn insert_one(&self, product: &NewProduct) -> DbResult<i64> {
        let record = product.validate()?;
        debug!(name = %record.name, price = record.price, "Inserting product");

        let record = &record;
        let id = self
            .runner
            .write("products.insert_one", || async move {
                let mut conn = self.pool.acquire().await?;
                insert(&mut conn, record).await
            })
            .await?;

        debug!(product_id = id, "Product inserted");
        Ok(id)
    }

    /// Inserts every product or none of them.
    pub async fn insert_many(&self, products: &[NewProduct]) -> DbResult<Vec<i64>> {
        let records = validate_batch(products, NewProduct::validate)?;
        if records.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = records.len(), "Inserting product batch");

        let records = &records;
        self.runner
            .write("products.insert_many", || async move {
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

    /// Writes the supplied fields to one product. Returns rows affected.
    pub async fn update_one(&self, product_id: i64, patch: &ProductPatch) -> DbResult<u64> {
        self.update_many(&Filter::by_id(product_id), patch).await
    }

    /// Writes the supplied fields to every product matching `filter`.
    pub async fn update_many(&self, filter: &Filter<ProductColumn>, patch: &ProductPatch) -> DbResult<u64> {
        let assignments = patch.assignments()?;
        let predicate = filter.require_predicate()?;
        debug!(fields = assignments.len(), "Updating products");

        self.runner
            .write("products.update", || update_rows(&self.pool, &assignments, predicate))
            .await
    }

    pub async fn update_where(&self, predicate: &str, params: Vec<SqlValue>, patch: &ProductPatch) -> DbResult<u64> {
        let filter = Filter::parse(predicate, params)?;
        self.update_many(&filter, patch).await
    }

    pub async fn delete_one(&self, product_id: i64) -> DbResult<u64> {
        self.delete_many(&Filter::by_id(product_id)).await
    }

    /// Deletes every product matching `filter`.
    ///
    /// Products still referenced by a transaction cannot be deleted
    /// (foreign key violation); nothing is removed in that case.
    pub async fn delete_many(&self, filter: &Filter<ProductColumn>) -> DbResult<u64> {
        let predicate = filter.require_predicate()?;
        debug!("Deleting products");

        self.runner
            .write("products.delete", || delete_rows(&self.pool, predicate))
            .await
    }

    pub async fn delete_where(&self, predicate: &str, params: Vec<SqlValue>) -> DbResult<u64> {
        let filter = Filter::parse(predicate, params)?;
        self.delete_many(&filter).await
    }

    pub async fn get_by_id(&self, product_id: i64) -> DbResult<Option<Product>> {
        self.runner
            .read("products.get_by_id", || {
                fetch_by_id::<ProductColumn, Product>(&self.pool, product_id)
            })
            .await
    }

    pub async fn find(&self, filter: &Filter<ProductColumn>) -> DbResult<Vec<Product>> {
        let predicate = filter.checked_predicate()?;
        self.runner
            .read("products.find", || fetch_rows(&self.pool, predicate))
            .await
    }

    pub async fn count(&self) -> DbResult<i64> {
        self.runner
            .read("products.count", || count_rows::<ProductColumn>(&self.pool))
            .await
    }
}

async fn insert(conn: &mut SqliteConnection, record: &ProductRecord) -> DbResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO products (
            name, price, stock_quantity, latitude, longitude, description
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(record.name.as_str())
    .bind(record.price)
    .bind(record.stock_quantity)
    .bind(record.latitude)
    .bind(record.longitude)
    .bind(record.description.as_deref())
    .execute(conn)
    .await?;

    Ok(result.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use mercado_core::{Predicate, ValidationError, DEFAULT_STOCK_QUANTITY};

    async fn setup() -> ProductRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().products()
    }

    #[tokio::test]
    async fn test_insert_applies_defaults() {
        let repo = setup().await;

        let id = repo
            .insert_one(&NewProduct::new("Lamp", 9.99, 41.38, 2.17))
            .await
            .unwrap();
        let lamp = repo.get_by_id(id).await.unwrap().unwrap();

        assert_eq!(lamp.name, "Lamp");
        assert_eq!(lamp.stock_quantity, DEFAULT_STOCK_QUANTITY);
        assert!(lamp.description.is_none());
        assert_eq!(lamp.latitude, 41.38);
    }

    #[tokio::test]
    async fn test_negative_price_is_rejected() {
        let repo = setup().await;

        let err = repo
            .insert_one(&NewProduct::new("Lamp", -1.0, 0.0, 0.0))
            .await
            .unwrap_err();
        assert_eq!(err.validation(), Some(&ValidationError::Negative { field: "price" }));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_aborts_at_missing_field() {
        let repo = setup().await;
        let batch = vec![
            NewProduct::new("Lamp", 9.99, 0.0, 0.0),
            NewProduct {
                name: Some("Chair".into()),
                price: Some(20.0),
                latitude: Some(0.0),
                ..Default::default()
            },
        ];

        let err = repo.insert_many(&batch).await.unwrap_err();
        let validation = err.validation().unwrap();
        assert_eq!(validation.batch_index(), Some(1));
        assert_eq!(validation.to_string(), "item 1: longitude is required");
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_partial_update_leaves_other_fields() {
        let repo = setup().await;
        let id = repo
            .insert_one(&NewProduct::new("Lamp", 9.99, 41.38, 2.17).description("Brass"))
            .await
            .unwrap();

        let rows = repo
            .update_one(id, &ProductPatch::default().price(12.5))
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let lamp = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(lamp.price, 12.5);
        assert_eq!(lamp.name, "Lamp");
        assert_eq!(lamp.description.as_deref(), Some("Brass"));
        assert_eq!(lamp.longitude, 2.17);
    }

    #[tokio::test]
    async fn test_filtered_update_by_price() {
        let repo = setup().await;
        repo.insert_many(&[
            NewProduct::new("Pen", 1.0, 0.0, 0.0),
            NewProduct::new("Pad", 3.0, 0.0, 0.0),
            NewProduct::new("Desk", 90.0, 0.0, 0.0),
        ])
        .await
        .unwrap();

        let rows = repo
            .update_where(
                "price < ? AND name IN (?, ?)",
                vec![10.0.into(), "Pen".into(), "Desk".into()],
                &ProductPatch::default().stock_quantity(0),
            )
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let empty = repo
            .find(&Filter::eq(ProductColumn::StockQuantity, 0_i64))
            .await
            .unwrap();
        assert_eq!(empty.len(), 1);
        assert_eq!(empty[0].name, "Pen");
    }

    #[tokio::test]
    async fn test_unknown_column_is_rejected() {
        let repo = setup().await;
        repo.insert_one(&NewProduct::new("Lamp", 9.99, 0.0, 0.0)).await.unwrap();

        let err = repo
            .delete_where("password = ?", vec!["x".into()])
            .await
            .unwrap_err();
        assert!(matches!(
            err.validation(),
            Some(ValidationError::UnknownColumn { .. })
        ));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_filter() {
        let repo = setup().await;
        repo.insert_many(&[
            NewProduct::new("Pen", 1.0, 0.0, 0.0),
            NewProduct::new("Desk", 90.0, 0.0, 0.0).description("Oak"),
        ])
        .await
        .unwrap();

        let rows = repo
            .delete_many(&Filter::is_null(ProductColumn::Description))
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let left = repo.find(&Filter::new()).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].name, "Desk");
    }

    #[tokio::test]
    async fn test_empty_group_never_reaches_storage() {
        let repo = setup().await;
        let id = repo.insert_one(&NewProduct::new("Lamp", 9.99, 0.0, 0.0)).await.unwrap();
        let filter = Filter::from(Predicate::<ProductColumn>::Or(vec![]));

        let err = repo.delete_many(&filter).await.unwrap_err();
        assert_eq!(err.validation(), Some(&ValidationError::EmptyGroup));

        let err = repo
            .update_many(&filter, &ProductPatch::default().price(1.0))
            .await
            .unwrap_err();
        assert_eq!(err.validation(), Some(&ValidationError::EmptyGroup));

        let err = repo.find(&filter).await.unwrap_err();
        assert_eq!(err.validation(), Some(&ValidationError::EmptyGroup));
        assert_eq!(repo.get_by_id(id).await.unwrap().unwrap().price, 9.99);
    }
}
