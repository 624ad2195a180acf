//! # Domain Types
//!
//! Rows, insert inputs and update patches for the three store tables.
//!
//! ## Type Families
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Stored row        Insert input       Validated record    Update patch │
//! │  ───────────       ────────────       ────────────────    ──────────── │
//! │  Customer     ◄──  NewCustomer   ──►  CustomerRecord      CustomerPatch│
//! │  Product      ◄──  NewProduct    ──►  ProductRecord       ProductPatch │
//! │  Transaction  ◄──  NewTransaction──►  TransactionRecord   Transaction- │
//! │                                                           Patch        │
//! │                                                                         │
//! │  Insert inputs hold required fields as Option so a missing field is    │
//! │  representable; validate() turns them into records with defaults       │
//! │  applied. Patches hold every field as Option: None = leave unchanged.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::column::{Column, CustomerColumn, ProductColumn, TransactionColumn};
use crate::error::{ValidationError, ValidationResult};
use crate::validation::{check_finite, check_price, require, require_finite, require_text};
use crate::value::SqlValue;
use crate::{DEFAULT_EMAIL, DEFAULT_STOCK_QUANTITY};

// =============================================================================
// Update Plumbing
// =============================================================================

/// One `column = ?` pair of an UPDATE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment<C> {
    pub column: C,
    pub value: SqlValue,
}

/// A set of optional field changes for one table.
pub trait Patch {
    type Column: Column;

    /// Returns the supplied fields, in column order.
    ///
    /// Fails with [`ValidationError::NothingToUpdate`] when no field is set,
    /// or with a field error when a supplied value breaks a column rule.
    fn assignments(&self) -> ValidationResult<Vec<Assignment<Self::Column>>>;
}

/// Collects assignments while checking supplied values.
struct Assignments<C>(Vec<Assignment<C>>);

impl<C: Column> Assignments<C> {
    fn new() -> Self {
        Assignments(Vec::new())
    }

    fn set(&mut self, column: C, value: Option<SqlValue>) {
        if let Some(value) = value {
            self.0.push(Assignment { column, value });
        }
    }

    fn finish(self) -> ValidationResult<Vec<Assignment<C>>> {
        if self.0.is_empty() {
            return Err(ValidationError::NothingToUpdate);
        }
        Ok(self.0)
    }
}

/// A supplied text field is written as given, empty strings included.
fn patch_text(field: &'static str, value: &Option<String>) -> ValidationResult<Option<SqlValue>> {
    value
        .as_deref()
        .map(|v| require_text(field, Some(v)).map(SqlValue::Text))
        .transpose()
}

fn patch_real(field: &'static str, value: Option<f64>) -> ValidationResult<Option<SqlValue>> {
    value
        .map(|v| check_finite(field, v).map(SqlValue::Real))
        .transpose()
}

fn patch_int(value: Option<i64>) -> Option<SqlValue> {
    value.map(SqlValue::Integer)
}

// =============================================================================
// Customer
// =============================================================================

/// A stored customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub customer_id: i64,
    pub name: String,
    pub phone: String,
    /// `None` only for rows written by other tools; inserts through this
    /// crate always store an email (the sentinel if none was given).
    pub email: Option<String>,
}

/// Input for inserting a customer.
///
/// ## Example
/// ```rust
/// use mercado_core::NewCustomer;
///
/// let with_email = NewCustomer::new("Ana", "555-0100").email("ana@example.com");
/// assert!(with_email.validate().is_ok());
///
/// let missing_phone = NewCustomer { name: Some("Ana".into()), ..Default::default() };
/// assert!(missing_phone.validate().is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl NewCustomer {
    /// Creates an input with both required fields set.
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        NewCustomer {
            name: Some(name.into()),
            phone: Some(phone.into()),
            email: None,
        }
    }

    /// Sets the email.
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Checks required fields and applies the email default.
    pub fn validate(&self) -> ValidationResult<CustomerRecord> {
        Ok(CustomerRecord {
            name: require_text("name", self.name.as_deref())?,
            phone: require_text("phone", self.phone.as_deref())?,
            email: self
                .email
                .clone()
                .unwrap_or_else(|| DEFAULT_EMAIL.to_string()),
        })
    }
}

/// A customer that passed validation, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    pub name: String,
    pub phone: String,
    pub email: String,
}

/// Field changes for customers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl CustomerPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

impl Patch for CustomerPatch {
    type Column = CustomerColumn;

    fn assignments(&self) -> ValidationResult<Vec<Assignment<CustomerColumn>>> {
        let mut out = Assignments::new();
        out.set(CustomerColumn::Name, patch_text("name", &self.name)?);
        out.set(CustomerColumn::Phone, patch_text("phone", &self.phone)?);
        out.set(CustomerColumn::Email, self.email.clone().map(SqlValue::Text));
        out.finish()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A stored, geotagged product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub product_id: i64,
    pub name: String,
    pub price: f64,
    pub stock_quantity: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
    /// Set by SQLite (`CURRENT_TIMESTAMP`, UTC) when the row is created.
    pub created_at: NaiveDateTime,
}

/// Input for inserting a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub stock_quantity: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: Option<String>,
}

impl NewProduct {
    /// Creates an input with every required field set.
    pub fn new(name: impl Into<String>, price: f64, latitude: f64, longitude: f64) -> Self {
        NewProduct {
            name: Some(name.into()),
            price: Some(price),
            stock_quantity: None,
            latitude: Some(latitude),
            longitude: Some(longitude),
            description: None,
        }
    }

    pub fn stock_quantity(mut self, quantity: i64) -> Self {
        self.stock_quantity = Some(quantity);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Checks required fields and applies the stock default.
    pub fn validate(&self) -> ValidationResult<ProductRecord> {
        Ok(ProductRecord {
            name: require_text("name", self.name.as_deref())?,
            price: check_price(require("price", self.price)?)?,
            stock_quantity: self.stock_quantity.unwrap_or(DEFAULT_STOCK_QUANTITY),
            latitude: require_finite("latitude", self.latitude)?,
            longitude: require_finite("longitude", self.longitude)?,
            description: self.description.clone(),
        })
    }
}

/// A product that passed validation, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub name: String,
    pub price: f64,
    pub stock_quantity: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
}

/// Field changes for products.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub stock_quantity: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: Option<String>,
}

impl ProductPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn stock_quantity(mut self, quantity: i64) -> Self {
        self.stock_quantity = Some(quantity);
        self
    }

    pub fn location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Patch for ProductPatch {
    type Column = ProductColumn;

    fn assignments(&self) -> ValidationResult<Vec<Assignment<ProductColumn>>> {
        let price = self
            .price
            .map(|p| check_price(p).map(SqlValue::Real))
            .transpose()?;

        let mut out = Assignments::new();
        out.set(ProductColumn::Name, patch_text("name", &self.name)?);
        out.set(ProductColumn::Price, price);
        out.set(ProductColumn::StockQuantity, patch_int(self.stock_quantity));
        out.set(ProductColumn::Latitude, patch_real("latitude", self.latitude)?);
        out.set(ProductColumn::Longitude, patch_real("longitude", self.longitude)?);
        out.set(
            ProductColumn::Description,
            self.description.clone().map(SqlValue::Text),
        );
        out.finish()
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A stored sale of a product from one customer to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Transaction {
    pub transaction_id: i64,
    pub seller_id: i64,
    pub buyer_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub total_price: f64,
    /// Set by SQLite (`CURRENT_TIMESTAMP`, UTC) when the row is created.
    pub transaction_date: NaiveDateTime,
}

/// Input for inserting a transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub seller_id: Option<i64>,
    pub buyer_id: Option<i64>,
    pub product_id: Option<i64>,
    pub quantity: Option<i64>,
    pub total_price: Option<f64>,
}

impl NewTransaction {
    /// Creates an input with every required field set.
    pub fn new(seller_id: i64, buyer_id: i64, product_id: i64, quantity: i64, total_price: f64) -> Self {
        NewTransaction {
            seller_id: Some(seller_id),
            buyer_id: Some(buyer_id),
            product_id: Some(product_id),
            quantity: Some(quantity),
            total_price: Some(total_price),
        }
    }

    /// Checks required fields.
    ///
    /// Whether the referenced customers and product exist is left to the
    /// database's foreign keys.
    pub fn validate(&self) -> ValidationResult<TransactionRecord> {
        Ok(TransactionRecord {
            seller_id: require("seller_id", self.seller_id)?,
            buyer_id: require("buyer_id", self.buyer_id)?,
            product_id: require("product_id", self.product_id)?,
            quantity: require("quantity", self.quantity)?,
            total_price: require_finite("total_price", self.total_price)?,
        })
    }
}

/// A transaction that passed validation, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub seller_id: i64,
    pub buyer_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub total_price: f64,
}

/// Field changes for transactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    pub seller_id: Option<i64>,
    pub buyer_id: Option<i64>,
    pub product_id: Option<i64>,
    pub quantity: Option<i64>,
    pub total_price: Option<f64>,
}

impl TransactionPatch {
    pub fn seller_id(mut self, id: i64) -> Self {
        self.seller_id = Some(id);
        self
    }

    pub fn buyer_id(mut self, id: i64) -> Self {
        self.buyer_id = Some(id);
        self
    }

    pub fn product_id(mut self, id: i64) -> Self {
        self.product_id = Some(id);
        self
    }

    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn total_price(mut self, total_price: f64) -> Self {
        self.total_price = Some(total_price);
        self
    }
}

impl Patch for TransactionPatch {
    type Column = TransactionColumn;

    fn assignments(&self) -> ValidationResult<Vec<Assignment<TransactionColumn>>> {
        let mut out = Assignments::new();
        out.set(TransactionColumn::SellerId, patch_int(self.seller_id));
        out.set(TransactionColumn::BuyerId, patch_int(self.buyer_id));
        out.set(TransactionColumn::ProductId, patch_int(self.product_id));
        out.set(TransactionColumn::Quantity, patch_int(self.quantity));
        out.set(
            TransactionColumn::TotalPrice,
            patch_real("total_price", self.total_price)?,
        );
        out.finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
