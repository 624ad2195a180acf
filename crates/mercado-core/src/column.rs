//! # Column Allow-List
//!
//! Each table gets an enum naming its columns. The enums are the only
//! source of column names that ever reach SQL text: update SET clauses,
//! filters and ORDER BY all render names through [`Column::name`].
//!
//! ```text
//! caller text "price"  ──► ProductColumn::from_name ──► ProductColumn::Price
//!                                                           │
//!                                     SQL text ◄── "price" ─┘  (from the enum)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A column of one table.
pub trait Column: Copy + Eq + Debug + Send + Sync + 'static {
    /// Table the column belongs to.
    const TABLE: &'static str;

    /// Every column of the table, primary key first.
    const ALL: &'static [Self];

    /// The primary key column.
    fn primary_key() -> Self {
        Self::ALL[0]
    }

    /// SQL name of the column.
    fn name(self) -> &'static str;

    /// Looks a column up by its SQL name (ASCII case-insensitive).
    fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

/// Columns of the `customers` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerColumn {
    CustomerId,
    Name,
    Phone,
    Email,
}

impl Column for CustomerColumn {
    const TABLE: &'static str = "customers";
    const ALL: &'static [Self] = &[
        CustomerColumn::CustomerId,
        CustomerColumn::Name,
        CustomerColumn::Phone,
        CustomerColumn::Email,
    ];

    fn name(self) -> &'static str {
        match self {
            CustomerColumn::CustomerId => "customer_id",
            CustomerColumn::Name => "name",
            CustomerColumn::Phone => "phone",
            CustomerColumn::Email => "email",
        }
    }
}

/// Columns of the `products` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductColumn {
    ProductId,
    Name,
    Price,
    StockQuantity,
    Latitude,
    Longitude,
    Description,
    CreatedAt,
}

impl Column for ProductColumn {
    const TABLE: &'static str = "products";
    const ALL: &'static [Self] = &[
        ProductColumn::ProductId,
        ProductColumn::Name,
        ProductColumn::Price,
        ProductColumn::StockQuantity,
        ProductColumn::Latitude,
        ProductColumn::Longitude,
        ProductColumn::Description,
        ProductColumn::CreatedAt,
    ];

    fn name(self) -> &'static str {
        match self {
            ProductColumn::ProductId => "product_id",
            ProductColumn::Name => "name",
            ProductColumn::Price => "price",
            ProductColumn::StockQuantity => "stock_quantity",
            ProductColumn::Latitude => "latitude",
            ProductColumn::Longitude => "longitude",
            ProductColumn::Description => "description",
            ProductColumn::CreatedAt => "created_at",
        }
    }
}

/// Columns of the `transactions` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionColumn {
    TransactionId,
    SellerId,
    BuyerId,
    ProductId,
    Quantity,
    TotalPrice,
    TransactionDate,
}

impl Column for TransactionColumn {
    const TABLE: &'static str = "transactions";
    const ALL: &'static [Self] = &[
        TransactionColumn::TransactionId,
        TransactionColumn::SellerId,
        TransactionColumn::BuyerId,
        TransactionColumn::ProductId,
        TransactionColumn::Quantity,
        TransactionColumn::TotalPrice,
        TransactionColumn::TransactionDate,
    ];

    fn name(self) -> &'static str {
        match self {
            TransactionColumn::TransactionId => "transaction_id",
            TransactionColumn::SellerId => "seller_id",
            TransactionColumn::BuyerId => "buyer_id",
            TransactionColumn::ProductId => "product_id",
            TransactionColumn::Quantity => "quantity",
            TransactionColumn::TotalPrice => "total_price",
            TransactionColumn::TransactionDate => "transaction_date",
        }
    }
}
