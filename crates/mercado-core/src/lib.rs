//! # mercado-core: Domain Types and Rules for the Mercado Store
//!
//! Everything the data access layer decides before it talks to SQLite
//! lives here, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mercado Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Calling application (not in this repo)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ library calls                          │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ mercado-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  column   │  │  filter   │  │ validation│  │   │
//! │  │   │ Customer  │  │ allow-list│  │ Filter<C> │  │ required  │  │   │
//! │  │   │ Product   │  │ per table │  │ parse()   │  │  fields   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  mercado-db (Data Access Layer)                 │   │
//! │  │        SQLite pool, schema init, repositories, QueryBuilder     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Stored rows, insert inputs and update patches
//! - [`column`] - Per-table column enums (the filter allow-list)
//! - [`value`] - Values bound into SQL statements
//! - [`filter`] - Typed row filters and the restricted predicate parser
//! - [`validation`] - Required-field and value rules
//! - [`error`] - Validation error type
//!
//! ## Example Usage
//!
//! ```rust
//! use mercado_core::{CustomerColumn, Filter, NewCustomer, DEFAULT_EMAIL};
//!
//! let ana = NewCustomer::new("Ana", "555-0100").validate().unwrap();
//! assert_eq!(ana.email, DEFAULT_EMAIL);
//!
//! let filter = Filter::<CustomerColumn>::parse("phone LIKE ?", vec!["555-%".into()]).unwrap();
//! assert!(!filter.is_empty());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod column;
pub mod error;
pub mod filter;
pub mod types;
pub mod validation;
pub mod value;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use column::{Column, CustomerColumn, ProductColumn, TransactionColumn};
pub use error::ValidationError;
pub use filter::{CompareOp, Filter, Predicate, RenderedSql, SqlWriter};
pub use types::*;
pub use value::SqlValue;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Email stored for customers who did not give one.
///
/// The `email` column is UNIQUE, so only one customer at a time can hold
/// the sentinel.
pub const DEFAULT_EMAIL: &str = "none@none.none";

/// Stock assigned to a product when none is given.
pub const DEFAULT_STOCK_QUANTITY: i64 = 1;
