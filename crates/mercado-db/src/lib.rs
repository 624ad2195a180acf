//! # mercado-db: Data Access Layer for the Mercado Store
//!
//! Persistent storage for customers, products and transactions on SQLite,
//! with sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mercado Data Flow                                │
//! │                                                                         │
//! │  Calling application (HTTP handler, CLI, seed binary)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   mercado-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │  │   │
//! │  │   │               │    │ CustomerRepo   │   │              │  │   │
//! │  │   │ SqlitePool    │◄───│ ProductRepo    │   │ 001_init.sql │  │   │
//! │  │   │ Timeouts      │    │ TransactionRepo│   │              │  │   │
//! │  │   │ Retry policy  │    │                │   │              │  │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (store.db)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration, retry policy
//! - [`migrations`] - Embedded schema
//! - [`error`] - Database error types
//! - [`repository`] - Customer, product and transaction repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mercado_db::{Database, DbConfig};
//! use mercado_core::{CustomerColumn, CustomerPatch, Filter, NewCustomer};
//!
//! let db = Database::new(DbConfig::new("store.db")).await?;
//!
//! let id = db.customers().insert_one(&NewCustomer::new("Ana", "555-0100")).await?;
//! db.customers()
//!     .update_one(id, &CustomerPatch::default().email("ana@example.com"))
//!     .await?;
//! db.customers()
//!     .delete_many(&Filter::like(CustomerColumn::Phone, "555-%"))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

mod runner;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConstraintKind, DbError, DbResult};
pub use pool::{Database, DbConfig, RetryPolicy, DEFAULT_DATABASE_PATH};

// Repository re-exports for convenience
pub use repository::customer::CustomerRepository;
pub use repository::product::ProductRepository;
pub use repository::transaction::TransactionRepository;

pub use mercado_core;
