//! # Database Error Types
//!
//! Error types for data access operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  Bad input (mercado_core::ValidationError)                             │
//! │       │    raised before any connection is acquired                    │
//! │       ▼                                                                 │
//! │  DbError::Validation                                                   │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Categorized:                                  │
//! │       ├── ConstraintViolation   (unique / foreign key / not null)      │
//! │       ├── Busy, Timeout, PoolExhausted, ConnectionFailed  (retryable)  │
//! │       └── QueryFailed, MigrationFailed, Internal                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Calling application branches on the variant                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::time::Duration;

use mercado_core::ValidationError;
use thiserror::Error;

/// Which storage rule rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    NotNull,
    Check,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConstraintKind::Unique => "UNIQUE",
            ConstraintKind::ForeignKey => "FOREIGN KEY",
            ConstraintKind::NotNull => "NOT NULL",
            ConstraintKind::Check => "CHECK",
        })
    }
}

/// Data access errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Input was rejected before touching the database.
    ///
    /// ## When This Occurs
    /// - Required field missing on insert (batch: with its position)
    /// - Update with no fields
    /// - Filtered update/delete with an empty or malformed filter
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// SQLite refused the write because of a constraint.
    ///
    /// ## When This Occurs
    /// - Duplicate customer phone or email (`customers.phone`, `customers.email`)
    /// - Transaction referencing a missing customer or product
    ///
    /// `constraint` holds what SQLite reports, e.g. `customers.phone`.
    /// SQLite does not name the foreign key that failed.
    #[error("{kind} constraint violated: {constraint}")]
    ConstraintViolation {
        kind: ConstraintKind,
        constraint: String,
    },

    /// SQLite reported the database busy or locked past `busy_timeout`.
    #[error("Database busy: {0}")]
    Busy(String),

    /// The operation did not finish within the configured timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created or opened
    /// - Pool already closed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Schema initialization failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed for a reason not covered above.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// True for connectivity, lock and timeout failures.
    ///
    /// A read failing this way can be run again. Whether a write can be
    /// is narrower, see [`is_safe_to_replay`](Self::is_safe_to_replay).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::Busy(_) | DbError::Timeout(_) | DbError::PoolExhausted | DbError::ConnectionFailed(_)
        )
    }

    /// True when the failed statement is known to have applied nothing.
    ///
    /// A busy/locked database rejects the statement (a transaction left
    /// open is rolled back on drop), and pool exhaustion means no
    /// connection was ever handed out. A timeout is excluded: the abandoned
    /// statement may still commit.
    pub fn is_safe_to_replay(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::PoolExhausted)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DbError::Validation(_))
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, DbError::ConstraintViolation { .. })
    }

    /// The validation error, if this is one.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            DbError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

/// SQLite primary result codes for "try again later".
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Returns the text after `"<prefix>: "` in a SQLite constraint message.
///
/// `"UNIQUE constraint failed: customers.phone"` → `"customers.phone"`
fn constraint_target(msg: &str) -> String {
    msg.split_once("failed: ")
        .map(|(_, target)| target.trim().to_string())
        .unwrap_or_else(|| msg.to_string())
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database (BUSY/LOCKED)  → DbError::Busy
/// sqlx::Error::Database (constraint)   → DbError::ConstraintViolation
/// sqlx::Error::Database (other)        → DbError::QueryFailed
/// sqlx::Error::PoolTimedOut            → DbError::PoolExhausted
/// sqlx::Error::PoolClosed / Io         → DbError::ConnectionFailed
/// Other                                → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // Extended result codes keep the primary code in the low byte.
                let primary = db_err
                    .code()
                    .and_then(|c| c.parse::<i32>().ok())
                    .map(|c| c & 0xff);
                if matches!(primary, Some(SQLITE_BUSY | SQLITE_LOCKED))
                    || msg.contains("database is locked")
                {
                    return DbError::Busy(msg.to_string());
                }

                let kind = match db_err.kind() {
                    sqlx::error::ErrorKind::UniqueViolation => ConstraintKind::Unique,
                    sqlx::error::ErrorKind::ForeignKeyViolation => ConstraintKind::ForeignKey,
                    sqlx::error::ErrorKind::NotNullViolation => ConstraintKind::NotNull,
                    sqlx::error::ErrorKind::CheckViolation => ConstraintKind::Check,
                    _ => return DbError::QueryFailed(msg.to_string()),
                };

                DbError::ConstraintViolation {
                    kind,
                    constraint: constraint_target(msg),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}
