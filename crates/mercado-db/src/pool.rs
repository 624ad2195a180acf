//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Calling application                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) / DbConfig::from_env()                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + initialize schema         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       │ db.customers() / db.products() / db.transactions()             │
//! │       ▼                                                                 │
//! │  Each operation borrows one connection (or one transaction) and        │
//! │  hands it back on every exit path.                                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//! SQLite has a single writer. A writer that finds the database locked
//! waits up to `busy_timeout`, then fails with `DbError::Busy`. The whole
//! operation is additionally bounded by `operation_timeout`.

use backoff::ExponentialBackoff;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ConfigError, DbError, DbResult};
use crate::migrations;
use crate::repository::customer::CustomerRepository;
use crate::repository::product::ProductRepository;
use crate::repository::transaction::TransactionRepository;
use crate::runner::Runner;

/// Database file used when nothing else is configured.
pub const DEFAULT_DATABASE_PATH: &str = "store.db";

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Retry Policy
// =============================================================================

/// How often a failed operation is re-attempted.
///
/// Reads retry any retryable error (busy/locked, timeout, pool exhausted,
/// connection failure). Writes retry only busy/locked and pool exhausted,
/// since a timed-out write may still commit. The default makes a single
/// attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. `0` is treated as `1`.
    pub max_attempts: u32,

    /// Delay before the first retry; grows exponentially with jitter.
    pub backoff: Duration,

    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 1,
            backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            backoff,
            ..Self::default()
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::default()
    }

    /// Sets the delay cap.
    pub fn max_backoff(mut self, max: Duration) -> Self {
        self.max_backoff = max;
        self
    }

    /// Fresh backoff schedule for one operation.
    pub(crate) fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.backoff,
            current_interval: self.backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None, // attempts are bounded by max_attempts
            ..Default::default()
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/store.db")
///     .max_connections(5)
///     .operation_timeout(Duration::from_secs(5))
///     .retry_policy(RetryPolicy::new(3, Duration::from_millis(50)));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a pooled connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Upper bound on any single repository operation.
    /// Default: 30 seconds
    pub operation_timeout: Duration,

    /// How long SQLite waits on a locked database before reporting busy.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Re-attempt policy for retryable failures.
    /// Default: single attempt
    pub retry_policy: RetryPolicy,

    /// Whether to initialize the schema on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// ## Arguments
    /// * `path` - Path to the SQLite database file. Will be created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            operation_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            retry_policy: RetryPolicy::default(),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection acquire timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-operation timeout.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Sets SQLite's busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets the retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets whether to initialize the schema on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// Each `Database::new` with this config gets its own private database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            operation_timeout: Duration::from_secs(10),
            busy_timeout: Duration::from_secs(1),
            retry_policy: RetryPolicy::default(),
            run_migrations: true,
        }
    }

    /// Returns true for the in-memory configuration.
    pub fn is_in_memory(&self) -> bool {
        self.database_path == Path::new(IN_MEMORY)
    }

    /// Builds a configuration from environment variables.
    ///
    /// ## Environment Variables
    /// - `MERCADO_DB_PATH`: database file (default `store.db`)
    /// - `MERCADO_DB_MAX_CONNECTIONS`: pool size
    /// - `MERCADO_DB_OPERATION_TIMEOUT_SECS`: per-operation timeout
    /// - `MERCADO_DB_RETRY_ATTEMPTS`: total attempts for retryable failures
    /// - `MERCADO_DB_RETRY_BACKOFF_MS`: delay before the first retry
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let parse = |key: &'static str| -> Result<Option<u64>, ConfigError> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Some)
                    .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
                None => Ok(None),
            }
        };

        let path = lookup("MERCADO_DB_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());
        let mut config = DbConfig::new(path);

        if let Some(max) = parse("MERCADO_DB_MAX_CONNECTIONS")? {
            config.max_connections = u32::try_from(max).unwrap_or(u32::MAX);
        }
        if let Some(secs) = parse("MERCADO_DB_OPERATION_TIMEOUT_SECS")? {
            config.operation_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse("MERCADO_DB_RETRY_ATTEMPTS")? {
            config.retry_policy.max_attempts = u32::try_from(attempts).unwrap_or(u32::MAX);
        }
        if let Some(ms) = parse("MERCADO_DB_RETRY_BACKOFF_MS")? {
            config.retry_policy.backoff = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Cloning is cheap (the pool is reference counted); pass it to whatever
/// needs storage instead of opening connections ad hoc.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("store.db")).await?;
///
/// let ana = db.customers().insert_one(&NewCustomer::new("Ana", "555-0100")).await?;
/// let lamp = db.products().insert_one(&NewProduct::new("Lamp", 9.99, 41.0, 2.0)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    /// Timeout and retry settings shared by every repository.
    runner: Runner,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for file databases
    ///    - NORMAL synchronous
    ///    - Foreign keys enabled
    ///    - busy_timeout from the config
    /// 3. Creates the connection pool
    /// 4. Initializes the schema (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let in_memory = config.is_in_memory();

        let base_options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(true)
                // WAL mode: Readers don't block writers, writers don't block readers
                .journal_mode(SqliteJournalMode::Wal)
        };

        let connect_options = base_options
            .synchronous(SqliteSynchronous::Normal)
            // Enforce seller/buyer/product references
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        debug!("Connection options configured");

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout));

        if in_memory {
            // The database lives only as long as its connection.
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            runner: Runner::new(config.operation_timeout, config.retry_policy),
        };

        if config.run_migrations {
            db.init_schema().await?;
        }

        Ok(db)
    }

    /// Ensures the customers, products and transactions tables exist.
    ///
    /// Idempotent: calling it on an initialized database changes nothing.
    pub async fn init_schema(&self) -> DbResult<()> {
        info!("Initializing schema");
        self.runner
            .write("init_schema", || migrations::run_migrations(&self.pool))
            .await?;
        info!("Schema ready");
        Ok(())
    }

    /// Returns (total, applied) schema migrations.
    pub async fn migration_status(&self) -> DbResult<(usize, usize)> {
        self.runner
            .read("migration_status", || migrations::migration_status(&self.pool))
            .await
    }

    /// Returns a reference to the connection pool.
    ///
    /// For queries not covered by repositories.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the customer repository.
    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::with_runner(self.pool.clone(), self.runner.clone())
    }

    /// Returns the product repository.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::with_runner(self.pool.clone(), self.runner.clone())
    }

    /// Returns the transaction repository.
    pub fn transactions(&self) -> TransactionRepository {
        TransactionRepository::with_runner(self.pool.clone(), self.runner.clone())
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all repository operations fail with
    /// `DbError::ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    ///
    /// Bounded by `operation_timeout` like any other read.
    pub async fn health_check(&self) -> bool {
        self.runner
            .read("health_check", || async {
                sqlx::query("SELECT 1").execute(&self.pool).await?;
                Ok(())
            })
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mercado_core::{NewCustomer, NewProduct};
    use sqlx::pool::PoolConnection;
    use sqlx::Sqlite;
    use std::collections::HashMap;

    /// Takes the database write lock on one of `db`'s connections.
    async fn hold_write_lock(db: &Database) -> PoolConnection<Sqlite> {
        let mut conn = db.pool().acquire().await.unwrap();
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await.unwrap();
        conn
    }

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_in_memory_databases_are_isolated() {
        let a = Database::new(DbConfig::in_memory()).await.unwrap();
        let b = Database::new(DbConfig::in_memory()).await.unwrap();

        a.customers()
            .insert_one(&NewCustomer::new("Ana", "555-0100"))
            .await
            .unwrap();

        assert_eq!(a.customers().count().await.unwrap(), 1);
        assert_eq!(b.customers().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_closed_pool_reports_connection_failure() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;

        let err = db.customers().count().await.unwrap_err();
        assert!(matches!(err, DbError::ConnectionFailed(_)));
        assert!(err.is_retryable());
        assert!(!db.health_check().await);
    }

    #[tokio::test]
    async fn test_held_write_lock_reports_busy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let holder = Database::new(DbConfig::new(&path)).await.unwrap();
        let writer = Database::new(DbConfig::new(&path).busy_timeout(Duration::from_millis(50)))
            .await
            .unwrap();

        let mut lock = hold_write_lock(&holder).await;
        let err = writer
            .products()
            .insert_one(&NewProduct::new("Lamp", 9.99, 41.38, 2.17))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Busy(_)), "got {err:?}");
        assert!(err.is_retryable());

        sqlx::query("ROLLBACK").execute(&mut *lock).await.unwrap();
        drop(lock);
        assert_eq!(writer.products().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_busy_insert_is_retried_until_the_lock_clears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let holder = Database::new(DbConfig::new(&path)).await.unwrap();
        let writer = Database::new(
            DbConfig::new(&path)
                .busy_timeout(Duration::from_millis(20))
                .retry_policy(RetryPolicy::new(5, Duration::from_millis(50))),
        )
        .await
        .unwrap();

        let mut lock = hold_write_lock(&holder).await;
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            sqlx::query("ROLLBACK").execute(&mut *lock).await.unwrap();
        });

        writer
            .products()
            .insert_one(&NewProduct::new("Lamp", 9.99, 41.38, 2.17))
            .await
            .unwrap();
        release.await.unwrap();

        assert_eq!(holder.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_timed_out_insert_is_not_written_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let holder = Database::new(DbConfig::new(&path)).await.unwrap();
        // busy_timeout stays at 5 s, so the insert is still waiting on the
        // lock when the operation deadline passes.
        let writer = Database::new(
            DbConfig::new(&path)
                .operation_timeout(Duration::from_millis(100))
                .retry_policy(RetryPolicy::new(2, Duration::from_millis(300))),
        )
        .await
        .unwrap();

        let mut lock = hold_write_lock(&holder).await;
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            sqlx::query("ROLLBACK").execute(&mut *lock).await.unwrap();
        });

        let err = writer
            .products()
            .insert_one(&NewProduct::new("Lamp", 9.99, 41.38, 2.17))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Timeout(_)), "got {err:?}");
        release.await.unwrap();

        // The abandoned statement may still land once the lock is gone.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(holder.products().count().await.unwrap() <= 1);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .operation_timeout(Duration::from_secs(3))
            .retry_policy(RetryPolicy::new(4, Duration::from_millis(20)));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.operation_timeout, Duration::from_secs(3));
        assert_eq!(config.retry_policy.max_attempts, 4);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }

    #[test]
    fn test_retry_schedule_grows_and_caps() {
        use backoff::backoff::Backoff;

        let policy = RetryPolicy::new(4, Duration::from_millis(100))
            .max_backoff(Duration::from_millis(300));
        let mut schedule = policy.schedule();

        // Default jitter is +/- 50%.
        let first = schedule.next_backoff().unwrap();
        assert!(first >= Duration::from_millis(49) && first <= Duration::from_millis(151));

        let later: Vec<Duration> = (0..5).filter_map(|_| schedule.next_backoff()).collect();
        assert_eq!(later.len(), 5);
        assert!(later.iter().all(|d| *d <= Duration::from_millis(451)));
    }

    #[test]
    fn test_config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("MERCADO_DB_PATH", "/var/lib/mercado/store.db"),
            ("MERCADO_DB_OPERATION_TIMEOUT_SECS", "7"),
            ("MERCADO_DB_RETRY_ATTEMPTS", "3"),
        ]
        .into_iter()
        .collect();

        let config = DbConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/mercado/store.db"));
        assert_eq!(config.operation_timeout, Duration::from_secs(7));
        assert_eq!(config.retry_policy.max_attempts, 3);
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_config_defaults_and_bad_values() {
        let config = DbConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DATABASE_PATH));

        let err = DbConfig::from_lookup(|k| {
            (k == "MERCADO_DB_MAX_CONNECTIONS").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "MERCADO_DB_MAX_CONNECTIONS",
                ..
            }
        ));
    }
}
