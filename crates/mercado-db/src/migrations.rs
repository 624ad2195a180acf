//! # Schema Initialization
//!
//! The three store tables are embedded as sqlx migrations.
//!
//! ```text
//! Database::new / Database::init_schema
//!       │
//!       ▼
//! _sqlx_migrations present? ── no ──► create it
//!       │
//!       ▼
//! 001_initial_schema.sql applied? ── yes ──► nothing to do
//!       │ no
//!       ▼
//! CREATE TABLE IF NOT EXISTS customers / products / transactions
//! ```
//!
//! Tables are created with `IF NOT EXISTS`, so a `store.db` written by an
//! earlier tool without the migrations table is adopted without error.
//!
//! ## Adding New Migrations
//!
//! 1. Create `migrations/sqlite/NNN_description.sql` with the next number
//! 2. **NEVER** modify an applied migration, always add a new one

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

/// Embedded migrations from `migrations/sqlite`.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending migrations.
///
/// Idempotent: a second run on the same database does nothing.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied");
    Ok(())
}

/// Returns (total_migrations, applied_migrations).
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied = match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
    {
        Ok(count) => count,
        // The migrator creates its table on first run.
        Err(sqlx::Error::Database(e)) if e.message().contains("no such table") => 0,
        Err(e) => return Err(e.into()),
    };

    Ok((total, applied as usize))
}
