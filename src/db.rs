//! SQLite connection setup and schema migration.

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use std::{str::FromStr, time::Duration};

/// Schema applied by `--migrate`, embedded so the binary carries its own DDL.
pub const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

/// Writers queue on the SQLite write lock for at most this long.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a pool against `database_url`, creating the database file if needed.
///
/// Foreign keys are enforced on every connection; the capacity triggers rely
/// on them to reject packages pointing at unknown blocks or rates.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

/// Apply the embedded schema. Every statement is idempotent.
pub async fn run_migrations(db: &SqlitePool) -> Result<(), sqlx::Error> {
    tracing::info!("Applying schema ({} bytes)", SCHEMA.len());
    sqlx::raw_sql(SCHEMA).execute(db).await?;
    Ok(())
}

/// Single-connection in-memory database with the schema applied.
#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}
