// SQLite Connection Pool Setup

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

pub type PoolError = Box<dyn std::error::Error + Send + Sync>;

/// Create SQLite connection pool with WAL mode and foreign keys enabled
///
/// In-memory databases get a single connection: every SQLite connection to
/// `:memory:` opens its own empty database.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, PoolError> {
    let in_memory = database_url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(database_url)?
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true)
        .create_if_missing(true);
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 10 })
        .connect_with(options)
        .await?;

    Ok(pool)
}
