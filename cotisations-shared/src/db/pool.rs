/// SQLite connection pool
///
/// Opens the local database file backing the document store. The file is
/// created when absent and checked with a trivial query before the pool is
/// handed out, so an unusable store fails at startup and not on the first
/// write.
///
/// # Example
///
/// ```no_run
/// use cotisations_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig {
///         url: "sqlite://cotisations.db".to_string(),
///         ..Default::default()
///     })
///     .await?;
///
///     let (cantons,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cantons")
///         .fetch_one(&pool)
///         .await?;
///     println!("{} cantons", cantons);
///     Ok(())
/// }
/// ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default location of the database file
pub const DEFAULT_DATABASE_URL: &str = "sqlite://cotisations.db";

/// Connection settings of the local database
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite URL, `sqlite://path/to/file.db` or `sqlite::memory:`
    pub url: String,

    /// Pool size. SQLite serialises writers, so a handful is plenty.
    pub max_connections: u32,

    /// Seconds to wait for a free connection
    pub acquire_timeout_seconds: u64,

    /// Seconds a statement waits on a locked database before failing
    pub busy_timeout_seconds: u64,

    /// Create the file when it does not exist
    pub create_if_missing: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 5,
            acquire_timeout_seconds: 30,
            busy_timeout_seconds: 5,
            create_if_missing: true,
        }
    }
}

impl DatabaseConfig {
    fn connect_options(&self) -> Result<SqliteConnectOptions, sqlx::Error> {
        Ok(SqliteConnectOptions::from_str(&self.url)?
            .create_if_missing(self.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(self.busy_timeout_seconds)))
    }
}

/// Opens the pool and checks that the database answers
///
/// # Errors
///
/// Fails when the URL cannot be parsed, the file cannot be opened or
/// created, or the check query does not return.
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool, sqlx::Error> {
    info!(url = %config.url, max_connections = config.max_connections, "Opening database");

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .connect_with(config.connect_options()?)
        .await?;

    health_check(&pool).await?;

    debug!(url = %config.url, "Database ready");
    Ok(pool)
}

/// Runs `SELECT 1` on a pooled connection
pub async fn health_check(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let (answer,): (i64,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;

    if answer != 1 {
        warn!(answer, "Unexpected answer to the database check");
        return Err(sqlx::Error::Protocol(format!("database check returned {}", answer)));
    }
    Ok(())
}

/// Closes every connection, checkpointing the WAL
pub async fn close_pool(pool: SqlitePool) {
    pool.close().await;
    info!("Database closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, DEFAULT_DATABASE_URL);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.busy_timeout_seconds, 5);
        assert!(config.create_if_missing);
    }

    #[tokio::test]
    async fn test_create_pool_on_fresh_file() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("fresh.db").display());

        let pool = create_pool(DatabaseConfig {
            url,
            ..Default::default()
        })
        .await
        .unwrap();

        health_check(&pool).await.unwrap();
        close_pool(pool).await;
        assert!(dir.path().join("fresh.db").exists());
    }

    #[tokio::test]
    async fn test_create_pool_refuses_missing_file_without_create() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("absent.db").display());

        let result = create_pool(DatabaseConfig {
            url,
            create_if_missing: false,
            ..Default::default()
        })
        .await;

        assert!(result.is_err());
    }
}
