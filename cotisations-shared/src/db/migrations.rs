/// Database migration runner
///
/// The schema is versioned through sqlx's embedded migrations. Every migration
/// is additive (`CREATE ... IF NOT EXISTS`), so upgrading an existing database
/// creates missing collections and indexes without touching stored records.
///
/// # Migration Files
///
/// Migrations live in `cotisations-shared/migrations/` and are embedded at
/// compile time:
/// - `20251114000001_initial_schema.sql` - members, payments, cantons,
///   villages, contribution types, settings
/// - `20251114000002_quartiers.sql` - quarters and the member-by-quarter index
///
/// # Example
///
/// ```no_run
/// use cotisations_shared::db::pool::{create_pool, DatabaseConfig};
/// use cotisations_shared::db::migrations::{run_migrations, get_migration_status};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig::default()).await?;
///
///     run_migrations(&pool).await?;
///
///     let status = get_migration_status(&pool).await?;
///     println!("Schema version {}", status.applied_migrations);
///
///     Ok(())
/// }
/// ```

use sqlx::migrate::Migrator;
use sqlx::sqlite::SqlitePool;
use tracing::{debug, info, warn};

/// Embedded migrations, ordered by version
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Number of migrations that have been applied (the schema version)
    pub applied_migrations: usize,

    /// Latest applied migration version (timestamp)
    pub latest_version: Option<i64>,

    /// Whether every embedded migration has been applied
    pub is_up_to_date: bool,
}

/// Runs all pending database migrations
///
/// Already-applied migrations are skipped, so calling this on every startup
/// is safe.
///
/// # Errors
///
/// Returns an error if a migration fails to execute or if an applied
/// migration no longer matches its embedded checksum.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    info!(
        available = MIGRATOR.iter().count(),
        "Starting database migrations"
    );

    match MIGRATOR.run(pool).await {
        Ok(()) => {
            info!("All database migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            warn!("Migration failed: {}", e);
            Err(e)
        }
    }
}

/// Gets the current migration status
///
/// # Errors
///
/// Returns an error if the migrations table cannot be queried
pub async fn get_migration_status(pool: &SqlitePool) -> Result<MigrationStatus, sqlx::Error> {
    debug!("Checking migration status");

    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT 1 FROM sqlite_master
            WHERE type = 'table' AND name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        debug!("Migrations table does not exist yet");
        return Ok(MigrationStatus {
            applied_migrations: 0,
            latest_version: None,
            is_up_to_date: false,
        });
    }

    let (count, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version)
         FROM _sqlx_migrations
         WHERE success = 1",
    )
    .fetch_one(pool)
    .await?;

    let applied = usize::try_from(count).unwrap_or(0);
    let expected = MIGRATOR.iter().filter(|m| m.migration_type.is_up_migration()).count();

    debug!(
        applied_migrations = applied,
        latest_version = ?latest_version,
        "Migration status retrieved"
    );

    Ok(MigrationStatus {
        applied_migrations: applied,
        latest_version,
        is_up_to_date: applied >= expected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrator_versions_are_ordered() {
        let versions: Vec<i64> = MIGRATOR.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        assert_eq!(versions, sorted);
        assert_eq!(versions.len(), 2);
    }

    #[test]
    fn test_migration_status_clone() {
        let status = MigrationStatus {
            applied_migrations: 2,
            latest_version: Some(20251114000002),
            is_up_to_date: true,
        };

        let cloned = status.clone();
        assert_eq!(status.applied_migrations, cloned.applied_migrations);
        assert_eq!(status.latest_version, cloned.latest_version);
        assert_eq!(status.is_up_to_date, cloned.is_up_to_date);
    }
}
