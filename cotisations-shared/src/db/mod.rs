/// Database layer for the contribution tracker
///
/// # Modules
///
/// - `pool`: SQLite connection pool management with health checks
/// - `migrations`: Versioned, additive schema migrations
///
/// The document store built on top of this layer lives in `crate::store`.
///
/// # Example
///
/// ```no_run
/// use cotisations_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig::default()).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
