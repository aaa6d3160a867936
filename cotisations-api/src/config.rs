/// Configuration management for the API server
///
/// Values are layered: built-in defaults, then an optional `cotisations.toml`
/// (or `.json`/`.yaml`) next to the binary, then environment variables
/// (a `.env` file is loaded first when present).
///
/// # Environment Variables
///
/// - `DATABASE_URL`: SQLite connection string (default: sqlite://cotisations.db)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 5)
/// - `API_HOST`: Host to bind to (default: 127.0.0.1)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `API_PRODUCTION`: Enables HSTS and strict headers (default: false)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `RANKING_AMOUNT_SOURCE`: `declared_contribution` or `confirmed_payments`
/// - `VIEW_MOUNT_TIMEOUT_MS`: Bound on mounting a view (default: 5000)
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use cotisations_api::config::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}:{}", config.api.host, config.api.port);
/// # Ok(())
/// # }
/// ```

use cotisations_shared::db::pool::DEFAULT_DATABASE_URL;
use cotisations_shared::ranking::AmountSource;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Ranking configuration
    pub ranking: RankingConfig,

    /// Navigation shell configuration
    pub shell: ShellConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// Ranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Where group totals come from
    pub amount_source: AmountSource,
}

/// Navigation shell configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Bound on rendering and mounting a view, in milliseconds
    pub view_mount_timeout_ms: u64,
}

impl ShellConfig {
    pub fn mount_timeout(&self) -> Duration {
        Duration::from_millis(self.view_mount_timeout_ms)
    }
}

impl Config {
    /// Loads configuration from defaults, the optional config file and
    /// environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a value has the wrong type (e.g., a non-numeric
    /// port) or names an unknown amount source.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::load(|key| env::var(key).ok())
    }

    /// Builds the configuration with `lookup` standing in for the environment
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let cors_origins = lookup("CORS_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect::<Vec<_>>()
        });

        let settings = config::Config::builder()
            .set_default("api.host", "127.0.0.1")?
            .set_default("api.port", 8080)?
            .set_default("api.cors_origins", vec!["*"])?
            .set_default("api.production", false)?
            .set_default("database.url", DEFAULT_DATABASE_URL)?
            .set_default("database.max_connections", 5)?
            .set_default("ranking.amount_source", AmountSource::default().as_str())?
            .set_default("shell.view_mount_timeout_ms", 5000)?
            .add_source(config::File::with_name("cotisations").required(false))
            .set_override_option("api.host", lookup("API_HOST"))?
            .set_override_option("api.port", lookup("API_PORT"))?
            .set_override_option("api.cors_origins", cors_origins)?
            .set_override_option("api.production", lookup("API_PRODUCTION"))?
            .set_override_option("database.url", lookup("DATABASE_URL"))?
            .set_override_option("database.max_connections", lookup("DATABASE_MAX_CONNECTIONS"))?
            .set_override_option("ranking.amount_source", lookup("RANKING_AMOUNT_SOURCE"))?
            .set_override_option("shell.view_mount_timeout_ms", lookup("VIEW_MOUNT_TIMEOUT_MS"))?
            .build()?;

        let config: Config = settings.try_deserialize()?;

        if config.shell.view_mount_timeout_ms == 0 {
            anyhow::bail!("VIEW_MOUNT_TIMEOUT_MS must be greater than 0");
        }

        Ok(config)
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Pool settings for the shared store
    pub fn database_config(&self) -> cotisations_shared::db::pool::DatabaseConfig {
        cotisations_shared::db::pool::DatabaseConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::load(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.database.url, "sqlite://cotisations.db");
        assert_eq!(config.api.cors_origins, vec!["*"]);
        assert!(!config.api.production);
        assert_eq!(config.ranking.amount_source, AmountSource::DeclaredContribution);
        assert_eq!(config.shell.mount_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_environment_overrides() {
        let config = load(&[
            ("API_PORT", "9090"),
            ("API_PRODUCTION", "true"),
            ("CORS_ORIGINS", "http://localhost:3000, http://127.0.0.1:3000"),
            ("RANKING_AMOUNT_SOURCE", "confirmed_payments"),
            ("VIEW_MOUNT_TIMEOUT_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.api.port, 9090);
        assert!(config.api.production);
        assert_eq!(config.api.cors_origins, vec!["http://localhost:3000", "http://127.0.0.1:3000"]);
        assert_eq!(config.ranking.amount_source, AmountSource::ConfirmedPayments);
        assert_eq!(config.shell.mount_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(load(&[("API_PORT", "not-a-port")]).is_err());
        assert!(load(&[("RANKING_AMOUNT_SOURCE", "guesswork")]).is_err());
        assert!(load(&[("VIEW_MOUNT_TIMEOUT_MS", "0")]).is_err());
    }
}
