//! Database connection pool and scoped session management
//!
//! Owns the single SQLite connection pool of the process. Backend tuning
//! (WAL journal, foreign keys, cache size) is applied once when the pool is
//! built so every pooled connection inherits it.

pub mod env_utils;
mod error;
mod metrics;
mod session;

pub use error::DbError;
pub use session::{Database, PoolStatus, Session};

use env_utils::{parse_env_required, parse_env_with_default, EnvVarError};
use metrics::update_pool_metrics;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://hospital.db";
const SQLITE_CACHE_SIZE_PAGES: &str = "10000";
const METRICS_REFRESH_SECS: u64 = 30;

/// Database connection pool configuration
#[derive(Clone)]
pub struct DbConfig {
    /// Service name for metrics labeling
    pub service_name: String,
    /// SQLite connection URL
    pub database_url: String,
    /// Connections kept open while idle
    pub pool_size: u32,
    /// Extra connections opened on demand beyond `pool_size`
    pub max_overflow: u32,
    /// Connection creation timeout
    pub connect_timeout_secs: u64,
    /// Pool-wait timeout (get connection from pool)
    pub acquire_timeout_secs: u64,
    /// Connection idle timeout
    pub idle_timeout_secs: u64,
    /// Connection maximum lifetime
    pub max_lifetime_secs: u64,
    /// How long SQLite waits on a locked database before failing
    pub busy_timeout_secs: u64,
    /// Upper bound for a health-check round trip
    pub ping_timeout_secs: u64,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("service_name", &self.service_name)
            .field("database_url", &"[REDACTED]")
            .field("pool_size", &self.pool_size)
            .field("max_overflow", &self.max_overflow)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("max_lifetime_secs", &self.max_lifetime_secs)
            .field("busy_timeout_secs", &self.busy_timeout_secs)
            .field("ping_timeout_secs", &self.ping_timeout_secs)
            .finish()
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            service_name: String::from("unknown"),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            pool_size: 5,
            max_overflow: 5,
            connect_timeout_secs: 5,
            acquire_timeout_secs: 10,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            busy_timeout_secs: 20,
            ping_timeout_secs: 3,
        }
    }
}

impl DbConfig {
    /// Create a new DbConfig from environment variables
    ///
    /// `DATABASE_URL` is required; every other key falls back to the default.
    pub fn from_env(service_name: &str) -> Result<Self, EnvVarError> {
        let defaults = Self::default();

        Ok(Self {
            service_name: service_name.to_string(),
            database_url: parse_env_required("DATABASE_URL")?,
            pool_size: parse_env_with_default("DB_POOL_SIZE", defaults.pool_size),
            max_overflow: parse_env_with_default("DB_MAX_OVERFLOW", defaults.max_overflow),
            connect_timeout_secs: parse_env_with_default(
                "DB_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout_secs,
            ),
            acquire_timeout_secs: parse_env_with_default(
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout_secs,
            ),
            idle_timeout_secs: parse_env_with_default(
                "DB_IDLE_TIMEOUT_SECS",
                defaults.idle_timeout_secs,
            ),
            max_lifetime_secs: parse_env_with_default(
                "DB_MAX_LIFETIME_SECS",
                defaults.max_lifetime_secs,
            ),
            busy_timeout_secs: parse_env_with_default(
                "DB_BUSY_TIMEOUT_SECS",
                defaults.busy_timeout_secs,
            ),
            ping_timeout_secs: parse_env_with_default(
                "DB_PING_TIMEOUT_SECS",
                defaults.ping_timeout_secs,
            ),
        })
    }

    /// Total capacity of the pool
    pub fn max_connections(&self) -> u32 {
        (self.pool_size + self.max_overflow).max(1)
    }

    /// Log pool configuration details
    pub fn log_config(&self) {
        info!(
            "Database Pool Configuration: \
             pool_size={}, max_overflow={}, max_connections={}, \
             connect_timeout={}s, acquire_timeout={}s, idle_timeout={}s, max_lifetime={}s",
            self.pool_size,
            self.max_overflow,
            self.max_connections(),
            self.connect_timeout_secs,
            self.acquire_timeout_secs,
            self.idle_timeout_secs,
            self.max_lifetime_secs
        );
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions, sqlx::Error> {
        Ok(SqliteConnectOptions::from_str(&self.database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("cache_size", SQLITE_CACHE_SIZE_PAGES)
            .pragma("temp_store", "MEMORY")
            .busy_timeout(Duration::from_secs(self.busy_timeout_secs)))
    }
}

/// Create the connection pool, verify it, and start metrics monitoring.
///
/// Any failure here is meant to halt startup.
pub async fn create_pool(config: DbConfig) -> Result<Database, DbError> {
    debug!(
        "Creating database pool: service={}, max={}, min={}, \
         acquire_timeout={}s, verify_timeout={}s, idle_timeout={}s",
        config.service_name,
        config.max_connections(),
        config.pool_size,
        config.acquire_timeout_secs,
        config.connect_timeout_secs,
        config.idle_timeout_secs
    );

    let options = config
        .connect_options()
        .map_err(|e| DbError::Connect(e.to_string()))?;

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections())
        .min_connections(config.pool_size.min(config.max_connections()))
        // Bounded wait for a free connection
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        // Pre-ping connections before handing them out
        .test_before_acquire(true)
        .connect_with(options)
        .await
        .map_err(|e| {
            error!(service = %config.service_name, error = %e, "Database pool creation failed");
            DbError::Connect(e.to_string())
        })?;

    // Verify connection with connect timeout
    match tokio::time::timeout(
        Duration::from_secs(config.connect_timeout_secs),
        sqlx::query("SELECT 1").execute(&pool),
    )
    .await
    {
        Ok(Ok(_)) => {
            info!(
                service = %config.service_name,
                "Database pool created and verified successfully"
            );

            update_pool_metrics(&pool, &config.service_name);

            {
                let pool_clone = pool.clone();
                let service = config.service_name.clone();
                tokio::spawn(async move {
                    let mut interval =
                        tokio::time::interval(Duration::from_secs(METRICS_REFRESH_SECS));
                    loop {
                        interval.tick().await;
                        if pool_clone.is_closed() {
                            break;
                        }
                        update_pool_metrics(&pool_clone, &service);
                    }
                });
            }

            Ok(Database::new(
                pool,
                &config.service_name,
                Duration::from_secs(config.acquire_timeout_secs),
                Duration::from_secs(config.ping_timeout_secs),
            ))
        }
        Ok(Err(e)) => {
            error!(
                service = %config.service_name,
                error = %e,
                "Database connection verification failed"
            );
            Err(DbError::Connect(e.to_string()))
        }
        Err(_) => {
            error!(
                service = %config.service_name,
                timeout_secs = config.connect_timeout_secs,
                "Database connection verification timeout"
            );
            Err(DbError::Connect("database verification timeout".to_string()))
        }
    }
}
