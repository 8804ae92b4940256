use sha2::{Digest, Sha256};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from DatabaseManager and the repositories built on it
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid tenant database name: {0}")]
    InvalidTenantName(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// True for failures that mean the database could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DatabaseError::Sqlx(
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
            )
        )
    }

    /// Postgres SQLSTATE 23503: the row points at a parent that does not exist
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            DatabaseError::Sqlx(sqlx::Error::Database(db)) => db.code().as_deref() == Some("23503"),
            _ => false,
        }
    }
}

/// Connection pool manager for the main and tenant databases.
///
/// Built once at startup and shared through application state; pools are
/// created lazily per database name and cached.
pub struct DatabaseManager {
    base_url: String,
    max_connections: u32,
    acquire_timeout: Duration,
    log_queries: bool,
    pools: RwLock<HashMap<String, PgPool>>,
}

impl DatabaseManager {
    /// Name of the main database used for health checks
    pub const SYSTEM_DB_NAME: &'static str = "portal_main";

    pub fn new(base_url: impl Into<String>, config: &DatabaseConfig) -> Self {
        Self {
            base_url: base_url.into(),
            max_connections: config.max_connections,
            acquire_timeout: Duration::from_secs(config.connection_timeout),
            log_queries: config.enable_query_logging,
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Build from DATABASE_URL
    pub fn from_env(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let base_url = std::env::var("DATABASE_URL")
            .map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;
        Ok(Self::new(base_url, config))
    }

    /// Get main system database pool
    pub async fn main_pool(&self) -> Result<PgPool, DatabaseError> {
        self.get_pool(Self::SYSTEM_DB_NAME).await
    }

    /// Get tenant database pool (validated name)
    pub async fn tenant_pool(&self, database_name: &str) -> Result<PgPool, DatabaseError> {
        if !Self::is_valid_db_name(database_name) {
            return Err(DatabaseError::InvalidTenantName(database_name.to_string()));
        }
        self.get_pool(database_name).await
    }

    /// Get existing pool or create a new one lazily
    async fn get_pool(&self, database_name: &str) -> Result<PgPool, DatabaseError> {
        // Fast path: try read lock
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(database_name) {
                return Ok(pool.clone());
            }
        }

        let connection_string = self.build_connection_string(database_name)?;
        let mut options = PgConnectOptions::from_str(&connection_string)?;
        if !self.log_queries {
            options = options.disable_statement_logging();
        }

        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect_with(options)
            .await?;

        // Another request may have raced us here; keep whichever landed first
        let mut pools = self.pools.write().await;
        let pool = pools
            .entry(database_name.to_string())
            .or_insert(pool)
            .clone();

        info!("Created database pool for: {}", database_name);
        Ok(pool)
    }

    /// Swap the database name into the path of the base URL
    fn build_connection_string(&self, database_name: &str) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(&self.base_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        url.set_path(&format!("/{}", database_name));
        Ok(url.into())
    }

    /// Pings the main pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        let pool = self.main_pool().await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    /// Close and remove all pools (e.g., on shutdown)
    pub async fn close_all(&self) {
        let mut pools = self.pools.write().await;
        for (name, pool) in pools.drain() {
            pool.close().await;
            info!("Closed database pool: {}", name);
        }
    }

    /// Tenant names map onto database names through a short SHA-256 prefix,
    /// so arbitrary tenant names always yield a valid identifier.
    pub fn tenant_database_name(tenant: &str) -> String {
        let hash = Sha256::digest(tenant.as_bytes());
        let hex = format!("{:x}", hash);
        format!("tenant_{}", &hex[..16])
    }

    /// Validate database names to prevent injection. Accepts:
    /// - exact "portal_main"
    /// - names starting with "tenant_" followed by [a-zA-Z0-9_]+
    pub fn is_valid_db_name(name: &str) -> bool {
        if name == Self::SYSTEM_DB_NAME {
            return true;
        }
        match name.strip_prefix("tenant_") {
            Some(rest) => !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
            None => false,
        }
    }
}
