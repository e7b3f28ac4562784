//! Database configuration.
//!
//! Connection settings are loaded from `CARELINE_DB_*` environment variables
//! with development defaults. The pool is created once at process start by
//! the composition root and handed to [`crate::Db`]; nothing in this crate
//! lazily initializes global connection state.

use crate::error::{DbError, DbResult};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use std::time::Duration;
use tokio_postgres::NoTls;

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "careline".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CARELINE_DB_HOST` (default: localhost)
    /// - `CARELINE_DB_PORT` (default: 5432)
    /// - `CARELINE_DB_NAME` (default: careline)
    /// - `CARELINE_DB_USER` (default: postgres)
    /// - `CARELINE_DB_PASSWORD` (default: empty)
    /// - `CARELINE_DB_POOL_SIZE` (default: 16)
    /// - `CARELINE_DB_TIMEOUT` seconds (default: 30)
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("CARELINE_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("CARELINE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("CARELINE_DB_NAME").unwrap_or_else(|_| "careline".to_string()),
            user: std::env::var("CARELINE_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("CARELINE_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("CARELINE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("CARELINE_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> DbResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_config = PoolConfig::new(self.max_size);
        pool_config.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_config);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DbError::InvalidSettings(format!("failed to create pool: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_local_dev() {
        let config = DbConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.dbname, "careline");
        assert_eq!(config.max_size, 16);
    }
}
