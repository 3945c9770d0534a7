/// Database connection management with connection pooling
///
/// Provides the process-wide handle: a small SQLite pool plus the naming
/// policy and clock every mapped operation shares.

use crate::config::DatabaseConfig;
use crate::db::mapping::{validate_identifier, ModelShape, MonotonicClock, NameMapper, TableMapping};
use crate::error::{CrudError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::borrow::Cow;
use std::str::FromStr;
use std::sync::Arc;

/// Database wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: Arc<SqlitePool>,
    mapper: NameMapper,
    clock: Arc<MonotonicClock>,
}

impl Database {
    /// Open a database from configuration
    ///
    /// # Arguments
    /// * `config` - Connection URL, pool size and driver parameters
    /// * `mapper` - Naming policy for tables and columns
    ///
    /// # Returns
    /// * `Ok(Database)` - Successfully connected
    /// * `Err(CrudError::Connect)` - If the URL is malformed or the driver refuses
    ///
    /// # Examples
    /// ```no_run
    /// use crud_demo_lib::config::DatabaseConfig;
    /// use crud_demo_lib::db::{Database, NameMapper};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Database::connect(&DatabaseConfig::default(), NameMapper::Gonic).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(config: &DatabaseConfig, mapper: NameMapper) -> Result<Self> {
        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| CrudError::Connect(format!("{}: {}", config.url, e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        if !config.log_statements {
            options = options.disable_statement_logging();
        }

        // Driver parameters travel as pragmas
        for (key, value) in &config.params {
            validate_identifier(key)?;
            options = options.pragma(
                Cow::<'static, str>::Owned(key.clone()),
                Cow::<'static, str>::Owned(pragma_value(value)),
            );
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| CrudError::Connect(format!("{}: {}", config.url, e)))?;

        tracing::debug!(url = %config.url, max_connections = config.max_connections, "database connected");

        Ok(Self {
            pool: Arc::new(pool),
            mapper,
            clock: Arc::new(MonotonicClock::new()),
        })
    }

    /// Create a test database in memory
    ///
    /// Used for testing. A single connection keeps the in-memory database
    /// alive and shared for the whole test.
    #[cfg(test)]
    pub async fn new_test() -> Result<Self> {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..DatabaseConfig::default()
        };
        Self::connect(&config, NameMapper::Gonic).await
    }

    /// Get reference to the connection pool
    ///
    /// Used internally by query modules.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Resolve a shape with this handle's naming policy
    pub fn mapping(&self, shape: &ModelShape) -> Result<TableMapping> {
        TableMapping::resolve(shape, self.mapper)
    }

    pub(crate) fn clock(&self) -> &MonotonicClock {
        &self.clock
    }

    /// Close all connections in the pool
    ///
    /// Should be called on application shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get database statistics
    ///
    /// Returns information about the pool for debugging.
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let table_count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(DatabaseStats {
            total_tables: table_count.0,
            pool_size: self.pool.size(),
            idle_connections: self.pool.num_idle(),
        })
    }
}

/// Render a parameter value for `PRAGMA key = value`
///
/// Numbers and bare keywords (`WAL`, `NORMAL`, `ON`) pass through; anything
/// else becomes a single-quoted string literal.
fn pragma_value(value: &str) -> String {
    let value = value.trim();
    if value.parse::<f64>().is_ok() || validate_identifier(value).is_ok() {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "''"))
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub total_tables: i64,
    pub pool_size: u32,
    pub idle_connections: usize,
}
