//! PostgreSQL client implementation
//!
//! This module owns the connection pool shared by [`PostgreSQLStore`] and
//! [`PostgreSQLSession`].
//!
//! [`PostgreSQLStore`]: crate::adapters::postgresql::PostgreSQLStore
//! [`PostgreSQLSession`]: crate::adapters::postgresql::PostgreSQLSession

use crate::adapters::postgresql::sql::map_pg_error;
use crate::config::schema::PostgreSQLConfig;
use crate::domain::{AnonymousError, Result, StoreError, StoreResult};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::config::SslMode;

/// PostgreSQL client for Anonymous
///
/// Provides pooled connections configured with the TLS mode and timeouts from
/// [`PostgreSQLConfig`].
pub struct PostgreSQLClient {
    /// Connection pool
    pool: Pool,

    /// Configuration
    config: PostgreSQLConfig,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// The pool connects lazily; call [`test_connection`](Self::test_connection)
    /// to fail fast.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid or the TLS
    /// connector or pool cannot be built.
    pub fn new(config: PostgreSQLConfig) -> Result<Self> {
        let mut pg_config: tokio_postgres::Config =
            config.connection_string.expose_secret().parse().map_err(|e| {
                AnonymousError::Configuration(format!("Invalid PostgreSQL connection string: {e}"))
            })?;
        pg_config.ssl_mode(ssl_mode(&config.ssl_mode));

        let tls = TlsConnector::builder()
            .danger_accept_invalid_certs(!config.ssl_mode.starts_with("verify-"))
            .danger_accept_invalid_hostnames(config.ssl_mode != "verify-full")
            .build()
            .map_err(|e| {
                AnonymousError::Configuration(format!("Failed to build TLS connector: {e}"))
            })?;

        let manager = Manager::from_config(
            pg_config,
            MakeTlsConnector::new(tls),
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let timeout = Some(Duration::from_secs(config.connection_timeout_seconds));
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .wait_timeout(timeout)
            .create_timeout(timeout)
            .recycle_timeout(timeout)
            .build()
            .map_err(|e| {
                AnonymousError::Configuration(format!("Failed to create connection pool: {e}"))
            })?;

        Ok(Self { pool, config })
    }

    /// Test the connection to PostgreSQL
    ///
    /// Attempts to get a connection from the pool and execute a simple query.
    pub async fn test_connection(&self) -> StoreResult<()> {
        let client = self.get_connection().await?;

        client.query_one("SELECT 1", &[]).await.map_err(map_pg_error)?;

        tracing::info!("PostgreSQL connection test successful");
        Ok(())
    }

    /// Get a connection from the pool
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionFailed`] if a connection cannot be obtained.
    pub async fn get_connection(&self) -> StoreResult<Object> {
        self.pool.get().await.map_err(|e| {
            StoreError::ConnectionFailed(format!("Failed to get connection from pool: {e}"))
        })
    }

    /// Statement timeout applied inside every transaction, in milliseconds
    pub fn statement_timeout_ms(&self) -> u64 {
        self.config.statement_timeout_seconds * 1000
    }

    /// Get the connection string (without password)
    pub fn connection_string_safe(&self) -> String {
        redact_connection_string(self.config.connection_string.expose_secret().as_ref())
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}

/// Map the libpq-style `sslmode` names onto what tokio-postgres supports
fn ssl_mode(mode: &str) -> SslMode {
    match mode {
        "disable" => SslMode::Disable,
        "allow" | "prefer" => SslMode::Prefer,
        _ => SslMode::Require,
    }
}

fn redact_connection_string(connection_string: &str) -> String {
    match connection_string.rsplit_once('@') {
        Some((_, host)) => format!("postgresql://***@{host}"),
        None => "postgresql://***".to_string(),
    }
}
