use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Process-wide connection pool for the shared multi-tenant database.
///
/// All tenants live in one database; isolation comes from RLS policies plus
/// transaction-local tenant context, not from separate databases. The pool is
/// created lazily so the binary can start (and report degraded health) before
/// PostgreSQL is reachable.
pub struct DatabaseManager;

static POOL: OnceLock<PgPool> = OnceLock::new();

impl DatabaseManager {
    /// Get the shared pool, creating it on first use
    pub fn pool() -> Result<PgPool, DatabaseError> {
        if let Some(pool) = POOL.get() {
            return Ok(pool.clone());
        }

        let url = Self::database_url()?;
        let config = crate::config::config();

        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(Duration::from_secs(config.database.connection_timeout_secs))
            .connect_lazy(&url)
            .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;

        // Another caller may have won the race; use whichever pool got stored
        match POOL.set(pool) {
            Ok(()) => info!("Database pool initialized"),
            Err(_) => {}
        }
        Ok(POOL.get().expect("pool just initialized").clone())
    }

    fn database_url() -> Result<String, DatabaseError> {
        let base =
            std::env::var("DATABASE_URL").map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;
        // Validate early so a malformed URL fails at startup, not mid-request
        url::Url::parse(&base).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        Ok(base)
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check() -> Result<(), DatabaseError> {
        let pool = Self::pool()?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    /// Run schema migrations from ./migrations
    pub async fn run_migrations() -> Result<(), DatabaseError> {
        let pool = Self::pool()?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;
        info!("Database migrations complete");
        Ok(())
    }

    /// Quote SQL identifier to prevent injection in DDL statements
    pub fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Close the pool (e.g., on shutdown)
    pub async fn close() {
        if let Some(pool) = POOL.get() {
            pool.close().await;
            info!("Database pool closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers() {
        assert_eq!(DatabaseManager::quote_identifier("invoices"), "\"invoices\"");
        assert_eq!(
            DatabaseManager::quote_identifier("bad\"name"),
            "\"bad\"\"name\""
        );
    }
}
