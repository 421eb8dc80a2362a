use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::warn;

use strata_core::error::{Result, StrataError};

/// Environment variable pointing PostgreSQL tests at a disposable database.
pub const TEST_DATABASE_URL_ENV: &str = "TEST_DATABASE_URL";

/// A PostgreSQL database for integration tests.
///
/// Tests that need one call [`postgres_from_env`](Self::postgres_from_env) and
/// return early when it yields `None`, so the suite still passes on machines
/// without PostgreSQL.
pub struct TestDatabase {
    pool: PgPool,
}

impl TestDatabase {
    pub async fn postgres_from_env() -> Option<Self> {
        let url = std::env::var(TEST_DATABASE_URL_ENV).ok()?;

        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await
        {
            Ok(pool) => Some(Self { pool }),
            Err(e) => {
                warn!("Skipping PostgreSQL test, cannot connect: {}", e);
                None
            }
        }
    }

    pub fn pg_pool(&self) -> &PgPool {
        &self.pool
    }
}

/// A private in-memory SQLite database.
///
/// Every connection to `sqlite::memory:` opens its own database, so the pool
/// is pinned to a single connection that never expires.
pub async fn sqlite_memory_pool() -> Result<SqlitePool> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .map_err(|e| StrataError::Database(format!("Failed to open in-memory SQLite: {}", e)))
}
