use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool};
use sqlx::Connection;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use strata_core::error::{Result, StrataError};
use strata_core::migration::{AppliedRecord, BatchNumber, BoxFuture, LedgerStore};

use super::checked_table_name;

/// Ledger kept in a PostgreSQL table, guarded by a session advisory lock.
///
/// The lock is taken on a connection detached from the pool. Advisory locks
/// belong to the session, so if the process dies the server drops the
/// connection and the lock with it.
pub struct PgLedger {
    pool: PgPool,
    table: String,
    lock_id: i64,
    lock_conn: Mutex<Option<PgConnection>>,
}

impl PgLedger {
    pub fn new(pool: PgPool, table: &str, lock_id: i64) -> Result<Self> {
        Ok(Self {
            pool,
            table: checked_table_name(table)?,
            lock_id,
            lock_conn: Mutex::new(None),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    async fn table_exists(&self) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT to_regclass($1) IS NOT NULL")
            .bind(&self.table)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StrataError::Database(format!("Failed to inspect ledger table: {}", e)))
    }
}

impl LedgerStore for PgLedger {
    fn prepare(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let sql = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id BIGSERIAL PRIMARY KEY,
                    identifier VARCHAR(255) UNIQUE NOT NULL,
                    batch BIGINT NOT NULL,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                self.table
            );
            sqlx::query(&sql).execute(&self.pool).await.map_err(|e| {
                StrataError::Database(format!("Failed to create ledger table: {}", e))
            })?;
            Ok(())
        })
    }

    fn records(&self) -> BoxFuture<'_, Result<Vec<AppliedRecord>>> {
        Box::pin(async move {
            if !self.table_exists().await? {
                debug!("Ledger table {} does not exist yet", self.table);
                return Ok(Vec::new());
            }

            let sql = format!(
                "SELECT identifier, batch, applied_at FROM {} ORDER BY batch, identifier",
                self.table
            );
            let rows: Vec<(String, i64, DateTime<Utc>)> = sqlx::query_as(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    StrataError::Database(format!("Failed to read applied migrations: {}", e))
                })?;

            Ok(rows
                .into_iter()
                .map(|(identifier, batch, applied_at)| AppliedRecord {
                    identifier,
                    batch: BatchNumber::new(batch),
                    applied_at,
                })
                .collect())
        })
    }

    fn record<'a>(&'a self, record: &'a AppliedRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let sql = format!(
                "INSERT INTO {} (identifier, batch, applied_at) VALUES ($1, $2, $3)",
                self.table
            );
            sqlx::query(&sql)
                .bind(&record.identifier)
                .bind(record.batch.as_i64())
                .bind(record.applied_at)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    StrataError::Database(format!(
                        "Failed to record migration '{}': {}",
                        record.identifier, e
                    ))
                })?;
            Ok(())
        })
    }

    fn remove<'a>(&'a self, identifier: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let sql = format!("DELETE FROM {} WHERE identifier = $1", self.table);
            sqlx::query(&sql)
                .bind(identifier)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    StrataError::Database(format!(
                        "Failed to remove migration '{}' from ledger: {}",
                        identifier, e
                    ))
                })?;
            Ok(())
        })
    }

    fn try_lock(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            debug!("Acquiring migration lock {}...", self.lock_id);
            let mut slot = self.lock_conn.lock().await;
            if slot.is_some() {
                return Err(StrataError::LockContention);
            }

            let mut conn = self
                .pool
                .acquire()
                .await
                .map_err(|e| {
                    StrataError::Database(format!("Failed to acquire lock connection: {}", e))
                })?
                .detach();

            let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
                .bind(self.lock_id)
                .fetch_one(&mut conn)
                .await
                .map_err(|e| {
                    StrataError::Database(format!("Failed to acquire migration lock: {}", e))
                })?;

            if !acquired {
                if let Err(e) = conn.close().await {
                    warn!("Failed to close lock connection: {}", e);
                }
                return Err(StrataError::LockContention);
            }

            *slot = Some(conn);
            debug!("Migration lock acquired");
            Ok(())
        })
    }

    fn unlock(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let Some(mut conn) = self.lock_conn.lock().await.take() else {
                return Ok(());
            };

            let released = sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
                .bind(self.lock_id)
                .fetch_one(&mut conn)
                .await;

            // Closing ends the session, which frees the lock even if the unlock failed.
            if let Err(e) = conn.close().await {
                warn!("Failed to close lock connection: {}", e);
            }

            match released {
                Ok(true) => {
                    debug!("Migration lock released");
                    Ok(())
                }
                Ok(false) => {
                    warn!("Migration lock {} was not held at release", self.lock_id);
                    Ok(())
                }
                Err(e) => Err(StrataError::Database(format!(
                    "Failed to release migration lock: {}",
                    e
                ))),
            }
        })
    }

    fn force_unlock(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            debug!(
                "Advisory lock {} ends with its holder's session, nothing to clear",
                self.lock_id
            );
            Ok(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestDatabase;

    #[tokio::test]
    async fn test_pg_ledger_lifecycle() {
        let Some(db) = TestDatabase::postgres_from_env().await else {
            return;
        };
        let pool = db.pg_pool().clone();
        let table = format!("strata_ledger_test_{}", std::process::id());

        let ledger = PgLedger::new(pool.clone(), &table, 0x7e57).unwrap();
        assert!(ledger.records().await.unwrap().is_empty());

        ledger.prepare().await.unwrap();
        ledger
            .record(&AppliedRecord::new("2025_01_01_000000_a", BatchNumber::FIRST))
            .await
            .unwrap();
        assert_eq!(ledger.records().await.unwrap().len(), 1);

        ledger.try_lock().await.unwrap();
        let rival = PgLedger::new(pool.clone(), &table, 0x7e57).unwrap();
        assert!(matches!(
            rival.try_lock().await,
            Err(StrataError::LockContention)
        ));
        ledger.unlock().await.unwrap();
        rival.try_lock().await.unwrap();
        rival.unlock().await.unwrap();
        assert!(!rival.force_unlock().await.unwrap());

        ledger.remove("2025_01_01_000000_a").await.unwrap();
        assert!(ledger.records().await.unwrap().is_empty());

        sqlx::query(&format!("DROP TABLE {}", table))
            .execute(&pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejects_bad_table_name() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/strata")
            .unwrap();
        assert!(matches!(
            PgLedger::new(pool, "bad-name", 1),
            Err(StrataError::Config(_))
        ));
    }
}
