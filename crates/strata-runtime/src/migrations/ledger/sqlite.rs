use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use tracing::{debug, warn};

use strata_core::config::DEFAULT_STALE_LOCK_SECS;
use strata_core::error::{Result, StrataError};
use strata_core::migration::{AppliedRecord, BatchNumber, BoxFuture, LedgerStore};

use super::checked_table_name;

/// Ledger kept in a SQLite table.
///
/// SQLite has no advisory locks; the lock is a single-row table whose row
/// exists while a run is in progress. A process that dies mid-run leaves the
/// row behind. Once the row is older than [`stale_after`](Self::stale_after)
/// the next run takes it over; before that, `force_unlock` clears it.
pub struct SqliteLedger {
    pool: SqlitePool,
    table: String,
    lock_table: String,
    stale_after: Duration,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool, table: &str) -> Result<Self> {
        let table = checked_table_name(table)?;
        Ok(Self {
            pool,
            lock_table: format!("{}_lock", table),
            table,
            stale_after: Duration::from_secs(DEFAULT_STALE_LOCK_SECS),
        })
    }

    /// Age after which an unreleased lock row is treated as abandoned.
    pub fn stale_after(mut self, after: Duration) -> Self {
        self.stale_after = after;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StrataError::Database(format!("Failed to inspect table {}: {}", name, e)))?;
        Ok(count > 0)
    }

    /// Insert the lock row; false when it is already there.
    async fn insert_lock_row(&self) -> Result<bool> {
        let insert = format!(
            "INSERT OR IGNORE INTO {} (id, locked_at) VALUES (1, ?)",
            self.lock_table
        );
        let result = sqlx::query(&insert)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                StrataError::Database(format!("Failed to acquire migration lock: {}", e))
            })?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete the lock row if it is older than `stale_after`.
    ///
    /// Returns false when the row belongs to a run that may still be alive.
    async fn clear_stale_lock(&self) -> Result<bool> {
        let select = format!("SELECT locked_at FROM {} WHERE id = 1", self.lock_table);
        let held: Option<String> = sqlx::query_scalar(&select)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StrataError::Database(format!("Failed to read migration lock: {}", e)))?;

        let Some(held) = held else {
            return Ok(true);
        };

        let stale = match DateTime::parse_from_rfc3339(&held) {
            Ok(locked_at) => Utc::now()
                .signed_duration_since(locked_at.with_timezone(&Utc))
                .to_std()
                .map(|age| age > self.stale_after)
                .unwrap_or(false),
            Err(_) => true,
        };
        if !stale {
            return Ok(false);
        }

        // Only the row that was judged stale; a fresh holder keeps its lock.
        let delete = format!(
            "DELETE FROM {} WHERE id = 1 AND locked_at = ?",
            self.lock_table
        );
        let result = sqlx::query(&delete)
            .bind(&held)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                StrataError::Database(format!("Failed to clear stale migration lock: {}", e))
            })?;
        if result.rows_affected() == 1 {
            warn!(
                "Took over migration lock taken at {} and never released",
                held
            );
        }
        Ok(true)
    }
}

impl LedgerStore for SqliteLedger {
    fn prepare(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let sql = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    identifier TEXT NOT NULL UNIQUE,
                    batch INTEGER NOT NULL,
                    applied_at TEXT NOT NULL
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
            if !self.exists(&self.table).await? {
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
                "INSERT INTO {} (identifier, batch, applied_at) VALUES (?, ?, ?)",
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
            let sql = format!("DELETE FROM {} WHERE identifier = ?", self.table);
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
            debug!("Acquiring migration lock {}...", self.lock_table);
            let create = format!(
                "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY CHECK (id = 1), locked_at TEXT NOT NULL)",
                self.lock_table
            );
            sqlx::query(&create).execute(&self.pool).await.map_err(|e| {
                StrataError::Database(format!("Failed to create lock table: {}", e))
            })?;

            let acquired = self.insert_lock_row().await?
                || (self.clear_stale_lock().await? && self.insert_lock_row().await?);
            if !acquired {
                return Err(StrataError::LockContention);
            }
            debug!("Migration lock acquired");
            Ok(())
        })
    }

    fn unlock(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let sql = format!("DELETE FROM {} WHERE id = 1", self.lock_table);
            sqlx::query(&sql).execute(&self.pool).await.map_err(|e| {
                StrataError::Database(format!("Failed to release migration lock: {}", e))
            })?;
            debug!("Migration lock released");
            Ok(())
        })
    }

    fn force_unlock(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            if !self.exists(&self.lock_table).await? {
                return Ok(false);
            }
            let sql = format!("DELETE FROM {} WHERE id = 1", self.lock_table);
            let result = sqlx::query(&sql).execute(&self.pool).await.map_err(|e| {
                StrataError::Database(format!("Failed to clear migration lock: {}", e))
            })?;
            let cleared = result.rows_affected() == 1;
            if cleared {
                warn!("Migration lock {} cleared by force", self.lock_table);
            }
            Ok(cleared)
        })
    }
}
