use sqlx::sqlite::SqlitePool;
use tracing::debug;

use strata_core::error::{Result, StrataError};
use strata_core::migration::{BoxFuture, Direction, SchemaExecutor};
use strata_core::schema::SchemaOperation;

use super::{preview_for, statements_for, Dialect};

/// Runs schema operations against SQLite, one transaction per unit.
pub struct SqliteSchemaExecutor {
    pool: SqlitePool,
}

impl SqliteSchemaExecutor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SchemaExecutor for SqliteSchemaExecutor {
    fn name(&self) -> &str {
        Dialect::Sqlite.name()
    }

    fn execute<'a>(
        &'a self,
        identifier: &'a str,
        direction: Direction,
        operations: &'a [SchemaOperation],
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let statements = statements_for(Dialect::Sqlite, identifier, operations)?;

            let mut tx = self.pool.begin().await.map_err(|e| {
                StrataError::Database(format!("Failed to begin transaction: {}", e))
            })?;

            for statement in &statements {
                debug!("[{} {}] {}", identifier, direction, statement);
                sqlx::query(statement)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StrataError::Database(format!("{} (statement: {})", e, statement)))?;
            }

            tx.commit().await.map_err(|e| {
                StrataError::Database(format!("Failed to commit transaction: {}", e))
            })?;
            Ok(())
        })
    }

    fn preview(&self, operations: &[SchemaOperation]) -> Result<Vec<String>> {
        preview_for(Dialect::Sqlite, operations)
    }
}
