use sqlx::postgres::PgPool;
use tracing::debug;

use strata_core::error::{Result, StrataError};
use strata_core::migration::{BoxFuture, Direction, SchemaExecutor};
use strata_core::schema::SchemaOperation;

use super::{preview_for, statements_for, Dialect};

/// Runs schema operations against PostgreSQL.
///
/// Each unit's statements run inside one transaction, so a failing unit
/// leaves no partial schema behind.
pub struct PgSchemaExecutor {
    pool: PgPool,
}

impl PgSchemaExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SchemaExecutor for PgSchemaExecutor {
    fn name(&self) -> &str {
        Dialect::Postgres.name()
    }

    fn execute<'a>(
        &'a self,
        identifier: &'a str,
        direction: Direction,
        operations: &'a [SchemaOperation],
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let statements = statements_for(Dialect::Postgres, identifier, operations)?;

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
        preview_for(Dialect::Postgres, operations)
    }
}
