//! SQL schema executors.

mod dialect;
mod postgres;
mod sqlite;

pub use dialect::{quote, Capabilities, Dialect, Rendered};
pub use postgres::PgSchemaExecutor;
pub use sqlite::SqliteSchemaExecutor;

use tracing::warn;

use strata_core::error::Result;
use strata_core::schema::SchemaOperation;

/// Render a unit's operations to the statements that will run, warning about
/// anything the dialect had to drop.
fn statements_for(
    dialect: Dialect,
    identifier: &str,
    operations: &[SchemaOperation],
) -> Result<Vec<String>> {
    let mut statements = Vec::new();
    for op in operations {
        let rendered = dialect.render(op)?;
        if let Some(reason) = rendered.degraded {
            warn!("Migration '{}': {}", identifier, reason);
        }
        statements.extend(rendered.statements);
    }
    Ok(statements)
}

/// Like [`statements_for`], with degraded operations shown as SQL comments.
fn preview_for(dialect: Dialect, operations: &[SchemaOperation]) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for op in operations {
        let rendered = dialect.render(op)?;
        if let Some(reason) = rendered.degraded {
            lines.push(format!("-- {}", reason));
        }
        lines.extend(rendered.statements);
    }
    Ok(lines)
}
