use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

use super::table::{ColumnDef, ForeignKey, IndexDef, TableDef};
use super::types::SqlType;

/// One abstract schema change.
///
/// Units carry sequences of these; a schema executor translates them into
/// statements for its own store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaOperation {
    CreateTable(TableDef),
    DropTable {
        table: String,
        /// Emit `DROP TABLE IF EXISTS`.
        #[serde(default)]
        if_exists: bool,
    },
    AddColumn {
        table: String,
        column: ColumnDef,
    },
    DropColumn {
        table: String,
        column: String,
    },
    AlterColumnType {
        table: String,
        column: String,
        #[serde(rename = "type")]
        sql_type: SqlType,
    },
    AddIndex {
        table: String,
        index: IndexDef,
    },
    DropIndex {
        table: String,
        name: String,
    },
    AddForeignKey {
        table: String,
        foreign_key: ForeignKey,
    },
    DropForeignKey {
        table: String,
        name: String,
    },
    AddUnique {
        table: String,
        columns: Vec<String>,
        #[serde(default)]
        name: Option<String>,
    },
    DropUnique {
        table: String,
        name: String,
    },
    AddSoftDelete {
        table: String,
        #[serde(default = "default_soft_delete_column")]
        column: String,
    },
    DropSoftDelete {
        table: String,
        #[serde(default = "default_soft_delete_column")]
        column: String,
    },
    /// Store-specific SQL, passed through verbatim.
    Raw {
        sql: String,
    },
}

fn default_soft_delete_column() -> String {
    "deleted_at".to_string()
}

impl SchemaOperation {
    pub fn drop_table(table: impl Into<String>) -> Self {
        SchemaOperation::DropTable {
            table: table.into(),
            if_exists: false,
        }
    }

    pub fn drop_table_if_exists(table: impl Into<String>) -> Self {
        SchemaOperation::DropTable {
            table: table.into(),
            if_exists: true,
        }
    }

    /// Table touched by this operation, if it names one.
    pub fn table(&self) -> Option<&str> {
        match self {
            SchemaOperation::CreateTable(def) => Some(&def.name),
            SchemaOperation::DropTable { table, .. }
            | SchemaOperation::AddColumn { table, .. }
            | SchemaOperation::DropColumn { table, .. }
            | SchemaOperation::AlterColumnType { table, .. }
            | SchemaOperation::AddIndex { table, .. }
            | SchemaOperation::DropIndex { table, .. }
            | SchemaOperation::AddForeignKey { table, .. }
            | SchemaOperation::DropForeignKey { table, .. }
            | SchemaOperation::AddUnique { table, .. }
            | SchemaOperation::DropUnique { table, .. }
            | SchemaOperation::AddSoftDelete { table, .. }
            | SchemaOperation::DropSoftDelete { table, .. } => Some(table),
            SchemaOperation::Raw { .. } => None,
        }
    }

    /// Reject operations no store could run: blank names, empty column lists,
    /// tables without columns, empty raw SQL.
    pub fn validate(&self) -> Result<()> {
        if let Some(table) = self.table() {
            if table.trim().is_empty() {
                return Err(invalid(format!("{} has no table name", self.describe())));
            }
        }

        match self {
            SchemaOperation::CreateTable(def) => {
                let columns = def.all_columns();
                if columns.is_empty() {
                    return Err(invalid(format!("create table {} has no columns", def.name)));
                }
                for (i, column) in columns.iter().enumerate() {
                    if column.name.trim().is_empty() {
                        return Err(invalid(format!("create table {} has an unnamed column", def.name)));
                    }
                    if columns[..i].iter().any(|c| c.name == column.name) {
                        return Err(invalid(format!(
                            "create table {} declares column {} twice",
                            def.name, column.name
                        )));
                    }
                }
                for index in &def.indexes {
                    require_columns(&def.name, &index.columns)?;
                }
                for foreign_key in &def.foreign_keys {
                    require_columns(&def.name, &foreign_key.columns)?;
                }
            }
            SchemaOperation::AddIndex { table, index } => require_columns(table, &index.columns)?,
            SchemaOperation::AddForeignKey { table, foreign_key } => {
                require_columns(table, &foreign_key.columns)?
            }
            SchemaOperation::AddUnique { table, columns, .. } => require_columns(table, columns)?,
            SchemaOperation::AddColumn { table, column } if column.name.trim().is_empty() => {
                return Err(invalid(format!("add column on {} has no column name", table)));
            }
            SchemaOperation::Raw { sql } if sql.trim().is_empty() => {
                return Err(invalid("raw operation has no SQL".to_string()));
            }
            _ => {}
        }
        Ok(())
    }

    /// Short human-readable summary for logs and previews.
    pub fn describe(&self) -> String {
        match self {
            SchemaOperation::CreateTable(def) => format!("create table {}", def.name),
            SchemaOperation::DropTable { table, if_exists } => {
                if *if_exists {
                    format!("drop table {} if exists", table)
                } else {
                    format!("drop table {}", table)
                }
            }
            SchemaOperation::AddColumn { table, column } => {
                format!("add column {}.{} {}", table, column.name, column.sql_type)
            }
            SchemaOperation::DropColumn { table, column } => {
                format!("drop column {}.{}", table, column)
            }
            SchemaOperation::AlterColumnType {
                table,
                column,
                sql_type,
            } => format!("alter column {}.{} type {}", table, column, sql_type),
            SchemaOperation::AddIndex { table, index } => {
                format!("add index {} on {}", index.name_for(table), table)
            }
            SchemaOperation::DropIndex { table, name } => {
                format!("drop index {} on {}", name, table)
            }
            SchemaOperation::AddForeignKey { table, foreign_key } => format!(
                "add foreign key {} on {} -> {}",
                foreign_key.name_for(table),
                table,
                foreign_key.references
            ),
            SchemaOperation::DropForeignKey { table, name } => {
                format!("drop foreign key {} on {}", name, table)
            }
            SchemaOperation::AddUnique { table, columns, .. } => {
                format!("add unique ({}) on {}", columns.join(", "), table)
            }
            SchemaOperation::DropUnique { table, name } => {
                format!("drop unique {} on {}", name, table)
            }
            SchemaOperation::AddSoftDelete { table, column } => {
                format!("add soft delete marker {}.{}", table, column)
            }
            SchemaOperation::DropSoftDelete { table, column } => {
                format!("drop soft delete marker {}.{}", table, column)
            }
            SchemaOperation::Raw { sql } => {
                let first_line = sql.trim().lines().next().unwrap_or_default();
                format!("raw sql: {}", first_line)
            }
        }
    }
}

fn invalid(message: String) -> StrataError {
    StrataError::InvalidMigration(message)
}

fn require_columns(table: &str, columns: &[String]) -> Result<()> {
    if columns.is_empty() || columns.iter().any(|c| c.trim().is_empty()) {
        return Err(invalid(format!("column list on {} is empty", table)));
    }
    Ok(())
}
