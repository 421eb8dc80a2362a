//! Translating abstract schema operations into dialect-specific SQL.
//!
//! Each dialect advertises a capability set. Operations a dialect cannot
//! express are either rendered through a degraded fallback (reported back so
//! the executor can warn) or rejected as unsupported.

use strata_core::error::{Result, StrataError};
use strata_core::schema::{
    ColumnDef, ForeignKey, IndexDef, IndexKind, SchemaOperation, SqlType, TableDef,
};

use crate::migrations::statements::split_sql_statements;

/// Supported relational stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

/// What a dialect can do natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `ALTER TABLE .. ALTER COLUMN .. TYPE`.
    pub alter_column_type: bool,
    /// Adding and dropping constraints on existing tables.
    pub alter_constraints: bool,
    /// Full-text indexes.
    pub full_text_index: bool,
}

/// Statements for one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub statements: Vec<String>,
    /// Set when part of the operation was dropped or approximated.
    pub degraded: Option<String>,
}

impl Rendered {
    fn new(statements: Vec<String>) -> Self {
        Self {
            statements,
            degraded: None,
        }
    }

    fn single(statement: String) -> Self {
        Self::new(vec![statement])
    }

    fn skipped(reason: String) -> Self {
        Self {
            statements: Vec::new(),
            degraded: Some(reason),
        }
    }

    fn note(&mut self, reason: String) {
        self.degraded = Some(match self.degraded.take() {
            Some(existing) => format!("{}; {}", existing, reason),
            None => reason,
        });
    }
}

impl Dialect {
    /// Pick a dialect from a connection URL.
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Dialect::Postgres)
        } else if url.starts_with("sqlite:") {
            Some(Dialect::Sqlite)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Dialect::Postgres => Capabilities {
                alter_column_type: true,
                alter_constraints: true,
                full_text_index: true,
            },
            Dialect::Sqlite => Capabilities {
                alter_column_type: false,
                alter_constraints: false,
                full_text_index: false,
            },
        }
    }

    /// Native column type.
    pub fn column_type(&self, ty: &SqlType) -> String {
        match self {
            Dialect::Postgres => match ty {
                SqlType::Uuid => "UUID".to_string(),
                SqlType::Char(len) => format!("CHAR({})", len),
                SqlType::Varchar(None) | SqlType::Enum(_) => "VARCHAR(255)".to_string(),
                SqlType::Varchar(Some(len)) => format!("VARCHAR({})", len),
                SqlType::Text => "TEXT".to_string(),
                SqlType::Integer => "INTEGER".to_string(),
                SqlType::BigInt => "BIGINT".to_string(),
                SqlType::Boolean => "BOOLEAN".to_string(),
                SqlType::Timestamp => "TIMESTAMP".to_string(),
                SqlType::Timestamptz => "TIMESTAMPTZ".to_string(),
                SqlType::Date => "DATE".to_string(),
                SqlType::Decimal(p, s) => format!("DECIMAL({}, {})", p, s),
                SqlType::Json => "JSONB".to_string(),
                SqlType::Binary => "BYTEA".to_string(),
            },
            Dialect::Sqlite => match ty {
                SqlType::Integer | SqlType::BigInt | SqlType::Boolean => "INTEGER".to_string(),
                SqlType::Decimal(_, _) => "NUMERIC".to_string(),
                SqlType::Binary => "BLOB".to_string(),
                _ => "TEXT".to_string(),
            },
        }
    }

    /// Render one operation.
    pub fn render(&self, op: &SchemaOperation) -> Result<Rendered> {
        let caps = self.capabilities();

        let rendered = match op {
            SchemaOperation::CreateTable(def) => self.create_table(def)?,
            SchemaOperation::DropTable { table, if_exists } => Rendered::single(format!(
                "DROP TABLE {}{}",
                if *if_exists { "IF EXISTS " } else { "" },
                quote(table)
            )),
            SchemaOperation::AddColumn { table, column } => self.add_column(table, column)?,
            SchemaOperation::DropColumn { table, column } => Rendered::single(format!(
                "ALTER TABLE {} DROP COLUMN {}",
                quote(table),
                quote(column)
            )),
            SchemaOperation::AlterColumnType {
                table,
                column,
                sql_type,
            } => {
                if !caps.alter_column_type {
                    return Err(StrataError::Unsupported(format!(
                        "{} cannot change the type of {}.{}",
                        self.name(),
                        table,
                        column
                    )));
                }
                let native = self.column_type(sql_type);
                Rendered::single(format!(
                    "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
                    quote(table),
                    quote(column),
                    native,
                    quote(column),
                    native
                ))
            }
            SchemaOperation::AddIndex { table, index } => self.add_index(table, index),
            SchemaOperation::DropIndex { name, .. } => {
                Rendered::single(format!("DROP INDEX IF EXISTS {}", quote(name)))
            }
            SchemaOperation::AddForeignKey { table, foreign_key } => {
                if caps.alter_constraints {
                    Rendered::single(format!(
                        "ALTER TABLE {} ADD {}",
                        quote(table),
                        foreign_key_clause(table, foreign_key)
                    ))
                } else {
                    Rendered::skipped(format!(
                        "foreign key {} skipped: {} cannot add constraints to an existing table",
                        foreign_key.name_for(table),
                        self.name()
                    ))
                }
            }
            SchemaOperation::DropForeignKey { table, name } => {
                if caps.alter_constraints {
                    Rendered::single(format!(
                        "ALTER TABLE {} DROP CONSTRAINT {}",
                        quote(table),
                        quote(name)
                    ))
                } else {
                    Rendered::skipped(format!(
                        "foreign key {} left in place: {} cannot drop constraints",
                        name,
                        self.name()
                    ))
                }
            }
            SchemaOperation::AddUnique {
                table,
                columns,
                name,
            } => {
                let index = IndexDef {
                    columns: columns.clone(),
                    name: name.clone(),
                    unique: true,
                    kind: IndexKind::BTree,
                };
                let name = index.name_for(table);
                if caps.alter_constraints {
                    Rendered::single(format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
                        quote(table),
                        quote(&name),
                        column_list(columns)
                    ))
                } else {
                    Rendered::single(format!(
                        "CREATE UNIQUE INDEX {} ON {} ({})",
                        quote(&name),
                        quote(table),
                        column_list(columns)
                    ))
                }
            }
            SchemaOperation::DropUnique { table, name } => {
                if caps.alter_constraints {
                    Rendered::single(format!(
                        "ALTER TABLE {} DROP CONSTRAINT {}",
                        quote(table),
                        quote(name)
                    ))
                } else {
                    Rendered::single(format!("DROP INDEX IF EXISTS {}", quote(name)))
                }
            }
            SchemaOperation::AddSoftDelete { table, column } => Rendered::single(format!(
                "ALTER TABLE {} ADD COLUMN {} {} NULL",
                quote(table),
                quote(column),
                self.column_type(&SqlType::Timestamptz)
            )),
            SchemaOperation::DropSoftDelete { table, column } => Rendered::single(format!(
                "ALTER TABLE {} DROP COLUMN {}",
                quote(table),
                quote(column)
            )),
            SchemaOperation::Raw { sql } => Rendered::new(split_sql_statements(sql)),
        };

        Ok(rendered)
    }

    fn create_table(&self, def: &TableDef) -> Result<Rendered> {
        let columns = def.all_columns();
        if columns.is_empty() {
            return Err(StrataError::InvalidMigration(format!(
                "Table '{}' has no columns",
                def.name
            )));
        }

        let key_columns = columns.iter().filter(|c| c.primary_key).count();
        let mut parts = Vec::new();
        let mut primary_key = Vec::new();
        for column in &columns {
            let inline_pk = self.inline_primary_key(column)?;
            if inline_pk && key_columns > 1 {
                return Err(StrataError::Unsupported(format!(
                    "{} auto-increment column {}.{} cannot be part of a composite primary key",
                    self.name(),
                    def.name,
                    column.name
                )));
            }
            parts.push(self.column_definition(column, inline_pk));
            if column.primary_key && !inline_pk {
                primary_key.push(column.name.clone());
            }
        }
        if !primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", column_list(&primary_key)));
        }
        for foreign_key in &def.foreign_keys {
            parts.push(foreign_key_clause(&def.name, foreign_key));
        }

        let mut rendered = Rendered::single(format!(
            "CREATE TABLE {} ({})",
            quote(&def.name),
            parts.join(", ")
        ));

        for index in &def.indexes {
            let index_sql = self.add_index(&def.name, index);
            rendered.statements.extend(index_sql.statements);
            if let Some(reason) = index_sql.degraded {
                rendered.note(reason);
            }
        }

        Ok(rendered)
    }

    fn add_column(&self, table: &str, column: &ColumnDef) -> Result<Rendered> {
        if column.primary_key {
            return Err(StrataError::Unsupported(format!(
                "cannot add primary key column {}.{} to an existing table",
                table, column.name
            )));
        }

        // SQLite refuses UNIQUE on ADD COLUMN; a unique index is equivalent.
        let split_unique = column.unique && !self.capabilities().alter_constraints;
        let mut def = column.clone();
        if split_unique {
            def.unique = false;
        }

        let mut statements = vec![format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote(table),
            self.column_definition(&def, false)
        )];
        if split_unique {
            let index = IndexDef::on([column.name.clone()]).unique();
            statements.push(format!(
                "CREATE UNIQUE INDEX {} ON {} ({})",
                quote(&index.name_for(table)),
                quote(table),
                quote(&column.name)
            ));
        }

        Ok(Rendered::new(statements))
    }

    fn add_index(&self, table: &str, index: &IndexDef) -> Rendered {
        let name = index.name_for(table);
        match index.kind {
            IndexKind::FullText if !self.capabilities().full_text_index => Rendered::skipped(format!(
                "full-text index {} skipped: {} has no full-text index support",
                name,
                self.name()
            )),
            IndexKind::FullText => {
                let document = index
                    .columns
                    .iter()
                    .map(|c| format!("coalesce({}, '')", quote(c)))
                    .collect::<Vec<_>>()
                    .join(" || ' ' || ");
                Rendered::single(format!(
                    "CREATE INDEX {} ON {} USING GIN (to_tsvector('simple', {}))",
                    quote(&name),
                    quote(table),
                    document
                ))
            }
            IndexKind::BTree => Rendered::single(format!(
                "CREATE {}INDEX {} ON {} ({})",
                if index.unique { "UNIQUE " } else { "" },
                quote(&name),
                quote(table),
                column_list(&index.columns)
            )),
        }
    }

    /// SQLite auto-increment only exists as an inline `INTEGER PRIMARY KEY`.
    fn inline_primary_key(&self, column: &ColumnDef) -> Result<bool> {
        match (self, column.auto_increment) {
            (Dialect::Sqlite, true) if column.primary_key => Ok(true),
            (Dialect::Sqlite, true) => Err(StrataError::Unsupported(format!(
                "sqlite auto-increment column {} must be the primary key",
                column.name
            ))),
            _ => Ok(false),
        }
    }

    fn column_definition(&self, column: &ColumnDef, inline_pk: bool) -> String {
        let mut sql = format!("{} ", quote(&column.name));

        match (self, column.auto_increment) {
            (Dialect::Sqlite, true) if inline_pk => {
                sql.push_str("INTEGER PRIMARY KEY AUTOINCREMENT");
                return sql;
            }
            (Dialect::Postgres, true) => {
                sql.push_str(&self.column_type(&column.sql_type));
                sql.push_str(" GENERATED BY DEFAULT AS IDENTITY");
            }
            _ => sql.push_str(&self.column_type(&column.sql_type)),
        }

        if !column.nullable || column.primary_key {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        if column.unique {
            sql.push_str(" UNIQUE");
        }
        if let SqlType::Enum(values) = &column.sql_type {
            let allowed = values
                .iter()
                .map(|v| format!("'{}'", v.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" CHECK ({} IN ({}))", quote(&column.name), allowed));
        }

        sql
    }
}

fn foreign_key_clause(table: &str, fk: &ForeignKey) -> String {
    let mut sql = format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        quote(&fk.name_for(table)),
        column_list(&fk.columns),
        quote(&fk.references),
        column_list(&fk.referenced_columns)
    );
    if let Some(action) = fk.on_delete {
        sql.push_str(" ON DELETE ");
        sql.push_str(action.as_sql());
    }
    if let Some(action) = fk.on_update {
        sql.push_str(" ON UPDATE ");
        sql.push_str(action.as_sql());
    }
    sql
}

/// Quote an identifier.
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote(c))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::schema::ReferentialAction;

    fn sales_reps() -> TableDef {
        TableDef::new("sales_reps")
            .column(ColumnDef::new("id", SqlType::Char(36)).primary_key())
            .column(ColumnDef::new("territory", SqlType::Varchar(Some(255))).nullable())
            .column(
                ColumnDef::new(
                    "commission_tier",
                    SqlType::Enum(vec!["bronze".into(), "gold".into()]),
                )
                .default_value("'bronze'"),
            )
            .foreign_key(
                ForeignKey::new("parent_rep_id", "sales_reps").on_delete(ReferentialAction::SetNull),
            )
            .index(IndexDef::on(["territory"]))
    }

    #[test]
    fn test_dialect_from_url() {
        assert_eq!(Dialect::from_url("postgres://localhost/app"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_url("postgresql://localhost/app"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_url("sqlite::memory:"), Some(Dialect::Sqlite));
        assert_eq!(Dialect::from_url("mysql://localhost/app"), None);
    }

    #[test]
    fn test_postgres_create_table() {
        let rendered = Dialect::Postgres
            .render(&SchemaOperation::CreateTable(sales_reps()))
            .unwrap();

        assert!(rendered.degraded.is_none());
        assert_eq!(rendered.statements.len(), 2);
        assert_eq!(
            rendered.statements[0],
            "CREATE TABLE \"sales_reps\" (\"id\" CHAR(36) NOT NULL, \
             \"territory\" VARCHAR(255), \
             \"commission_tier\" VARCHAR(255) NOT NULL DEFAULT 'bronze' CHECK (\"commission_tier\" IN ('bronze', 'gold')), \
             PRIMARY KEY (\"id\"), \
             CONSTRAINT \"sales_reps_parent_rep_id_foreign\" FOREIGN KEY (\"parent_rep_id\") REFERENCES \"sales_reps\" (\"id\") ON DELETE SET NULL)"
        );
        assert_eq!(
            rendered.statements[1],
            "CREATE INDEX \"sales_reps_territory_index\" ON \"sales_reps\" (\"territory\")"
        );
    }

    #[test]
    fn test_sqlite_types_and_autoincrement() {
        let table = TableDef::new("cpt_codes")
            .column(ColumnDef::new("id", SqlType::BigInt).primary_key().auto_increment())
            .column(ColumnDef::new("is_billable", SqlType::Boolean).default_value("1"))
            .with_timestamps();

        let rendered = Dialect::Sqlite
            .render(&SchemaOperation::CreateTable(table))
            .unwrap();

        assert_eq!(
            rendered.statements[0],
            "CREATE TABLE \"cpt_codes\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"is_billable\" INTEGER NOT NULL DEFAULT 1, \
             \"created_at\" TEXT, \"updated_at\" TEXT)"
        );
    }

    #[test]
    fn test_sqlite_autoincrement_in_composite_key_unsupported() {
        let table = TableDef::new("rep_territories")
            .column(ColumnDef::new("id", SqlType::BigInt).primary_key().auto_increment())
            .column(ColumnDef::new("territory", SqlType::Varchar(Some(64))).primary_key());
        let op = SchemaOperation::CreateTable(table);

        assert!(matches!(
            Dialect::Sqlite.render(&op),
            Err(StrataError::Unsupported(_))
        ));
        assert!(Dialect::Postgres.render(&op).unwrap().statements[0]
            .contains("PRIMARY KEY (\"id\", \"territory\")"));
    }

    #[test]
    fn test_drop_table_if_exists() {
        assert_eq!(
            Dialect::Sqlite
                .render(&SchemaOperation::drop_table("users"))
                .unwrap()
                .statements,
            vec!["DROP TABLE \"users\"".to_string()]
        );
        assert_eq!(
            Dialect::Postgres
                .render(&SchemaOperation::drop_table_if_exists("users"))
                .unwrap()
                .statements,
            vec!["DROP TABLE IF EXISTS \"users\"".to_string()]
        );
    }

    #[test]
    fn test_postgres_identity_column() {
        let table = TableDef::new("t")
            .column(ColumnDef::new("id", SqlType::BigInt).primary_key().auto_increment());
        let rendered = Dialect::Postgres
            .render(&SchemaOperation::CreateTable(table))
            .unwrap();
        assert!(rendered.statements[0]
            .contains("\"id\" BIGINT GENERATED BY DEFAULT AS IDENTITY NOT NULL"));
    }

    #[test]
    fn test_full_text_index_degrades_on_sqlite() {
        let op = SchemaOperation::AddIndex {
            table: "icd10_codes".into(),
            index: IndexDef::on(["code", "description"]).full_text(),
        };

        let pg = Dialect::Postgres.render(&op).unwrap();
        assert_eq!(
            pg.statements,
            vec!["CREATE INDEX \"icd10_codes_code_description_fulltext\" ON \"icd10_codes\" \
                  USING GIN (to_tsvector('simple', coalesce(\"code\", '') || ' ' || coalesce(\"description\", '')))"]
        );

        let sqlite = Dialect::Sqlite.render(&op).unwrap();
        assert!(sqlite.statements.is_empty());
        assert!(sqlite.degraded.unwrap().contains("full-text"));
    }

    #[test]
    fn test_create_table_keeps_degraded_index_note() {
        let table = TableDef::new("codes")
            .column(ColumnDef::new("code", SqlType::Varchar(Some(10))))
            .index(IndexDef::on(["code"]).full_text());

        let rendered = Dialect::Sqlite
            .render(&SchemaOperation::CreateTable(table))
            .unwrap();
        assert_eq!(rendered.statements.len(), 1);
        assert!(rendered.degraded.is_some());
    }

    #[test]
    fn test_alter_column_type() {
        let op = SchemaOperation::AlterColumnType {
            table: "orders".into(),
            column: "total".into(),
            sql_type: SqlType::Decimal(10, 2),
        };

        let pg = Dialect::Postgres.render(&op).unwrap();
        assert_eq!(
            pg.statements[0],
            "ALTER TABLE \"orders\" ALTER COLUMN \"total\" TYPE DECIMAL(10, 2) USING \"total\"::DECIMAL(10, 2)"
        );

        assert!(matches!(
            Dialect::Sqlite.render(&op),
            Err(StrataError::Unsupported(_))
        ));
    }

    #[test]
    fn test_foreign_keys_on_existing_tables() {
        let add = SchemaOperation::AddForeignKey {
            table: "orders".into(),
            foreign_key: ForeignKey::new("sales_rep_id", "sales_reps"),
        };
        let pg = Dialect::Postgres.render(&add).unwrap();
        assert_eq!(
            pg.statements[0],
            "ALTER TABLE \"orders\" ADD CONSTRAINT \"orders_sales_rep_id_foreign\" \
             FOREIGN KEY (\"sales_rep_id\") REFERENCES \"sales_reps\" (\"id\")"
        );

        let sqlite = Dialect::Sqlite.render(&add).unwrap();
        assert!(sqlite.statements.is_empty());
        assert!(sqlite.degraded.is_some());

        let drop = SchemaOperation::DropForeignKey {
            table: "orders".into(),
            name: "orders_sales_rep_id_foreign".into(),
        };
        assert_eq!(
            Dialect::Postgres.render(&drop).unwrap().statements[0],
            "ALTER TABLE \"orders\" DROP CONSTRAINT \"orders_sales_rep_id_foreign\""
        );
    }

    #[test]
    fn test_unique_constraints_fall_back_to_indexes() {
        let add = SchemaOperation::AddUnique {
            table: "users".into(),
            columns: vec!["email".into()],
            name: None,
        };
        assert_eq!(
            Dialect::Postgres.render(&add).unwrap().statements[0],
            "ALTER TABLE \"users\" ADD CONSTRAINT \"users_email_unique\" UNIQUE (\"email\")"
        );
        let sqlite = Dialect::Sqlite.render(&add).unwrap();
        assert_eq!(
            sqlite.statements[0],
            "CREATE UNIQUE INDEX \"users_email_unique\" ON \"users\" (\"email\")"
        );
        assert!(sqlite.degraded.is_none());
    }

    #[test]
    fn test_sqlite_add_unique_column_splits_index() {
        let op = SchemaOperation::AddColumn {
            table: "users".into(),
            column: ColumnDef::new("npi", SqlType::Varchar(Some(10))).nullable().unique(),
        };
        let rendered = Dialect::Sqlite.render(&op).unwrap();
        assert_eq!(
            rendered.statements,
            vec![
                "ALTER TABLE \"users\" ADD COLUMN \"npi\" TEXT".to_string(),
                "CREATE UNIQUE INDEX \"users_npi_unique\" ON \"users\" (\"npi\")".to_string(),
            ]
        );
    }

    #[test]
    fn test_soft_delete_markers() {
        let add = SchemaOperation::AddSoftDelete {
            table: "orders".into(),
            column: "deleted_at".into(),
        };
        assert_eq!(
            Dialect::Postgres.render(&add).unwrap().statements[0],
            "ALTER TABLE \"orders\" ADD COLUMN \"deleted_at\" TIMESTAMPTZ NULL"
        );
        let drop = SchemaOperation::DropSoftDelete {
            table: "orders".into(),
            column: "deleted_at".into(),
        };
        assert_eq!(
            Dialect::Sqlite.render(&drop).unwrap().statements[0],
            "ALTER TABLE \"orders\" DROP COLUMN \"deleted_at\""
        );
    }

    #[test]
    fn test_raw_sql_is_split() {
        let op = SchemaOperation::Raw {
            sql: "UPDATE a SET x = 1; UPDATE b SET y = 2;".into(),
        };
        assert_eq!(Dialect::Postgres.render(&op).unwrap().statements.len(), 2);
    }

    #[test]
    fn test_empty_table_rejected() {
        let op = SchemaOperation::CreateTable(TableDef::new("empty"));
        assert!(matches!(
            Dialect::Postgres.render(&op),
            Err(StrataError::InvalidMigration(_))
        ));
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("odd\"name"), "\"odd\"\"name\"");
    }
}
