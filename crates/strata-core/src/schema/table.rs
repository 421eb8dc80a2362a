use serde::{Deserialize, Serialize};

use super::types::SqlType;

/// A table to be created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
    /// Foreign keys declared with the table.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    /// Indexes created right after the table.
    #[serde(default)]
    pub indexes: Vec<IndexDef>,
    /// Append nullable `created_at` / `updated_at` columns.
    #[serde(default)]
    pub timestamps: bool,
}

impl TableDef {
    /// Create an empty table definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
            timestamps: false,
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    /// All columns, including the implicit timestamp pair.
    pub fn all_columns(&self) -> Vec<ColumnDef> {
        let mut columns = self.columns.clone();
        if self.timestamps {
            columns.push(ColumnDef::new("created_at", SqlType::Timestamptz).nullable());
            columns.push(ColumnDef::new("updated_at", SqlType::Timestamptz).nullable());
        }
        columns
    }
}

/// A single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column type.
    #[serde(rename = "type")]
    pub sql_type: SqlType,
    /// Whether NULL is allowed.
    #[serde(default)]
    pub nullable: bool,
    /// Default value as a raw SQL expression (e.g. `'direct'`, `true`, `5.00`).
    #[serde(default)]
    pub default: Option<String>,
    /// Part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Single-column unique constraint.
    #[serde(default)]
    pub unique: bool,
    /// Database-generated sequence.
    #[serde(default)]
    pub auto_increment: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: false,
            default: None,
            primary_key: false,
            unique: false,
            auto_increment: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// Kind of index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    #[default]
    BTree,
    FullText,
}

/// An index over one or more columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    pub columns: Vec<String>,
    /// Explicit name; derived from table and columns when absent.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub kind: IndexKind,
}

impl IndexDef {
    pub fn on<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            name: None,
            unique: false,
            kind: IndexKind::BTree,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn full_text(mut self) -> Self {
        self.kind = IndexKind::FullText;
        self
    }

    /// Resolved index name for the given table.
    pub fn name_for(&self, table: &str) -> String {
        let suffix = match (self.kind, self.unique) {
            (IndexKind::FullText, _) => "fulltext",
            (IndexKind::BTree, true) => "unique",
            (IndexKind::BTree, false) => "index",
        };
        self.name
            .clone()
            .unwrap_or_else(|| constraint_name(table, &self.columns, suffix))
    }
}

/// Action taken on referencing rows when the referenced row changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    Restrict,
    NoAction,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    /// Referenced table.
    pub references: String,
    #[serde(default = "default_referenced_columns")]
    pub referenced_columns: Vec<String>,
    #[serde(default)]
    pub on_delete: Option<ReferentialAction>,
    #[serde(default)]
    pub on_update: Option<ReferentialAction>,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_referenced_columns() -> Vec<String> {
    vec!["id".to_string()]
}

impl ForeignKey {
    /// `column` references `table(id)`.
    pub fn new(column: impl Into<String>, references: impl Into<String>) -> Self {
        Self {
            columns: vec![column.into()],
            references: references.into(),
            referenced_columns: default_referenced_columns(),
            on_delete: None,
            on_update: None,
            name: None,
        }
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    pub fn name_for(&self, table: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| constraint_name(table, &self.columns, "foreign"))
    }
}

/// `{table}_{col1}_{col2}_{suffix}`, the conventional constraint naming.
pub fn constraint_name(table: &str, columns: &[String], suffix: &str) -> String {
    let mut name = String::from(table);
    for column in columns {
        name.push('_');
        name.push_str(column);
    }
    name.push('_');
    name.push_str(suffix);
    name
}
