use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};
use crate::schema::SchemaOperation;

/// Which way a unit is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "apply"),
            Direction::Down => write!(f, "revert"),
        }
    }
}

/// How a unit is undone.
#[derive(Debug, Clone, PartialEq)]
pub enum Revert {
    /// Operations that undo the unit's `up` operations.
    Reversible(Vec<SchemaOperation>),
    /// The unit cannot be undone; rolling it back only forgets it.
    Irreversible { reason: String },
}

impl Revert {
    pub fn is_reversible(&self) -> bool {
        matches!(self, Revert::Reversible(_))
    }
}

/// One named, ordered schema change.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationUnit {
    identifier: String,
    description: Option<String>,
    up: Vec<SchemaOperation>,
    down: Revert,
}

impl MigrationUnit {
    /// Create a unit with no operations.
    ///
    /// Until [`down`](Self::down) is called the unit is irreversible.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            description: None,
            up: Vec::new(),
            down: Revert::Irreversible {
                reason: "no revert operations declared".to_string(),
            },
        }
    }

    /// Build a unit from already-assembled parts.
    pub fn from_parts(
        identifier: impl Into<String>,
        description: Option<String>,
        up: Vec<SchemaOperation>,
        down: Revert,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            description,
            up,
            down,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append an operation to the apply payload.
    pub fn up(mut self, operation: SchemaOperation) -> Self {
        self.up.push(operation);
        self
    }

    /// Append an operation to the revert payload, making the unit reversible.
    pub fn down(mut self, operation: SchemaOperation) -> Self {
        match &mut self.down {
            Revert::Reversible(ops) => ops.push(operation),
            Revert::Irreversible { .. } => self.down = Revert::Reversible(vec![operation]),
        }
        self
    }

    /// Mark the unit reversible with an empty revert payload.
    pub fn reversible_noop(mut self) -> Self {
        if let Revert::Irreversible { .. } = self.down {
            self.down = Revert::Reversible(Vec::new());
        }
        self
    }

    /// Mark the unit as impossible to undo.
    pub fn irreversible(mut self, reason: impl Into<String>) -> Self {
        self.down = Revert::Irreversible {
            reason: reason.into(),
        };
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn up_operations(&self) -> &[SchemaOperation] {
        &self.up
    }

    pub fn revert(&self) -> &Revert {
        &self.down
    }

    pub fn is_reversible(&self) -> bool {
        self.down.is_reversible()
    }

    /// Check the identifier is usable as a ledger key and sort key, and that
    /// every operation in both directions is well formed.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.identifier)?;

        let down: &[SchemaOperation] = match &self.down {
            Revert::Reversible(ops) => ops,
            Revert::Irreversible { .. } => &[],
        };
        for operation in self.up.iter().chain(down) {
            operation.validate().map_err(|e| match e {
                StrataError::InvalidMigration(message) => StrataError::InvalidMigration(format!(
                    "Migration '{}': {}",
                    self.identifier, message
                )),
                other => other,
            })?;
        }
        Ok(())
    }
}

/// Identifiers are non-empty and limited to ASCII letters, digits, `_`, `-` and `.`.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() {
        return Err(StrataError::InvalidMigration(
            "Migration identifier must not be empty".into(),
        ));
    }
    if identifier.len() > 255 {
        return Err(StrataError::InvalidMigration(format!(
            "Migration identifier '{}' is longer than 255 characters",
            identifier
        )));
    }
    if let Some(bad) = identifier
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(StrataError::InvalidMigration(format!(
            "Migration identifier '{}' contains invalid character {:?}",
            identifier, bad
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drop_table(name: &str) -> SchemaOperation {
        SchemaOperation::drop_table(name)
    }

    #[test]
    fn test_new_unit_is_irreversible() {
        let unit = MigrationUnit::new("2025_01_01_000000_backfill");
        assert!(!unit.is_reversible());
        assert!(unit.up_operations().is_empty());
    }

    #[test]
    fn test_down_makes_unit_reversible() {
        let unit = MigrationUnit::new("2025_01_01_000000_x")
            .up(SchemaOperation::Raw { sql: "SELECT 1".into() })
            .down(drop_table("a"))
            .down(drop_table("b"));

        match unit.revert() {
            Revert::Reversible(ops) => assert_eq!(ops.len(), 2),
            other => panic!("expected reversible, got {:?}", other),
        }
    }

    #[test]
    fn test_irreversible_overrides_down() {
        let unit = MigrationUnit::new("x")
            .down(drop_table("a"))
            .irreversible("drops patient data");
        assert_eq!(
            unit.revert(),
            &Revert::Irreversible {
                reason: "drops patient data".into()
            }
        );
    }

    #[test]
    fn test_validate_checks_operations_both_ways() {
        let unit = MigrationUnit::new("2025_01_01_000000_x")
            .up(SchemaOperation::Raw { sql: "SELECT 1".into() })
            .down(drop_table(""));
        match unit.validate() {
            Err(StrataError::InvalidMigration(message)) => {
                assert!(message.starts_with("Migration '2025_01_01_000000_x'"))
            }
            other => panic!("expected invalid migration, got {:?}", other),
        }

        let unit = MigrationUnit::new("2025_01_01_000000_y")
            .up(SchemaOperation::Raw { sql: String::new() })
            .irreversible("data fix");
        assert!(unit.validate().is_err());

        let unit = MigrationUnit::new("2025_01_01_000000_z").down(drop_table("users"));
        assert!(unit.validate().is_ok());
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("2024_03_27_235959_create_all_tables").is_ok());
        assert!(validate_identifier("v1.2-hotfix").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("has space").is_err());
        assert!(validate_identifier("quote'd").is_err());
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Up.to_string(), "apply");
        assert_eq!(Direction::Down.to_string(), "revert");
    }
}
