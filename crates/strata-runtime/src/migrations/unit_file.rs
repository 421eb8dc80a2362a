//! The TOML migration file format.
//!
//! ```toml
//! description = "Add sales reps"
//!
//! [[up]]
//! op = "create_table"
//! name = "sales_reps"
//! columns = [{ name = "id", type = "char(36)", primary_key = true }]
//!
//! [[down]]
//! op = "drop_table"
//! table = "sales_reps"
//! ```
//!
//! A unit that cannot be undone sets `irreversible = "reason"` instead of
//! listing `down` operations.

use serde::Deserialize;

use strata_core::error::{Result, StrataError};
use strata_core::migration::{MigrationUnit, Revert};
use strata_core::schema::SchemaOperation;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnitFile {
    description: Option<String>,
    #[serde(default)]
    up: Vec<SchemaOperation>,
    down: Option<Vec<SchemaOperation>>,
    irreversible: Option<String>,
}

/// Parse a TOML unit file into a unit named `identifier`.
pub fn parse_unit_file(identifier: &str, content: &str) -> Result<MigrationUnit> {
    let file: UnitFile = toml::from_str(content).map_err(|e| {
        StrataError::InvalidMigration(format!("Migration '{}': {}", identifier, e))
    })?;

    let revert = match (file.down, file.irreversible) {
        (Some(_), Some(_)) => {
            return Err(StrataError::InvalidMigration(format!(
                "Migration '{}' declares both down operations and irreversible",
                identifier
            )))
        }
        (Some(ops), None) => Revert::Reversible(ops),
        (None, Some(reason)) => Revert::Irreversible { reason },
        (None, None) => Revert::Irreversible {
            reason: "no down operations declared".to_string(),
        },
    };

    let unit = MigrationUnit::from_parts(identifier, file.description, file.up, revert);
    unit.validate()?;
    Ok(unit)
}

/// Build a unit from raw SQL files.
///
/// Without a revert script the unit is irreversible.
pub fn sql_unit(identifier: &str, up_sql: String, down_sql: Option<String>) -> Result<MigrationUnit> {
    let revert = match down_sql {
        Some(sql) => Revert::Reversible(vec![SchemaOperation::Raw { sql }]),
        None => Revert::Irreversible {
            reason: "no down script".to_string(),
        },
    };

    let unit = MigrationUnit::from_parts(
        identifier,
        None,
        vec![SchemaOperation::Raw { sql: up_sql }],
        revert,
    );
    unit.validate()?;
    Ok(unit)
}
