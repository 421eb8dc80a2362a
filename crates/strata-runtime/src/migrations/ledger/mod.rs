//! Ledger stores: where applied units are recorded and the migration lock lives.

mod memory;
mod postgres;
mod sqlite;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;
pub use sqlite::SqliteLedger;

use strata_core::config::is_valid_table_name;
use strata_core::error::{Result, StrataError};

/// The ledger table name is interpolated into SQL, so it must be a plain identifier.
fn checked_table_name(table: &str) -> Result<String> {
    if is_valid_table_name(table) {
        Ok(table.to_string())
    } else {
        Err(StrataError::Config(format!(
            "Invalid ledger table name '{}'",
            table
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_table_name() {
        assert_eq!(checked_table_name("strata_migrations").unwrap(), "strata_migrations");
        assert!(checked_table_name("migrations; DROP TABLE users").is_err());
        assert!(checked_table_name("").is_err());
    }
}
