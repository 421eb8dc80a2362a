use serde::{Deserialize, Serialize};

/// Lock ID for the migration advisory lock ("STRATA" in ASCII).
pub const DEFAULT_LOCK_ID: i64 = 0x5354_5241_5441;

/// Age after which a lock row with no live holder may be taken over.
pub const DEFAULT_STALE_LOCK_SECS: u64 = 3600;

/// Migration discovery and ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationsConfig {
    /// Directory holding migration definitions.
    #[serde(default = "default_directory")]
    pub directory: String,

    /// Name of the ledger table.
    #[serde(default = "default_table")]
    pub table: String,

    /// Advisory lock key used to serialize migration runs.
    #[serde(default = "default_lock_id")]
    pub lock_id: i64,

    /// Seconds after which a lock kept as a row (SQLite) counts as abandoned.
    /// Keep this above the longest expected migration run.
    #[serde(default = "default_stale_lock_secs")]
    pub stale_lock_secs: u64,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            table: default_table(),
            lock_id: default_lock_id(),
            stale_lock_secs: default_stale_lock_secs(),
        }
    }
}

fn default_directory() -> String {
    "migrations".to_string()
}

fn default_table() -> String {
    "strata_migrations".to_string()
}

fn default_lock_id() -> i64 {
    DEFAULT_LOCK_ID
}

fn default_stale_lock_secs() -> u64 {
    DEFAULT_STALE_LOCK_SECS
}

/// Table names end up inside SQL text, so only plain identifiers are allowed.
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_validation() {
        assert!(is_valid_table_name("strata_migrations"));
        assert!(is_valid_table_name("_ledger2"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("2ledger"));
        assert!(!is_valid_table_name("public.ledger"));
        assert!(!is_valid_table_name("ledger\"; --"));
    }
}
