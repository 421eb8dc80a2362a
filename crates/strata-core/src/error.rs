use thiserror::Error;

use crate::migration::Direction;

/// Core error type for Strata operations.
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    #[error("Duplicate migration identifier: {0}")]
    DuplicateIdentifier(String),

    #[error("Migration '{identifier}' failed to {direction}: {source}")]
    Execution {
        identifier: String,
        direction: Direction,
        #[source]
        source: Box<StrataError>,
    },

    #[error("Migration lock is held by another run; if none is in progress, clear it with `strata migrate:unlock`")]
    LockContention,

    #[error("Ledger references migration '{identifier}' which no longer exists")]
    LedgerCorruption { identifier: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StrataError {
    /// Wrap an executor failure with the unit and direction it happened in.
    pub fn execution(identifier: impl Into<String>, direction: Direction, source: StrataError) -> Self {
        StrataError::Execution {
            identifier: identifier.into(),
            direction,
            source: Box::new(source),
        }
    }

    /// Identifier of the migration unit this error is about, if any.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            StrataError::DuplicateIdentifier(identifier) => Some(identifier),
            StrataError::Execution { identifier, .. } => Some(identifier),
            StrataError::LedgerCorruption { identifier } => Some(identifier),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for StrataError {
    fn from(e: toml::de::Error) -> Self {
        StrataError::Serialization(e.to_string())
    }
}

/// Result type alias using StrataError.
pub type Result<T> = std::result::Result<T, StrataError>;
