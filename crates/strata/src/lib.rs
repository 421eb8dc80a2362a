//! Strata - schema migrations for PostgreSQL and SQLite.
//!
//! Migration units are applied in identifier order, recorded in a ledger
//! table in batches, and rolled back batch by batch.
//!
//! ```no_run
//! use std::sync::Arc;
//! use strata::{Database, DirectorySource, StrataConfig, ApplyOptions};
//!
//! # async fn run() -> strata::Result<()> {
//! let config = StrataConfig::from_file("strata.toml")?;
//! let db = Database::from_config(&config.database).await?;
//! let source = Arc::new(DirectorySource::new(&config.migrations.directory));
//! let engine = db.migration_engine(source, &config.migrations)?;
//! engine.migrate(ApplyOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod logging;

pub use strata_core::{
    AppliedRecord, BatchNumber, ChangeSource, ColumnDef, Direction, ForeignKey, IndexDef,
    LedgerStore, MigrationPlan, MigrationUnit, Result, Revert, RollbackTarget, SchemaExecutor,
    SchemaOperation, SqlType, StatusEntry, StatusReport, StrataConfig, StrataError, TableDef,
};
pub use strata_runtime::migrations::{
    Dialect, MemoryLedger, PgLedger, PgSchemaExecutor, SqliteLedger, SqliteSchemaExecutor,
};
pub use strata_runtime::{
    ApplyOptions, ApplyReport, Database, DirectorySource, MigrationEngine, MigrationGenerator,
    PreviewEntry, RollbackReport, StaticSource,
};
