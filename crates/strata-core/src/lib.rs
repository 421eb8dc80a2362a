pub mod config;
pub mod error;
pub mod migration;
pub mod schema;

pub use config::StrataConfig;
pub use error::{Result, StrataError};
pub use migration::{
    AppliedRecord, BatchNumber, ChangeSource, Direction, LedgerStore, MigrationPlan,
    MigrationUnit, Revert, RollbackTarget, SchemaExecutor, StatusEntry, StatusReport,
};
pub use schema::{ColumnDef, ForeignKey, IndexDef, SchemaOperation, SqlType, TableDef};
