mod engine;
mod executor;
mod generator;
mod ledger;
mod source;
mod statements;
mod unit_file;

pub use engine::{
    ApplyOptions, ApplyReport, IrreversibleUnit, MigrationEngine, PreviewEntry, RollbackReport,
};
pub use executor::{
    quote, Capabilities, Dialect, PgSchemaExecutor, Rendered, SqliteSchemaExecutor,
};
pub use generator::MigrationGenerator;
pub use ledger::{MemoryLedger, PgLedger, SqliteLedger};
pub use source::{DirectorySource, StaticSource};
pub use statements::split_sql_statements;
pub use unit_file::parse_unit_file;
