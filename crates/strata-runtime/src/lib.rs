pub mod db;
pub mod migrations;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use db::Database;
pub use migrations::{
    ApplyOptions, ApplyReport, DirectorySource, MigrationEngine, MigrationGenerator,
    PreviewEntry, RollbackReport, StaticSource,
};
