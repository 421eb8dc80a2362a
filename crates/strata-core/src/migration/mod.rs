mod plan;
mod record;
mod rollback;
mod status;
mod traits;
mod unit;

pub use plan::{index_units, plan, MigrationPlan};
pub use record::{AppliedRecord, BatchNumber};
pub use rollback::RollbackTarget;
pub use status::{StatusEntry, StatusReport};
pub use traits::{BoxFuture, ChangeSource, LedgerStore, SchemaExecutor};
pub use unit::{validate_identifier, Direction, MigrationUnit, Revert};
