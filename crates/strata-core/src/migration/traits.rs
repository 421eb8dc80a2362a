use std::future::Future;
use std::pin::Pin;

use super::record::AppliedRecord;
use super::unit::{Direction, MigrationUnit};
use crate::error::Result;
use crate::schema::SchemaOperation;

/// Boxed future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Supplies every migration unit the application knows about.
pub trait ChangeSource: Send + Sync {
    /// All units. Identifiers are expected to be unique; the engine checks.
    fn units(&self) -> Result<Vec<MigrationUnit>>;
}

/// Runs abstract schema operations against a concrete store.
pub trait SchemaExecutor: Send + Sync {
    /// Short name of the target store, for logs.
    fn name(&self) -> &str;

    /// Execute one unit's payload in the given direction.
    ///
    /// The call either fully succeeds or fully fails from the engine's point of
    /// view; partial effects are the executor's responsibility (usually a
    /// transaction around the whole payload).
    fn execute<'a>(
        &'a self,
        identifier: &'a str,
        direction: Direction,
        operations: &'a [SchemaOperation],
    ) -> BoxFuture<'a, Result<()>>;

    /// Render what `execute` would run, without touching the store.
    fn preview(&self, operations: &[SchemaOperation]) -> Result<Vec<String>>;
}

/// Durable record of applied units, plus the exclusive migration lock.
///
/// The engine is the only writer.
pub trait LedgerStore: Send + Sync {
    /// Create the ledger table if it does not exist.
    fn prepare(&self) -> BoxFuture<'_, Result<()>>;

    /// All records. An uninitialized ledger has none.
    fn records(&self) -> BoxFuture<'_, Result<Vec<AppliedRecord>>>;

    /// Persist one record.
    fn record<'a>(&'a self, record: &'a AppliedRecord) -> BoxFuture<'a, Result<()>>;

    /// Delete the record for `identifier`.
    fn remove<'a>(&'a self, identifier: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Take the exclusive lock without waiting.
    ///
    /// Returns `StrataError::LockContention` when another holder has it.
    fn try_lock(&self) -> BoxFuture<'_, Result<()>>;

    /// Release the lock taken by `try_lock`.
    fn unlock(&self) -> BoxFuture<'_, Result<()>>;

    /// Clear a lock left behind by a run that never released it.
    ///
    /// Returns whether a lock was cleared. Stores whose lock ends with the
    /// holder's session have nothing to clear.
    fn force_unlock(&self) -> BoxFuture<'_, Result<bool>>;
}
