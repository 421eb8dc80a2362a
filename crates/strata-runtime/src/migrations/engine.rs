//! The migration engine.
//!
//! Combines a change source, a schema executor and a ledger store. Writes
//! (`apply`, `rollback`) run under the ledger's exclusive lock; reads
//! (`plan`, `status`, `preview`) take no lock.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use strata_core::error::{Result, StrataError};
use strata_core::migration::{
    index_units, AppliedRecord, BatchNumber, ChangeSource, Direction, LedgerStore,
    MigrationPlan, Revert, RollbackTarget, SchemaExecutor, StatusReport,
};

/// Options for [`MigrationEngine::apply`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Give every unit its own batch, so each can be rolled back alone.
    pub step: bool,
}

/// What an `apply` call recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: Vec<AppliedRecord>,
}

impl ApplyReport {
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    pub fn identifiers(&self) -> Vec<&str> {
        self.applied.iter().map(|r| r.identifier.as_str()).collect()
    }
}

/// A unit that was rolled back without reverting anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IrreversibleUnit {
    pub identifier: String,
    pub reason: String,
}

/// What a `rollback` call removed from the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Units whose revert operations ran, in revert order.
    pub reverted: Vec<String>,
    /// Irreversible units whose ledger rows were removed.
    pub irreversible: Vec<IrreversibleUnit>,
}

impl RollbackReport {
    pub fn is_empty(&self) -> bool {
        self.reverted.is_empty() && self.irreversible.is_empty()
    }

    /// Number of ledger rows removed.
    pub fn len(&self) -> usize {
        self.reverted.len() + self.irreversible.len()
    }
}

/// Statements one unit would run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewEntry {
    pub identifier: String,
    pub direction: Direction,
    pub statements: Vec<String>,
}

/// Plans, applies and rolls back migration units.
pub struct MigrationEngine {
    source: Arc<dyn ChangeSource>,
    executor: Arc<dyn SchemaExecutor>,
    ledger: Arc<dyn LedgerStore>,
}

impl MigrationEngine {
    pub fn new(
        source: Arc<dyn ChangeSource>,
        executor: Arc<dyn SchemaExecutor>,
        ledger: Arc<dyn LedgerStore>,
    ) -> Self {
        Self {
            source,
            executor,
            ledger,
        }
    }

    pub fn executor_name(&self) -> &str {
        self.executor.name()
    }

    /// Pending units in ascending identifier order.
    ///
    /// Duplicate or malformed identifiers fail before the ledger is read.
    pub async fn plan(&self) -> Result<MigrationPlan> {
        let units = self.source.units()?;
        index_units(&units)?;

        let ledger = self.ledger.records().await?;
        MigrationPlan::compute(&units, &ledger)
    }

    /// Plan and apply everything pending.
    pub async fn migrate(&self, options: ApplyOptions) -> Result<ApplyReport> {
        let plan = self.plan().await?;
        self.apply(&plan, options).await
    }

    /// Apply a plan, one unit at a time.
    ///
    /// Each unit is recorded as soon as it succeeds. The first failure stops
    /// the run; units before it stay recorded.
    pub async fn apply(&self, plan: &MigrationPlan, options: ApplyOptions) -> Result<ApplyReport> {
        if plan.is_empty() {
            info!("Nothing to migrate");
            return Ok(ApplyReport::default());
        }

        self.with_lock(self.apply_inner(plan, options)).await
    }

    async fn apply_inner(&self, plan: &MigrationPlan, options: ApplyOptions) -> Result<ApplyReport> {
        self.ledger.prepare().await?;

        // Another run may have finished between planning and taking the lock.
        let records = self.ledger.records().await?;
        let applied: HashSet<&str> = records.iter().map(|r| r.identifier.as_str()).collect();

        let mut batch = BatchNumber::next_after(&records);
        let mut report = ApplyReport::default();

        for unit in plan {
            let identifier = unit.identifier();
            if applied.contains(identifier) {
                debug!("Skipping {}, applied since the plan was computed", identifier);
                continue;
            }

            info!("Applying migration: {}", identifier);
            self.executor
                .execute(identifier, Direction::Up, unit.up_operations())
                .await
                .map_err(|e| StrataError::execution(identifier, Direction::Up, e))?;

            let record = AppliedRecord::new(identifier, batch);
            self.ledger.record(&record).await?;
            info!("Migration applied: {} (batch {})", identifier, batch);
            report.applied.push(record);

            if options.step {
                batch = batch.next();
            }
        }

        Ok(report)
    }

    /// Revert the units selected by `target`, newest first.
    ///
    /// Every targeted record must still have a known unit, otherwise nothing
    /// is reverted. Irreversible units are only removed from the ledger.
    pub async fn rollback(&self, target: RollbackTarget) -> Result<RollbackReport> {
        self.with_lock(self.rollback_inner(target)).await
    }

    async fn rollback_inner(&self, target: RollbackTarget) -> Result<RollbackReport> {
        let records = self.ledger.records().await?;
        let selected = target.select(&records);
        if selected.is_empty() {
            info!("Nothing to roll back ({})", target);
            return Ok(RollbackReport::default());
        }

        let units = self.source.units()?;
        let known = index_units(&units)?;
        if let Some(missing) = selected
            .iter()
            .find(|r| !known.contains_key(r.identifier.as_str()))
        {
            return Err(StrataError::LedgerCorruption {
                identifier: missing.identifier.clone(),
            });
        }

        let mut report = RollbackReport::default();
        for record in &selected {
            let identifier = record.identifier.as_str();
            let unit = known
                .get(identifier)
                .ok_or_else(|| StrataError::LedgerCorruption {
                    identifier: identifier.to_string(),
                })?;

            match unit.revert() {
                Revert::Reversible(operations) => {
                    info!("Rolling back migration: {}", identifier);
                    self.executor
                        .execute(identifier, Direction::Down, operations)
                        .await
                        .map_err(|e| StrataError::execution(identifier, Direction::Down, e))?;
                    self.ledger.remove(identifier).await?;
                    report.reverted.push(identifier.to_string());
                }
                Revert::Irreversible { reason } => {
                    warn!(
                        "Migration {} is irreversible ({}); removing it from the ledger, schema left unchanged",
                        identifier, reason
                    );
                    self.ledger.remove(identifier).await?;
                    report.irreversible.push(IrreversibleUnit {
                        identifier: identifier.to_string(),
                        reason: reason.clone(),
                    });
                }
            }
        }

        info!("Rolled back {} migration(s) ({})", report.len(), target);
        Ok(report)
    }

    /// Known units merged with the ledger.
    pub async fn status(&self) -> Result<StatusReport> {
        let units = self.source.units()?;
        let ledger = self.ledger.records().await?;
        let report = StatusReport::build(&units, &ledger)?;

        for orphan in report.orphans() {
            warn!(
                "{}",
                StrataError::LedgerCorruption {
                    identifier: orphan.identifier.clone()
                }
            );
        }

        Ok(report)
    }

    /// Statements `apply` would run for `plan`. Nothing is executed or recorded.
    pub async fn preview(&self, plan: &MigrationPlan) -> Result<Vec<PreviewEntry>> {
        plan.iter()
            .map(|unit| {
                Ok(PreviewEntry {
                    identifier: unit.identifier().to_string(),
                    direction: Direction::Up,
                    statements: self.executor.preview(unit.up_operations())?,
                })
            })
            .collect()
    }

    /// Statements `rollback` would run for `target`. Nothing is executed or removed.
    pub async fn preview_rollback(&self, target: RollbackTarget) -> Result<Vec<PreviewEntry>> {
        let records = self.ledger.records().await?;
        let units = self.source.units()?;
        let known = index_units(&units)?;

        target
            .select(&records)
            .into_iter()
            .map(|record| {
                let unit = known.get(record.identifier.as_str()).ok_or_else(|| {
                    StrataError::LedgerCorruption {
                        identifier: record.identifier.clone(),
                    }
                })?;
                let statements = match unit.revert() {
                    Revert::Reversible(operations) => self.executor.preview(operations)?,
                    Revert::Irreversible { reason } => {
                        vec![format!("-- irreversible: {}", reason)]
                    }
                };
                Ok(PreviewEntry {
                    identifier: record.identifier,
                    direction: Direction::Down,
                    statements,
                })
            })
            .collect()
    }

    /// Clear a migration lock abandoned by a run that was killed mid-way.
    ///
    /// Only for when no other run is in progress. Returns whether a lock was
    /// cleared.
    pub async fn force_unlock(&self) -> Result<bool> {
        self.ledger.force_unlock().await
    }

    /// Run `work` while holding the migration lock.
    ///
    /// The lock is released whether `work` succeeds or not.
    async fn with_lock<T>(&self, work: impl Future<Output = Result<T>>) -> Result<T> {
        self.ledger.try_lock().await?;

        let result = work.await;

        if let Err(e) = self.ledger.unlock().await {
            warn!("Failed to release migration lock: {}", e);
        }

        result
    }
}
