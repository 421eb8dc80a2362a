use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::plan::index_units;
use super::record::{AppliedRecord, BatchNumber};
use super::unit::MigrationUnit;
use crate::error::Result;

/// One row of a status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub identifier: String,
    pub applied: bool,
    pub applied_at: Option<DateTime<Utc>>,
    pub batch: Option<BatchNumber>,
    pub reversible: bool,
}

#[derive(Debug, Clone)]
struct KnownUnit {
    identifier: String,
    reversible: bool,
}

/// Known units merged with the ledger.
///
/// Entries are produced lazily by [`iter`](Self::iter), which can be called any
/// number of times.
#[derive(Debug, Clone)]
pub struct StatusReport {
    units: Vec<KnownUnit>,
    applied: HashMap<String, AppliedRecord>,
    orphans: Vec<AppliedRecord>,
}

impl StatusReport {
    pub fn build(units: &[MigrationUnit], ledger: &[AppliedRecord]) -> Result<Self> {
        let indexed = index_units(units)?;

        let orphans = ledger
            .iter()
            .filter(|r| !indexed.contains_key(r.identifier.as_str()))
            .cloned()
            .collect();

        let units = indexed
            .values()
            .map(|unit| KnownUnit {
                identifier: unit.identifier().to_string(),
                reversible: unit.is_reversible(),
            })
            .collect();

        let applied = ledger
            .iter()
            .map(|r| (r.identifier.clone(), r.clone()))
            .collect();

        Ok(Self {
            units,
            applied,
            orphans,
        })
    }

    /// Entries in ascending identifier order.
    pub fn iter(&self) -> impl Iterator<Item = StatusEntry> + '_ {
        self.units.iter().map(move |unit| {
            let record = self.applied.get(&unit.identifier);
            StatusEntry {
                identifier: unit.identifier.clone(),
                applied: record.is_some(),
                applied_at: record.map(|r| r.applied_at),
                batch: record.map(|r| r.batch),
                reversible: unit.reversible,
            }
        })
    }

    /// Ledger records whose unit is no longer known.
    pub fn orphans(&self) -> &[AppliedRecord] {
        &self.orphans
    }

    pub fn applied_count(&self) -> usize {
        self.iter().filter(|e| e.applied).count()
    }

    pub fn pending_count(&self) -> usize {
        self.iter().filter(|e| !e.applied).count()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.orphans.is_empty()
    }
}
