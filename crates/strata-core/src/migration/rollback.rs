use std::cmp::Reverse;
use std::fmt;

use super::record::{AppliedRecord, BatchNumber};

/// Which applied units a rollback should revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackTarget {
    /// Every unit of the most recent batch.
    LastBatch,
    /// Every unit of one specific batch.
    Batch(BatchNumber),
    /// The most recently applied `n` units, across batches.
    Steps(usize),
    /// Everything in the ledger.
    All,
}

impl fmt::Display for RollbackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackTarget::LastBatch => write!(f, "last batch"),
            RollbackTarget::Batch(batch) => write!(f, "batch {}", batch),
            RollbackTarget::Steps(n) => write!(f, "last {} step(s)", n),
            RollbackTarget::All => write!(f, "all batches"),
        }
    }
}

impl RollbackTarget {
    /// Records to revert, in revert order.
    ///
    /// Order is batch descending, then identifier descending: the exact reverse
    /// of the order the units were applied in.
    pub fn select(&self, ledger: &[AppliedRecord]) -> Vec<AppliedRecord> {
        let mut ordered: Vec<AppliedRecord> = ledger.to_vec();
        ordered.sort_by(|a, b| {
            (Reverse(a.batch), Reverse(&a.identifier)).cmp(&(Reverse(b.batch), Reverse(&b.identifier)))
        });

        match self {
            RollbackTarget::LastBatch => match BatchNumber::latest(ledger) {
                Some(latest) => ordered.into_iter().filter(|r| r.batch == latest).collect(),
                None => Vec::new(),
            },
            RollbackTarget::Batch(batch) => {
                ordered.into_iter().filter(|r| r.batch == *batch).collect()
            }
            RollbackTarget::Steps(n) => ordered.into_iter().take(*n).collect(),
            RollbackTarget::All => ordered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, batch: i64) -> AppliedRecord {
        AppliedRecord::new(id, BatchNumber::new(batch))
    }

    fn ids(records: &[AppliedRecord]) -> Vec<&str> {
        records.iter().map(|r| r.identifier.as_str()).collect()
    }

    fn ledger() -> Vec<AppliedRecord> {
        vec![
            record("2024_01_01_a", 1),
            record("2024_01_02_b", 1),
            record("2024_02_01_c", 2),
            record("2024_02_02_d", 2),
            record("2024_03_01_e", 3),
        ]
    }

    #[test]
    fn test_last_batch_in_reverse_identifier_order() {
        let mut ledger = ledger();
        ledger.push(record("2024_03_02_f", 3));

        let selected = RollbackTarget::LastBatch.select(&ledger);
        assert_eq!(ids(&selected), vec!["2024_03_02_f", "2024_03_01_e"]);
    }

    #[test]
    fn test_explicit_batch() {
        let selected = RollbackTarget::Batch(BatchNumber::new(2)).select(&ledger());
        assert_eq!(ids(&selected), vec!["2024_02_02_d", "2024_02_01_c"]);
    }

    #[test]
    fn test_missing_batch_selects_nothing() {
        assert!(RollbackTarget::Batch(BatchNumber::new(9)).select(&ledger()).is_empty());
        assert!(RollbackTarget::LastBatch.select(&[]).is_empty());
    }

    #[test]
    fn test_steps_cross_batches() {
        let selected = RollbackTarget::Steps(3).select(&ledger());
        assert_eq!(ids(&selected), vec!["2024_03_01_e", "2024_02_02_d", "2024_02_01_c"]);
    }

    #[test]
    fn test_all_reverses_everything() {
        let selected = RollbackTarget::All.select(&ledger());
        assert_eq!(
            ids(&selected),
            vec!["2024_03_01_e", "2024_02_02_d", "2024_02_01_c", "2024_01_02_b", "2024_01_01_a"]
        );
    }

    #[test]
    fn test_batch_order_wins_over_identifier_order() {
        // A unit with an older identifier applied in a later batch is reverted first.
        let ledger = vec![record("2024_05_01_late_name", 1), record("2024_01_01_early_name", 2)];
        let selected = RollbackTarget::All.select(&ledger);
        assert_eq!(ids(&selected), vec!["2024_01_01_early_name", "2024_05_01_late_name"]);
    }
}
