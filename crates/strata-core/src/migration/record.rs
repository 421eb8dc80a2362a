use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Groups the units applied by one engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchNumber(i64);

impl BatchNumber {
    pub const FIRST: BatchNumber = BatchNumber(1);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// The batch a new invocation should use, given the current ledger.
    pub fn next_after(records: &[AppliedRecord]) -> Self {
        Self::latest(records)
            .map(|b| b.next())
            .unwrap_or(Self::FIRST)
    }

    /// Highest batch number in the ledger.
    pub fn latest(records: &[AppliedRecord]) -> Option<Self> {
        records.iter().map(|r| r.batch).max()
    }
}

impl fmt::Display for BatchNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ledger entry: one unit that has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRecord {
    pub identifier: String,
    pub batch: BatchNumber,
    pub applied_at: DateTime<Utc>,
}

impl AppliedRecord {
    pub fn new(identifier: impl Into<String>, batch: BatchNumber) -> Self {
        Self {
            identifier: identifier.into(),
            batch,
            applied_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_batch_on_empty_ledger() {
        assert_eq!(BatchNumber::next_after(&[]), BatchNumber::FIRST);
        assert_eq!(BatchNumber::latest(&[]), None);
    }

    #[test]
    fn test_next_batch_follows_highest() {
        let records = vec![
            AppliedRecord::new("a", BatchNumber::new(3)),
            AppliedRecord::new("b", BatchNumber::new(1)),
        ];
        assert_eq!(BatchNumber::latest(&records), Some(BatchNumber::new(3)));
        assert_eq!(BatchNumber::next_after(&records), BatchNumber::new(4));
    }
}
