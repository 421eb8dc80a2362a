//! Pending-work computation.
//!
//! Everything here is pure: given the known units and the ledger contents it
//! produces the same answer every time, which is what makes dry runs possible.

use std::collections::{BTreeMap, HashSet};

use super::record::AppliedRecord;
use super::unit::MigrationUnit;
use crate::error::{Result, StrataError};

/// Units not yet in the ledger, in ascending identifier order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationPlan {
    units: Vec<MigrationUnit>,
}

impl MigrationPlan {
    /// Compute the pending units.
    ///
    /// Fails with `DuplicateIdentifier` if two units share an identifier, before
    /// anything else is looked at.
    pub fn compute(units: &[MigrationUnit], ledger: &[AppliedRecord]) -> Result<Self> {
        let indexed = index_units(units)?;
        let applied: HashSet<&str> = ledger.iter().map(|r| r.identifier.as_str()).collect();

        let units = indexed
            .into_values()
            .filter(|unit| !applied.contains(unit.identifier()))
            .cloned()
            .collect();

        Ok(Self { units })
    }

    pub fn units(&self) -> &[MigrationUnit] {
        &self.units
    }

    pub fn identifiers(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.identifier()).collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MigrationUnit> {
        self.units.iter()
    }
}

impl<'a> IntoIterator for &'a MigrationPlan {
    type Item = &'a MigrationUnit;
    type IntoIter = std::slice::Iter<'a, MigrationUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}

/// Shorthand for [`MigrationPlan::compute`].
pub fn plan(units: &[MigrationUnit], ledger: &[AppliedRecord]) -> Result<MigrationPlan> {
    MigrationPlan::compute(units, ledger)
}

/// Validate and index units by identifier, ordered lexicographically.
pub fn index_units(units: &[MigrationUnit]) -> Result<BTreeMap<&str, &MigrationUnit>> {
    let mut indexed = BTreeMap::new();
    for unit in units {
        unit.validate()?;
        if indexed.insert(unit.identifier(), unit).is_some() {
            return Err(StrataError::DuplicateIdentifier(unit.identifier().to_string()));
        }
    }
    Ok(indexed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::record::BatchNumber;

    fn unit(id: &str) -> MigrationUnit {
        MigrationUnit::new(id).reversible_noop()
    }

    fn applied(id: &str) -> AppliedRecord {
        AppliedRecord::new(id, BatchNumber::FIRST)
    }

    #[test]
    fn test_plan_sorts_ascending() {
        let units = vec![
            unit("2025_01_08_000001_add_sales_reps"),
            unit("2024_03_27_235959_create_all_tables"),
            unit("2025_01_01_000000_create_platform_schema"),
        ];

        let plan = plan(&units, &[]).unwrap();
        assert_eq!(
            plan.identifiers(),
            vec![
                "2024_03_27_235959_create_all_tables",
                "2025_01_01_000000_create_platform_schema",
                "2025_01_08_000001_add_sales_reps",
            ]
        );
    }

    #[test]
    fn test_plan_excludes_applied() {
        let units = vec![unit("create_table_x"), unit("add_column_y_to_x")];
        let ledger = vec![applied("add_column_y_to_x")];

        let plan = plan(&units, &ledger).unwrap();
        assert_eq!(plan.identifiers(), vec!["create_table_x"]);
    }

    #[test]
    fn test_plan_on_empty_ledger_orders_lexicographically() {
        let units = vec![unit("create_table_x"), unit("add_column_y_to_x")];
        let plan = plan(&units, &[]).unwrap();
        assert_eq!(plan.identifiers(), vec!["add_column_y_to_x", "create_table_x"]);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let units = vec![unit("b"), unit("c"), unit("a")];
        let ledger = vec![applied("c")];

        let first = plan(&units, &ledger).unwrap();
        let second = plan(&units, &ledger).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_fully_applied_plan_is_empty() {
        let units = vec![unit("a"), unit("b")];
        let ledger = vec![applied("a"), applied("b")];

        let plan = plan(&units, &ledger).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let units = vec![unit("2025_01_01_x"), unit("2025_01_02_y"), unit("2025_01_01_x")];

        let err = plan(&units, &[]).unwrap_err();
        match err {
            StrataError::DuplicateIdentifier(id) => assert_eq!(id, "2025_01_01_x"),
            other => panic!("expected DuplicateIdentifier, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let units = vec![unit("ok"), unit("not ok")];
        assert!(matches!(
            plan(&units, &[]),
            Err(StrataError::InvalidMigration(_))
        ));
    }

    #[test]
    fn test_ledger_entries_for_unknown_units_are_ignored() {
        let units = vec![unit("a")];
        let ledger = vec![applied("deleted_long_ago")];

        let plan = plan(&units, &ledger).unwrap();
        assert_eq!(plan.identifiers(), vec!["a"]);
    }
}
