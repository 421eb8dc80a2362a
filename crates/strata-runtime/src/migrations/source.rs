//! Change sources: where migration units come from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use strata_core::error::{Result, StrataError};
use strata_core::migration::{ChangeSource, MigrationUnit};

use super::unit_file::{parse_unit_file, sql_unit};

/// Units kept as files in one directory.
///
/// Recognised layouts, keyed by the file stem:
/// - `<id>.toml`: a unit file with `up` / `down` operations
/// - `<id>.up.sql` with an optional `<id>.down.sql`
/// - `<id>.sql`: apply-only, irreversible
///
/// Other files are ignored. A missing directory holds no units.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

#[derive(Debug, Default)]
struct UnitFiles {
    toml: Option<PathBuf>,
    up_sql: Option<PathBuf>,
    down_sql: Option<PathBuf>,
    plain_sql: Option<PathBuf>,
}

impl UnitFiles {
    fn forms(&self) -> usize {
        [self.toml.is_some(), self.up_sql.is_some(), self.plain_sql.is_some()]
            .iter()
            .filter(|present| **present)
            .count()
    }
}

enum FileKind {
    Toml,
    UpSql,
    DownSql,
    PlainSql,
}

fn classify(file_name: &str) -> Option<(&str, FileKind)> {
    if let Some(id) = file_name.strip_suffix(".toml") {
        Some((id, FileKind::Toml))
    } else if let Some(id) = file_name.strip_suffix(".up.sql") {
        Some((id, FileKind::UpSql))
    } else if let Some(id) = file_name.strip_suffix(".down.sql") {
        Some((id, FileKind::DownSql))
    } else {
        file_name
            .strip_suffix(".sql")
            .map(|id| (id, FileKind::PlainSql))
    }
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn scan(&self) -> Result<BTreeMap<String, UnitFiles>> {
        let mut found: BTreeMap<String, UnitFiles> = BTreeMap::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                debug!("Skipping non UTF-8 file name {:?}", path);
                continue;
            };
            let Some((identifier, kind)) = classify(file_name) else {
                debug!("Skipping {:?}, not a migration file", path);
                continue;
            };

            let files = found.entry(identifier.to_string()).or_default();
            match kind {
                FileKind::Toml => files.toml = Some(path.clone()),
                FileKind::UpSql => files.up_sql = Some(path.clone()),
                FileKind::DownSql => files.down_sql = Some(path.clone()),
                FileKind::PlainSql => files.plain_sql = Some(path.clone()),
            }
        }

        Ok(found)
    }
}

impl ChangeSource for DirectorySource {
    fn units(&self) -> Result<Vec<MigrationUnit>> {
        if !self.dir.exists() {
            debug!("Migrations directory does not exist: {:?}", self.dir);
            return Ok(Vec::new());
        }

        let mut units = Vec::new();
        for (identifier, files) in self.scan()? {
            if files.forms() > 1 {
                return Err(StrataError::DuplicateIdentifier(identifier));
            }

            let unit = if let Some(path) = &files.toml {
                if files.down_sql.is_some() {
                    return Err(StrataError::InvalidMigration(format!(
                        "Migration '{}' has both a .toml file and a .down.sql script",
                        identifier
                    )));
                }
                parse_unit_file(&identifier, &std::fs::read_to_string(path)?)?
            } else if let Some(path) = &files.up_sql {
                let down = match &files.down_sql {
                    Some(down_path) => Some(std::fs::read_to_string(down_path)?),
                    None => None,
                };
                sql_unit(&identifier, std::fs::read_to_string(path)?, down)?
            } else if let Some(path) = &files.plain_sql {
                if files.down_sql.is_some() {
                    return Err(StrataError::InvalidMigration(format!(
                        "Migration '{}' has a .down.sql script but no .up.sql script",
                        identifier
                    )));
                }
                sql_unit(&identifier, std::fs::read_to_string(path)?, None)?
            } else {
                return Err(StrataError::InvalidMigration(format!(
                    "Migration '{}' has a .down.sql script but no .up.sql script",
                    identifier
                )));
            };

            units.push(unit);
        }

        debug!("Loaded {} migrations from {:?}", units.len(), self.dir);
        Ok(units)
    }
}

/// Units defined in code.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    units: Vec<MigrationUnit>,
}

impl StaticSource {
    pub fn new(units: Vec<MigrationUnit>) -> Self {
        Self { units }
    }

    pub fn push(mut self, unit: MigrationUnit) -> Self {
        self.units.push(unit);
        self
    }
}

impl ChangeSource for StaticSource {
    fn units(&self) -> Result<Vec<MigrationUnit>> {
        Ok(self.units.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use strata_core::migration::Revert;
    use strata_core::schema::SchemaOperation;
    use tempfile::TempDir;

    fn ids(units: &[MigrationUnit]) -> Vec<&str> {
        units.iter().map(|u| u.identifier()).collect()
    }

    #[test]
    fn test_nonexistent_dir_is_empty() {
        let source = DirectorySource::new("/nonexistent/strata/migrations");
        assert!(source.units().unwrap().is_empty());
    }

    #[test]
    fn test_loads_all_layouts_sorted() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("2025_01_03_000000_seed.sql"),
            "INSERT INTO t VALUES (1);",
        )
        .unwrap();
        fs::write(
            dir.path().join("2025_01_02_000000_add_col.up.sql"),
            "ALTER TABLE t ADD COLUMN c INT;",
        )
        .unwrap();
        fs::write(
            dir.path().join("2025_01_02_000000_add_col.down.sql"),
            "ALTER TABLE t DROP COLUMN c;",
        )
        .unwrap();
        fs::write(
            dir.path().join("2025_01_01_000000_create_t.toml"),
            "[[up]]\nop = \"raw\"\nsql = \"CREATE TABLE t (id INT)\"\n\n[[down]]\nop = \"drop_table\"\ntable = \"t\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "not a migration").unwrap();
        fs::write(dir.path().join("backup.sql.bak"), "nope").unwrap();
        fs::create_dir(dir.path().join("nested.sql")).unwrap();

        let units = DirectorySource::new(dir.path()).units().unwrap();
        assert_eq!(
            ids(&units),
            vec![
                "2025_01_01_000000_create_t",
                "2025_01_02_000000_add_col",
                "2025_01_03_000000_seed"
            ]
        );

        assert!(units[0].is_reversible());
        assert_eq!(
            units[1].revert(),
            &Revert::Reversible(vec![SchemaOperation::Raw {
                sql: "ALTER TABLE t DROP COLUMN c;".into()
            }])
        );
        assert!(!units[2].is_reversible());
    }

    #[test]
    fn test_orphan_down_script_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("2025_01_01_000000_x.down.sql"), "SELECT 1;").unwrap();

        assert!(matches!(
            DirectorySource::new(dir.path()).units(),
            Err(StrataError::InvalidMigration(_))
        ));
    }

    #[test]
    fn test_same_identifier_twice_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("2025_01_01_000000_x.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("2025_01_01_000000_x.toml"), "").unwrap();

        assert!(matches!(
            DirectorySource::new(dir.path()).units(),
            Err(StrataError::DuplicateIdentifier(id)) if id == "2025_01_01_000000_x"
        ));
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad name.sql"), "SELECT 1;").unwrap();

        assert!(matches!(
            DirectorySource::new(dir.path()).units(),
            Err(StrataError::InvalidMigration(_))
        ));
    }

    #[test]
    fn test_static_source() {
        let source = StaticSource::new(vec![MigrationUnit::new("b")]).push(MigrationUnit::new("a"));
        assert_eq!(ids(&source.units().unwrap()), vec!["b", "a"]);
    }
}
