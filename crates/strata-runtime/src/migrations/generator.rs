use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use strata_core::error::{Result, StrataError};
use strata_core::migration::validate_identifier;

/// Writes new, empty migration files.
pub struct MigrationGenerator {
    /// Output directory for migrations.
    output_dir: PathBuf,
}

impl MigrationGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create `<timestamp>_<name>.toml` and return its path.
    pub fn create(&self, name: &str) -> Result<PathBuf> {
        self.create_at(name, Utc::now())
    }

    /// Like [`create`](Self::create) with an explicit timestamp.
    pub fn create_at(&self, name: &str, now: DateTime<Utc>) -> Result<PathBuf> {
        validate_name(name)?;

        let identifier = format!("{}_{}", now.format("%Y_%m_%d_%H%M%S"), name);
        validate_identifier(&identifier)?;

        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{}.toml", identifier));
        if path.exists() {
            return Err(StrataError::InvalidMigration(format!(
                "Migration file {} already exists",
                path.display()
            )));
        }

        std::fs::write(&path, template(name))?;
        info!("Created migration {}", identifier);
        Ok(path)
    }
}

/// Names are snake_case: lowercase letters, digits and underscores, starting with a letter.
fn validate_name(name: &str) -> Result<()> {
    let valid = name.starts_with(|c: char| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(StrataError::InvalidMigration(format!(
            "Migration name '{}' must be snake_case (e.g. create_users_table)",
            name
        )))
    }
}

/// `create_<table>_table` and `create_<table>` get a table skeleton.
fn guess_created_table(name: &str) -> Option<&str> {
    let rest = name.strip_prefix("create_")?;
    let table = rest.strip_suffix("_table").unwrap_or(rest);
    (!table.is_empty()).then_some(table)
}

fn template(name: &str) -> String {
    match guess_created_table(name) {
        Some(table) => format!(
            r#"description = "{name}"

[[up]]
op = "create_table"
name = "{table}"
timestamps = true

[[up.columns]]
name = "id"
type = "bigint"
primary_key = true
auto_increment = true

[[down]]
op = "drop_table"
table = "{table}"
if_exists = true
"#
        ),
        None => format!(
            r#"description = "{name}"

# Operations run by `migrate`, in order.
# [[up]]
# op = "add_column"
# table = "users"
# column = {{ name = "nickname", type = "varchar(100)", nullable = true }}

# Operations run by `migrate:rollback`. Leave them out and set
# irreversible = "reason" instead if this change cannot be undone.
down = []
"#
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::unit_file::parse_unit_file;
    use chrono::TimeZone;
    use strata_core::migration::Revert;
    use strata_core::schema::SchemaOperation;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 8, 9, 30, 15).unwrap()
    }

    #[test]
    fn test_create_table_template() {
        let dir = TempDir::new().unwrap();
        let generator = MigrationGenerator::new(dir.path().join("migrations"));

        let path = generator
            .create_at("create_sales_reps_table", fixed_time())
            .unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "2025_01_08_093015_create_sales_reps_table.toml"
        );

        let content = std::fs::read_to_string(&path).unwrap();
        let unit = parse_unit_file("2025_01_08_093015_create_sales_reps_table", &content).unwrap();
        assert!(unit.is_reversible());
        match &unit.up_operations()[0] {
            SchemaOperation::CreateTable(def) => assert_eq!(def.name, "sales_reps"),
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn test_create_table_template_drops_if_exists() {
        let dir = TempDir::new().unwrap();
        let generator = MigrationGenerator::new(dir.path());

        let path = generator.create_at("create_invoices", fixed_time()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let unit = parse_unit_file("2025_01_08_093015_create_invoices", &content).unwrap();
        assert_eq!(
            unit.revert(),
            &Revert::Reversible(vec![SchemaOperation::drop_table_if_exists("invoices")])
        );
    }

    #[test]
    fn test_blank_template_parses() {
        let dir = TempDir::new().unwrap();
        let generator = MigrationGenerator::new(dir.path());

        let path = generator.create_at("add_commission_tier", fixed_time()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let unit = parse_unit_file("x", &content).unwrap();
        assert!(unit.up_operations().is_empty());
        assert!(unit.is_reversible());
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let generator = MigrationGenerator::new(dir.path());

        generator.create_at("add_x", fixed_time()).unwrap();
        assert!(generator.create_at("add_x", fixed_time()).is_err());
    }

    #[test]
    fn test_rejects_bad_names() {
        let generator = MigrationGenerator::new("unused");
        for name in ["", "AddUsers", "add users", "1_add", "add-users"] {
            assert!(validate_name(name).is_err(), "{} should be rejected", name);
            assert!(generator.create_at(name, fixed_time()).is_err());
        }
    }

    #[test]
    fn test_guess_created_table() {
        assert_eq!(guess_created_table("create_users_table"), Some("users"));
        assert_eq!(guess_created_table("create_users"), Some("users"));
        assert_eq!(guess_created_table("create_"), None);
        assert_eq!(guess_created_table("add_users"), None);
    }
}
