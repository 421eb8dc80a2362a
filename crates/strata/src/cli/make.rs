use anyhow::Result;
use clap::Parser;
use console::style;

use strata_core::config::StrataConfig;
use strata_runtime::MigrationGenerator;

/// Create a new migration file.
#[derive(Parser, Debug)]
pub struct MakeMigrationCommand {
    /// Snake-case name, e.g. create_users_table.
    pub name: String,
}

impl MakeMigrationCommand {
    pub async fn execute(self, config: StrataConfig) -> Result<()> {
        let generator = MigrationGenerator::new(&config.migrations.directory);
        let path = generator.create(&self.name)?;

        println!(
            "  {} Created migration: {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_into_configured_directory() {
        let dir = TempDir::new().unwrap();
        let mut config = StrataConfig::default();
        config.migrations.directory = dir.path().join("migrations").display().to_string();

        MakeMigrationCommand {
            name: "create_users_table".into(),
        }
        .execute(config)
        .await
        .unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path().join("migrations"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("_create_users_table.toml"));
    }

    #[tokio::test]
    async fn test_rejects_bad_name() {
        let dir = TempDir::new().unwrap();
        let mut config = StrataConfig::default();
        config.migrations.directory = dir.path().display().to_string();

        let result = MakeMigrationCommand {
            name: "Create Users".into(),
        }
        .execute(config)
        .await;
        assert!(result.is_err());
    }
}
