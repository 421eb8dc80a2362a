mod make;
mod migrate;
mod reset;
mod rollback;
mod status;
mod unlock;

pub use make::MakeMigrationCommand;
pub use migrate::MigrateCommand;
pub use reset::ResetCommand;
pub use rollback::RollbackCommand;
pub use status::StatusCommand;
pub use unlock::UnlockCommand;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use console::style;
use tracing::debug;

use strata_core::config::StrataConfig;
use strata_core::error::StrataError;
use strata_runtime::{Database, DirectorySource, MigrationEngine, RollbackReport};

use crate::logging;

/// Strata - schema migrations for PostgreSQL and SQLite
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Configuration file path.
    #[arg(short, long, default_value = "strata.toml", global = true)]
    pub config: String,

    /// Database URL, overriding the configuration file and DATABASE_URL.
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Migrations directory, overriding the configuration file.
    #[arg(short, long, global = true)]
    pub path: Option<String>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run all pending migrations.
    Migrate(MigrateCommand),

    /// Roll back the last batch, a given batch, or a number of steps.
    #[command(name = "migrate:rollback")]
    Rollback(RollbackCommand),

    /// Show which migrations have run.
    #[command(name = "migrate:status")]
    Status(StatusCommand),

    /// Roll back every migration.
    #[command(name = "migrate:reset")]
    Reset(ResetCommand),

    /// Clear a migration lock left behind by an interrupted run.
    #[command(name = "migrate:unlock")]
    Unlock(UnlockCommand),

    /// Create a new migration file.
    #[command(name = "make:migration")]
    MakeMigration(MakeMigrationCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let config = load_config(&self.global)?;
        logging::init(&config.logging, self.global.verbose);

        match self.command {
            Commands::Migrate(cmd) => cmd.execute(config).await,
            Commands::Rollback(cmd) => cmd.execute(config).await,
            Commands::Status(cmd) => cmd.execute(config).await,
            Commands::Reset(cmd) => cmd.execute(config).await,
            Commands::Unlock(cmd) => cmd.execute(config).await,
            Commands::MakeMigration(cmd) => cmd.execute(config).await,
        }
    }
}

/// Resolve configuration: file values, then `DATABASE_URL` if the file has
/// no URL, then command-line flags.
pub fn load_config(global: &GlobalArgs) -> Result<StrataConfig> {
    let config_path = Path::new(&global.config);
    let mut config = if config_path.exists() {
        StrataConfig::from_file(config_path)?
    } else {
        StrataConfig::default()
    };

    if config.database.url.is_empty() {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }
    }
    if let Some(url) = &global.database_url {
        config.database.url = url.clone();
    }
    if let Some(path) = &global.path {
        config.migrations.directory = path.clone();
    }

    config.validate()?;
    Ok(config)
}

/// An open connection and an engine over the configured directory.
pub(crate) struct Session {
    pub db: Database,
    pub engine: MigrationEngine,
}

impl Session {
    pub async fn open(config: &StrataConfig) -> Result<Self> {
        if config.database.url.is_empty() {
            anyhow::bail!(
                "No database configured.\nSet [database].url in strata.toml, DATABASE_URL, or pass --database-url."
            );
        }

        let db = Database::from_config(&config.database).await?;
        debug!("Reading migrations from {}", config.migrations.directory);
        let source = Arc::new(DirectorySource::new(&config.migrations.directory));
        let engine = db.migration_engine(source, &config.migrations)?;
        Ok(Self { db, engine })
    }

    pub async fn close(self) {
        self.db.close().await;
    }
}

/// Identifier of the migration a failure is about, if any.
pub fn failed_identifier(err: &anyhow::Error) -> Option<&str> {
    err.downcast_ref::<StrataError>()
        .and_then(|e| e.identifier())
}

pub(crate) fn print_header(title: &str) {
    println!();
    println!(
        "  {}  {} {}",
        style("▤").bold(),
        style("STRATA").bold().cyan(),
        title
    );
    println!();
}

pub(crate) fn print_rollback_report(report: &RollbackReport) {
    if report.is_empty() {
        println!("  {} Nothing to roll back", style("ℹ").blue());
        return;
    }

    for identifier in &report.reverted {
        println!("  {} Rolled back: {}", style("✓").green(), identifier);
    }
    for unit in &report.irreversible {
        println!(
            "  {} Forgot irreversible migration: {} ({})",
            style("!").yellow(),
            unit.identifier,
            style(&unit.reason).dim()
        );
    }
    println!();
    println!(
        "  {} Rolled back {} migration(s)",
        style("✓").green(),
        report.len()
    );
}

pub(crate) fn print_preview(entries: &[strata_runtime::PreviewEntry]) {
    for entry in entries {
        println!("  {} {}", style("→").dim(), style(&entry.identifier).cyan());
        if entry.statements.is_empty() {
            println!("      {}", style("(no statements)").dim());
        }
        for statement in &entry.statements {
            println!("      {};", statement);
        }
    }
}
