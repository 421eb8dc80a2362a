use anyhow::Result;
use clap::Parser;
use console::style;

use strata_core::config::StrataConfig;
use strata_runtime::ApplyOptions;

use super::{print_header, print_preview, Session};

/// Run all pending migrations.
#[derive(Parser, Debug)]
pub struct MigrateCommand {
    /// Print the SQL that would run without running it.
    #[arg(long)]
    pub pretend: bool,

    /// Put each migration in its own batch so it can be rolled back alone.
    #[arg(long)]
    pub step: bool,
}

impl MigrateCommand {
    pub async fn execute(self, config: StrataConfig) -> Result<()> {
        let session = Session::open(&config).await?;
        print_header("Migrations");

        let plan = session.engine.plan().await?;
        if plan.is_empty() {
            println!("  {} Nothing to migrate", style("ℹ").blue());
            println!();
            session.close().await;
            return Ok(());
        }

        if self.pretend {
            let preview = session.engine.preview(&plan).await?;
            print_preview(&preview);
            println!();
            session.close().await;
            return Ok(());
        }

        println!(
            "  {} Running {} pending migration(s)...",
            style("→").dim(),
            plan.len()
        );
        let report = session
            .engine
            .apply(&plan, ApplyOptions { step: self.step })
            .await?;

        for record in &report.applied {
            println!(
                "  {} Migrated: {} {}",
                style("✓").green(),
                record.identifier,
                style(format!("(batch {})", record.batch)).dim()
            );
        }
        println!();

        session.close().await;
        Ok(())
    }
}
