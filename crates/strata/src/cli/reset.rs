use anyhow::Result;
use clap::Parser;
use console::style;
use dialoguer::Confirm;

use strata_core::config::StrataConfig;
use strata_core::migration::RollbackTarget;

use super::{print_header, print_preview, print_rollback_report, Session};

/// Roll back every applied migration.
#[derive(Parser, Debug)]
pub struct ResetCommand {
    /// Skip the confirmation prompt.
    #[arg(long)]
    pub force: bool,

    /// Print the SQL that would run without running it.
    #[arg(long)]
    pub pretend: bool,
}

impl ResetCommand {
    pub async fn execute(self, config: StrataConfig) -> Result<()> {
        let session = Session::open(&config).await?;
        print_header("Reset");

        if self.pretend {
            let preview = session.engine.preview_rollback(RollbackTarget::All).await?;
            print_preview(&preview);
            println!();
            session.close().await;
            return Ok(());
        }

        if !self.force {
            let confirmed = Confirm::new()
                .with_prompt("Roll back ALL migrations? Tables they created will be dropped")
                .default(false)
                .interact()?;
            if !confirmed {
                println!("  {} Cancelled", style("ℹ").blue());
                println!();
                session.close().await;
                return Ok(());
            }
        }

        let report = session.engine.rollback(RollbackTarget::All).await?;
        print_rollback_report(&report);
        println!();

        session.close().await;
        Ok(())
    }
}
