use anyhow::Result;
use clap::Parser;
use console::style;
use dialoguer::Confirm;

use strata_core::config::StrataConfig;

use super::{print_header, Session};

/// Clear a migration lock left behind by an interrupted run.
#[derive(Parser, Debug)]
pub struct UnlockCommand {
    /// Skip the confirmation prompt.
    #[arg(long)]
    pub force: bool,
}

impl UnlockCommand {
    pub async fn execute(self, config: StrataConfig) -> Result<()> {
        let session = Session::open(&config).await?;
        print_header("Unlock");

        if !self.force {
            let confirmed = Confirm::new()
                .with_prompt("Clear the migration lock? Only do this if no migration is running")
                .default(false)
                .interact()?;
            if !confirmed {
                println!("  {} Cancelled", style("ℹ").blue());
                println!();
                session.close().await;
                return Ok(());
            }
        }

        if session.engine.force_unlock().await? {
            println!("  {} Migration lock cleared", style("✓").green());
        } else {
            println!("  {} No migration lock to clear", style("ℹ").blue());
        }
        println!();

        session.close().await;
        Ok(())
    }
}
