use anyhow::Result;
use clap::Parser;
use console::style;

use strata_core::config::StrataConfig;
use strata_core::migration::{BatchNumber, RollbackTarget};

use super::{print_header, print_preview, print_rollback_report, Session};

/// Roll back migrations.
#[derive(Parser, Debug)]
pub struct RollbackCommand {
    /// Roll back this batch instead of the latest one.
    #[arg(long, conflicts_with = "step")]
    pub batch: Option<i64>,

    /// Roll back this many migrations, newest first, across batches.
    #[arg(long)]
    pub step: Option<usize>,

    /// Print the SQL that would run without running it.
    #[arg(long)]
    pub pretend: bool,
}

impl RollbackCommand {
    pub fn target(&self) -> RollbackTarget {
        match (self.batch, self.step) {
            (Some(batch), _) => RollbackTarget::Batch(BatchNumber::new(batch)),
            (None, Some(steps)) => RollbackTarget::Steps(steps),
            (None, None) => RollbackTarget::LastBatch,
        }
    }

    pub async fn execute(self, config: StrataConfig) -> Result<()> {
        let session = Session::open(&config).await?;
        print_header("Rollback");

        let target = self.target();
        if self.pretend {
            let preview = session.engine.preview_rollback(target).await?;
            if preview.is_empty() {
                println!("  {} Nothing to roll back", style("ℹ").blue());
            }
            print_preview(&preview);
            println!();
            session.close().await;
            return Ok(());
        }

        println!("  {} Rolling back {}...", style("→").dim(), target);
        let report = session.engine.rollback(target).await?;
        print_rollback_report(&report);
        println!();

        session.close().await;
        Ok(())
    }
}
