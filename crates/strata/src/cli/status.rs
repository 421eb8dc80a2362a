use anyhow::Result;
use clap::Parser;
use console::style;
use serde::Serialize;

use strata_core::config::StrataConfig;
use strata_core::migration::{StatusEntry, StatusReport};

use super::{print_header, Session};

/// Show which migrations have run.
#[derive(Parser, Debug)]
pub struct StatusCommand {
    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct JsonStatus {
    migrations: Vec<StatusEntry>,
    orphans: Vec<String>,
}

impl JsonStatus {
    fn from_report(report: &StatusReport) -> Self {
        Self {
            migrations: report.iter().collect(),
            orphans: report
                .orphans()
                .iter()
                .map(|r| r.identifier.clone())
                .collect(),
        }
    }
}

impl StatusCommand {
    pub async fn execute(self, config: StrataConfig) -> Result<()> {
        let session = Session::open(&config).await?;
        let report = session.engine.status().await?;
        session.close().await;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&JsonStatus::from_report(&report))?
            );
            return Ok(());
        }

        print_header("Migration Status");

        if report.is_empty() {
            println!("  {} No migrations found", style("ℹ").blue());
            println!();
            return Ok(());
        }

        for entry in report.iter() {
            let revert_marker = if entry.reversible {
                style("↓").green().to_string()
            } else {
                style("-").dim().to_string()
            };

            match (entry.batch, entry.applied_at) {
                (Some(batch), Some(applied_at)) => println!(
                    "  {} {} {} {}",
                    style("✓").green(),
                    revert_marker,
                    style(&entry.identifier).cyan(),
                    style(format!(
                        "batch {} at {}",
                        batch,
                        applied_at.format("%Y-%m-%d %H:%M:%S")
                    ))
                    .dim()
                ),
                _ => println!(
                    "  {} {} {}",
                    style("○").yellow(),
                    revert_marker,
                    style(&entry.identifier).yellow()
                ),
            }
        }

        for orphan in report.orphans() {
            println!(
                "  {} {} {}",
                style("!").red(),
                style(&orphan.identifier).red(),
                style("applied, but no migration file found").dim()
            );
        }

        println!();
        println!(
            "  {} {} applied, {} pending",
            style("ℹ").blue(),
            report.applied_count(),
            report.pending_count()
        );
        println!(
            "  {} = reversible, {} = irreversible",
            style("↓").green(),
            style("-").dim()
        );
        println!();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::migration::{AppliedRecord, BatchNumber, MigrationUnit};

    #[test]
    fn test_json_status_shape() {
        let units = vec![
            MigrationUnit::new("2025_01_01_000000_a").reversible_noop(),
            MigrationUnit::new("2025_01_02_000000_b"),
        ];
        let ledger = vec![
            AppliedRecord::new("2025_01_01_000000_a", BatchNumber::FIRST),
            AppliedRecord::new("2024_12_31_000000_gone", BatchNumber::FIRST),
        ];
        let report = StatusReport::build(&units, &ledger).unwrap();

        let value = serde_json::to_value(JsonStatus::from_report(&report)).unwrap();
        let migrations = value["migrations"].as_array().unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0]["identifier"], "2025_01_01_000000_a");
        assert_eq!(migrations[0]["applied"], true);
        assert_eq!(migrations[0]["batch"], 1);
        assert_eq!(migrations[0]["reversible"], true);
        assert_eq!(migrations[1]["applied"], false);
        assert!(migrations[1]["applied_at"].is_null());
        assert_eq!(value["orphans"][0], "2024_12_31_000000_gone");
    }
}
