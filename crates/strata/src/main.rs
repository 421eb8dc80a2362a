use clap::Parser;
use console::style;

use strata::cli::{failed_identifier, Cli};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(e) = cli.execute().await {
        eprintln!();
        eprintln!("  {} {:#}", style("✗").red().bold(), e);
        if let Some(identifier) = failed_identifier(&e) {
            eprintln!("  {} Failed migration: {}", style("→").dim(), style(identifier).red());
        }
        eprintln!();
        std::process::exit(1);
    }
}
