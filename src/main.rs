//! ledger-e2e - End-to-end test harness for multi-node ledger networks
//!
//! Submits transactions to validator nodes through their command-line
//! client, confirms them through REST queries and runs YAML scenarios.

use std::path::PathBuf;

use clap::Parser;
use ledger_e2e::common::{config::Config, logging};
use ledger_e2e::{cli, commands::Commands};

#[derive(Parser)]
#[command(name = "ledger-e2e", about = "End-to-end test harness for ledger networks")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.config/ledger-e2e/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write a detailed run log under the data directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Held until exit so buffered file log lines are flushed
    let _guard = if cli.log_file {
        logging::init_with_file().map(|(path, guard)| {
            tracing::info!(path = %path.display(), "Writing run log");
            guard
        })
    } else {
        logging::init_cli();
        None
    };

    let result = match Config::load(cli.config.as_deref()) {
        Ok(config) => cli::dispatch(cli.command, config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
