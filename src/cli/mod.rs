//! CLI command handling
//!
//! Builds the harness from configuration, dispatches commands and formats
//! output.

use std::sync::Arc;

use colored::Colorize;
use tokio::io::BufReader;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::harness::{Harness, Target};
use crate::relayer;
use crate::testing::{self, TestResult};
use crate::tx::Coin;
use crate::validate::Validator;

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Test {
            paths,
            verbose,
            parallel,
        } => {
            let harness = Arc::new(Harness::from_config(config)?);
            let results = testing::run_all(Arc::clone(&harness), &paths, verbose, parallel).await;

            if let Ok(harness) = Arc::try_unwrap(harness) {
                harness.teardown();
            }

            let failed = print_test_summary(&paths, &results);
            if failed > 0 {
                return Err(Error::TestAssertion(format!(
                    "{} of {} scenario(s) failed",
                    failed,
                    results.len()
                )));
            }
            Ok(())
        }

        Commands::Send {
            network,
            from,
            to,
            amount,
            validator,
            expect_error,
        } => {
            let harness = Harness::from_config(config)?;
            let topology = harness.topology();
            let amount: Coin = amount.parse()?;
            let from = topology.party(&network, &from)?;
            let to = topology.address(&network, &to)?;

            let result = harness
                .bank_send(
                    Target::new(&network, validator),
                    &from,
                    &to,
                    &amount,
                    &expectation(expect_error),
                    &[],
                )
                .await?;

            println!("{}", result.stdout_str().trim());
            println!("Sent {} from {} to {}", amount, from.address, to);
            harness.teardown();
            Ok(())
        }

        Commands::MultiSend {
            network,
            from,
            amount,
            to,
            validator,
            expect_error,
        } => {
            let harness = Harness::from_config(config)?;
            let topology = harness.topology();
            let amount: Coin = amount.parse()?;
            let from = topology.party(&network, &from)?;
            let to = to
                .iter()
                .map(|r| topology.address(&network, r))
                .collect::<Result<Vec<String>>>()?;

            let result = harness
                .bank_multi_send(
                    Target::new(&network, validator),
                    &from,
                    &to,
                    &amount,
                    &expectation(expect_error),
                    &[],
                )
                .await?;

            println!("{}", result.stdout_str().trim());
            println!(
                "Sent {} from {} to each of {} recipient(s)",
                amount,
                from.address,
                to.len()
            );
            harness.teardown();
            Ok(())
        }

        Commands::Balance {
            network,
            account,
            denom,
            validator,
        } => {
            let denom = denom.unwrap_or_else(|| config.defaults.denom.clone());
            let harness = Harness::from_config(config)?;
            let address = harness.topology().address(&network, &account)?;

            let balance = harness
                .balance(Target::new(&network, validator), &address, &denom)
                .await?;
            println!("{}: {}", address, balance);
            Ok(())
        }

        Commands::Height { network, validator } => {
            let harness = Harness::from_config(config)?;
            let height = harness
                .latest_block_height(Target::new(&network, validator))
                .await?;
            println!("{}", height);
            Ok(())
        }

        Commands::Topology => {
            let harness = Harness::from_config(config)?;
            print_topology(&harness)
        }

        Commands::RelayerScan { input } => {
            let record = if input == "-" {
                relayer::scan(BufReader::new(tokio::io::stdin())).await?
            } else {
                let file = tokio::fs::File::open(&input).await.map_err(|e| Error::FileRead {
                    path: input.clone(),
                    error: e.to_string(),
                })?;
                relayer::scan(BufReader::new(file)).await?
            };

            match record.and_then(|r| r.result) {
                Some(result) => println!("{}", result),
                None => println!("No relayer result"),
            }
            Ok(())
        }
    }
}

fn expectation(expect_error: bool) -> Validator {
    if expect_error {
        Validator::ExpectError(true)
    } else {
        Validator::Default
    }
}

fn print_topology(harness: &Harness) -> Result<()> {
    let topology = harness.topology();
    let mut any = false;

    for network in topology.networks() {
        any = true;
        println!("{}", network.bold());

        println!("  Validators:");
        for (i, val) in topology.validators(network)?.iter().enumerate() {
            println!("    [{}] {} ({})", i, val.context, val.api.dimmed());
        }

        println!("  Accounts:");
        for (role, account) in topology.accounts(network)? {
            println!("    {:<12} {} (key: {})", role, account.address, account.key.dimmed());
        }
    }

    if !any {
        println!("No networks configured");
    }

    if let Ok(relayer) = topology.relayer() {
        println!("Relayer: {}", relayer);
    }
    Ok(())
}

/// Print a summary line per scenario; returns how many failed
fn print_test_summary(paths: &[std::path::PathBuf], results: &[Result<TestResult>]) -> usize {
    let mut failed = 0;

    if results.len() > 1 {
        println!("{}", "Summary:".cyan());
    }

    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(r) if r.passed => {
                if results.len() > 1 {
                    println!("  {} {}", "✓".green(), r.name);
                }
            }
            Ok(r) => {
                failed += 1;
                println!(
                    "  {} {} (step {}/{}): {}",
                    "✗".red(),
                    r.name,
                    r.steps_run,
                    r.steps_total,
                    r.error.as_deref().unwrap_or("failed")
                );
            }
            Err(e) => {
                failed += 1;
                println!("  {} {}: {}", "✗".red(), path.display(), e);
            }
        }
    }
    failed
}
