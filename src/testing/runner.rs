//! Test runner implementation
//!
//! Executes test scenarios against a shared [`Harness`], asserting on
//! structured command results and eventually-consistent chain state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use futures_util::future::join_all;

use crate::common::{Error, Result};
use crate::harness::{Harness, Target};
use crate::topology::Account;
use crate::tx::builder::FLAG_FROM;
use crate::tx::{with_flag, Coin, Positional};

use super::config::{FlagMap, TestScenario, TestStep, TxExpectation};

/// Result of a test run
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub steps_run: usize,
    pub steps_total: usize,
    pub error: Option<String>,
}

/// Load and parse a YAML scenario
pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read test scenario '{}': {}",
            path.display(),
            e
        ))
    })?;

    serde_yaml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse test scenario: {}", e)))
}

/// Run a test scenario from a YAML file
pub async fn run_scenario(harness: &Harness, path: &Path, verbose: bool) -> Result<TestResult> {
    let scenario = load_scenario(path)?;
    Ok(run(harness, scenario, verbose).await)
}

/// Run several scenario files, optionally concurrently
///
/// Concurrent scenarios must not share signing accounts; see
/// [`Harness`] for the sequence-number constraint.
pub async fn run_all(
    harness: Arc<Harness>,
    paths: &[PathBuf],
    verbose: bool,
    parallel: bool,
) -> Vec<Result<TestResult>> {
    if parallel {
        let runs = paths.iter().map(|path| {
            let harness = Arc::clone(&harness);
            async move { run_scenario(&harness, path, verbose).await }
        });
        join_all(runs).await
    } else {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            results.push(run_scenario(&harness, path, verbose).await);
        }
        results
    }
}

/// Run an already parsed scenario
pub async fn run(harness: &Harness, scenario: TestScenario, verbose: bool) -> TestResult {
    let steps_total = scenario.steps.len();

    println!(
        "\n{} {}",
        "Running Test:".blue().bold(),
        scenario.name.white().bold()
    );

    if let Some(desc) = &scenario.description {
        println!("  {}", desc.dimmed());
    }

    let mut runner = ScenarioRunner {
        harness,
        target: Target::new(&scenario.network, scenario.validator),
        snapshots: HashMap::new(),
        verbose,
    };

    println!("\n{}", "Steps:".cyan());

    for (i, step) in scenario.steps.iter().enumerate() {
        let step_num = i + 1;

        match runner.execute_step(step).await {
            Ok(summary) => {
                println!("  {} Step {}: {}", "✓".green(), step_num, summary.dimmed());
            }
            Err(e) => {
                println!("  {} Step {}: {}", "✗".red(), step_num, e);
                if e.is_infrastructure() {
                    tracing::error!(
                        scenario = %scenario.name,
                        step = step_num,
                        error = %e,
                        "Infrastructure fault"
                    );
                }

                return TestResult {
                    name: scenario.name.clone(),
                    passed: false,
                    steps_run: step_num,
                    steps_total,
                    error: Some(e.to_string()),
                };
            }
        }
    }

    println!(
        "\n{} {}\n",
        "✓".green().bold(),
        "Test Passed".green().bold()
    );

    TestResult {
        name: scenario.name,
        passed: true,
        steps_run: steps_total,
        steps_total,
        error: None,
    }
}

/// Per-scenario state
struct ScenarioRunner<'a> {
    harness: &'a Harness,
    target: Target<'a>,
    /// Balances keyed by resolved address
    snapshots: HashMap<String, Coin>,
    verbose: bool,
}

impl ScenarioRunner<'_> {
    fn party(&self, name: &str) -> Result<Account> {
        self.harness.topology().party(self.target.network, name)
    }

    fn address(&self, name: &str) -> Result<String> {
        self.harness.topology().address(self.target.network, name)
    }

    fn denom(&self, denom: Option<&String>) -> String {
        denom
            .cloned()
            .unwrap_or_else(|| self.harness.config().defaults.denom.clone())
    }

    /// Execute a single test step, returning a one-line summary
    async fn execute_step(&mut self, step: &TestStep) -> Result<String> {
        match step {
            TestStep::Snapshot { accounts, denom } => {
                self.execute_snapshot(accounts, denom.as_ref()).await
            }
            TestStep::BankSend {
                from,
                to,
                amount,
                expect,
                flags,
            } => {
                self.execute_send(from, std::slice::from_ref(to), amount, expect, flags, false)
                    .await
            }
            TestStep::MultiSend {
                from,
                to,
                amount,
                expect,
                flags,
            } => self.execute_send(from, to, amount, expect, flags, true).await,
            TestStep::Tx {
                module,
                method,
                from,
                args,
                expect,
                flags,
            } => self.execute_tx(module, method, from, args, expect, flags).await,
            TestStep::ExpectBalance {
                account,
                change,
                equals,
            } => {
                self.execute_expect_balance(account, *change, equals.as_deref())
                    .await
            }
            TestStep::Relay { args, success } => self.execute_relay(args, *success).await,
            TestStep::Decode { tx, error_contains } => {
                self.execute_decode(tx, error_contains.as_deref()).await
            }
        }
    }

    async fn execute_snapshot(
        &mut self,
        accounts: &[String],
        denom: Option<&String>,
    ) -> Result<String> {
        let denom = self.denom(denom);
        for account in accounts {
            let address = self.address(account)?;
            let balance = self.harness.balance(self.target, &address, &denom).await?;
            if self.verbose {
                println!("    {} = {}", account, balance.to_string().dimmed());
            }
            self.snapshots.insert(address, balance);
        }
        Ok(format!("snapshot {}", accounts.join(", ")))
    }

    async fn execute_send(
        &mut self,
        from: &str,
        to: &[String],
        amount: &str,
        expect: &TxExpectation,
        flags: &FlagMap,
        multi: bool,
    ) -> Result<String> {
        let amount: Coin = amount.parse()?;
        let sender = self.party(from)?;
        let recipients = to
            .iter()
            .map(|r| self.address(r))
            .collect::<Result<Vec<String>>>()?;
        let validator = expect.validator();
        let overrides = flags.overrides();

        let result = if multi {
            self.harness
                .bank_multi_send(self.target, &sender, &recipients, &amount, &validator, &overrides)
                .await?
        } else {
            self.harness
                .bank_send(self.target, &sender, &recipients[0], &amount, &validator, &overrides)
                .await?
        };

        if self.verbose {
            println!("    {}", result.stdout_str().trim().dimmed());
        }
        let kind = if multi { "multi-send" } else { "send" };
        Ok(format!("{} {} {} -> {}", kind, amount, from, to.join(", ")))
    }

    async fn execute_tx(
        &mut self,
        module: &str,
        method: &str,
        from: &str,
        args: &[String],
        expect: &TxExpectation,
        flags: &FlagMap,
    ) -> Result<String> {
        let mut overrides = vec![with_flag(FLAG_FROM, self.party(from)?.key)];
        overrides.extend(flags.overrides());
        let positional: Vec<Positional> = args.iter().map(Positional::from).collect();

        let result = self
            .harness
            .module_tx(
                self.target,
                module,
                method,
                &positional,
                &overrides,
                &expect.validator(),
            )
            .await?;

        if self.verbose {
            println!("    {}", result.stdout_str().trim().dimmed());
        }
        Ok(format!("tx {} {}", module, method))
    }

    async fn execute_expect_balance(
        &mut self,
        account: &str,
        change: Option<i128>,
        equals: Option<&str>,
    ) -> Result<String> {
        let address = self.address(account)?;
        let expected = match (change, equals) {
            (_, Some(equals)) => equals.parse::<Coin>()?,
            (Some(change), None) => {
                let before = self.snapshots.get(&address).ok_or_else(|| {
                    Error::TestAssertion(format!("No snapshot taken for '{}'", account))
                })?;
                before.checked_apply(change).ok_or_else(|| {
                    Error::TestAssertion(format!(
                        "Change {} to {} is out of range",
                        change, before
                    ))
                })?
            }
            (None, None) => {
                return Err(Error::Config(
                    "expect_balance needs 'change' or 'equals'".to_string(),
                ))
            }
        };

        self.harness
            .await_balance(self.target, &address, &expected)
            .await?;
        Ok(format!("balance {} == {}", account, expected))
    }

    async fn execute_relay(&mut self, args: &[String], success: bool) -> Result<String> {
        let outcome = self.harness.relay(args).await;
        let summary = format!("relay {}", args.join(" "));

        match (outcome, success) {
            (Ok(record), true) => {
                if self.verbose {
                    if let Some(result) = record.and_then(|r| r.result) {
                        println!("    {}", result.to_string().dimmed());
                    }
                }
                Ok(summary)
            }
            (Err(Error::Relayer(_) | Error::RelayerStatus(_)), false) => {
                Ok(format!("{} (expected failure)", summary))
            }
            (Ok(_), false) => Err(Error::TestAssertion(format!(
                "Relayer command '{}' expected to fail but succeeded",
                args.join(" ")
            ))),
            (Err(e), _) => Err(e),
        }
    }

    async fn execute_decode(&mut self, tx: &str, error_contains: Option<&str>) -> Result<String> {
        let outcome = self.harness.decode(self.target, tx).await;

        match (outcome, error_contains) {
            (Ok(json), None) => {
                if self.verbose {
                    println!("    {}", json.dimmed());
                }
                Ok("decode".to_string())
            }
            (Err(Error::Codec(message)), Some(expected)) => {
                if message.contains(expected) {
                    Ok(format!("decode rejected: {}", expected))
                } else {
                    Err(Error::TestAssertion(format!(
                        "Expected decode error containing '{}', got '{}'",
                        expected, message
                    )))
                }
            }
            (Ok(_), Some(expected)) => Err(Error::TestAssertion(format!(
                "Expected decode error containing '{}', but decoding succeeded",
                expected
            ))),
            (Err(e), _) => Err(e),
        }
    }
}
