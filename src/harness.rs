//! Suite-wide harness context
//!
//! A [`Harness`] is constructed once at suite setup and passed explicitly to
//! every scenario (usually behind an `Arc`). It owns the immutable topology,
//! the executor and the query client; nothing is global. Call
//! [`Harness::teardown`] when the suite is done.
//!
//! # Concurrency
//!
//! All methods take `&self` and may be called from concurrent tasks. The
//! harness does not serialize anything: an account that carries a sequence
//! number must not be used by two in-flight transactions at once. Scenarios
//! running in parallel must use disjoint accounts (or disjoint networks).

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::exec::{self, ExecutionRequest, ExecutionResult, Executor};
use crate::poll::Eventually;
use crate::query::{ChainQuery, RestClient};
use crate::relayer::{self, RelayerRecord};
use crate::topology::{Account, ChainTopology};
use crate::tx::builder::{
    FLAG_CHAIN_ID, FLAG_FROM, FLAG_HOME, FLAG_KEYRING_BACKEND, FLAG_OUTPUT, FLAG_SPEND_LIMIT,
};
use crate::tx::{build, with_flag, Coin, CommandTemplate, FlagOverride, OptionSet, Positional};
use crate::validate::{self, Confirmation, Validator};

/// A validator of a network, addressed by index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target<'a> {
    pub network: &'a str,
    pub validator: usize,
}

impl<'a> Target<'a> {
    pub fn new(network: &'a str, validator: usize) -> Self {
        Self { network, validator }
    }
}

/// Counters reported at teardown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub commands: usize,
    pub failed_validations: usize,
}

/// Explicit harness context
pub struct Harness {
    config: Config,
    topology: ChainTopology,
    executor: Box<dyn Executor>,
    query: Box<dyn ChainQuery>,
    commands: AtomicUsize,
    failed_validations: AtomicUsize,
}

impl Harness {
    pub fn new(
        config: Config,
        topology: ChainTopology,
        executor: Box<dyn Executor>,
        query: Box<dyn ChainQuery>,
    ) -> Self {
        Self {
            config,
            topology,
            executor,
            query,
            commands: AtomicUsize::new(0),
            failed_validations: AtomicUsize::new(0),
        }
    }

    /// Topology, executor and REST client as configured
    pub fn from_config(config: Config) -> Result<Self> {
        let topology = ChainTopology::from_config(&config)?;
        let executor = exec::from_config(&config);
        tracing::info!(
            networks = topology.networks().count(),
            executor = ?config.executor.kind,
            "Harness ready"
        );
        Ok(Self::new(config, topology, executor, Box::new(RestClient::new())))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn topology(&self) -> &ChainTopology {
        &self.topology
    }

    pub fn query(&self) -> &dyn ChainQuery {
        self.query.as_ref()
    }

    /// Polling policy for transaction confirmation
    pub fn tx_poll(&self) -> Eventually {
        Eventually::new(
            self.config.timeouts.tx_confirm(),
            self.config.timeouts.poll_interval(),
        )
    }

    /// Polling policy for balance convergence
    pub fn balance_poll(&self) -> Eventually {
        Eventually::new(
            self.config.timeouts.balance(),
            self.config.timeouts.poll_interval(),
        )
    }

    /// Run argv on a validator and return its raw output
    pub async fn execute(&self, target: Target<'_>, argv: Vec<String>) -> Result<ExecutionResult> {
        let endpoint = self.topology.resolve(target.network, target.validator)?;
        self.execute_in(&endpoint.context, argv).await
    }

    async fn execute_in(&self, context: &str, argv: Vec<String>) -> Result<ExecutionResult> {
        let request = ExecutionRequest::new(context, argv, self.config.timeouts.exec());
        self.commands.fetch_add(1, Ordering::Relaxed);
        tracing::info!(context, argv = ?request.argv(), "Executing");
        self.executor.execute(&request).await
    }

    /// Run a transaction command and classify its outcome
    ///
    /// Returns the raw output when the validator passes; a FAIL verdict
    /// becomes `Error::Validation` carrying stdout and stderr.
    pub async fn exec_tx(
        &self,
        target: Target<'_>,
        argv: Vec<String>,
        validator: &Validator,
    ) -> Result<ExecutionResult> {
        let endpoint = self.topology.resolve(target.network, target.validator)?;
        let result = self.execute_in(&endpoint.context, argv).await?;

        let confirm = Confirmation {
            query: self.query.as_ref(),
            api: &endpoint.api,
            poll: self.tx_poll(),
        };
        let verdict = validate::evaluate(validator, &result, &confirm).await;
        if !verdict.is_pass() {
            self.failed_validations.fetch_add(1, Ordering::Relaxed);
        }
        verdict.into_result(&result)?;
        Ok(result)
    }

    /// Compose `binary tx <module> <method> ...` for a network
    pub fn tx_command(
        &self,
        network: &str,
        module: &str,
        method: &str,
        positional: &[Positional],
        overrides: &[FlagOverride],
    ) -> Vec<String> {
        let template = CommandTemplate::tx(&self.config.defaults, network, module, method);
        build(&template, positional, overrides)
    }

    /// Generic module transaction
    pub async fn module_tx(
        &self,
        target: Target<'_>,
        module: &str,
        method: &str,
        positional: &[Positional],
        overrides: &[FlagOverride],
        validator: &Validator,
    ) -> Result<ExecutionResult> {
        tracing::info!(network = target.network, module, method, "Submitting transaction");
        let argv = self.tx_command(target.network, module, method, positional, overrides);
        self.exec_tx(target, argv, validator).await
    }

    // === Bank ===

    /// `tx bank send <from> <to> <amount>`
    pub async fn bank_send(
        &self,
        target: Target<'_>,
        from: &Account,
        to: &str,
        amount: &Coin,
        validator: &Validator,
        overrides: &[FlagOverride],
    ) -> Result<ExecutionResult> {
        let overrides = with_from(from, overrides);
        self.module_tx(
            target,
            "bank",
            "send",
            &[from.address.as_str().into(), to.into(), amount.to_string().into()],
            &overrides,
            validator,
        )
        .await
    }

    /// `tx bank multi-send <from> <to>... <amount>`, `amount` to each recipient
    pub async fn bank_multi_send(
        &self,
        target: Target<'_>,
        from: &Account,
        to: &[String],
        amount: &Coin,
        validator: &Validator,
        overrides: &[FlagOverride],
    ) -> Result<ExecutionResult> {
        let overrides = with_from(from, overrides);
        self.module_tx(
            target,
            "bank",
            "multi-send",
            &[from.address.as_str().into(), to.into(), amount.to_string().into()],
            &overrides,
            validator,
        )
        .await
    }

    // === Fee grants ===

    pub async fn fee_grant(
        &self,
        target: Target<'_>,
        granter: &Account,
        grantee: &str,
        spend_limit: &Coin,
        overrides: &[FlagOverride],
    ) -> Result<ExecutionResult> {
        let mut overrides = with_from(granter, overrides);
        overrides.push(with_flag(FLAG_SPEND_LIMIT, spend_limit));
        self.module_tx(
            target,
            "feegrant",
            "grant",
            &[granter.address.as_str().into(), grantee.into()],
            &overrides,
            &Validator::Default,
        )
        .await
    }

    pub async fn fee_grant_revoke(
        &self,
        target: Target<'_>,
        granter: &Account,
        grantee: &str,
        overrides: &[FlagOverride],
    ) -> Result<ExecutionResult> {
        let overrides = with_from(granter, overrides);
        self.module_tx(
            target,
            "feegrant",
            "revoke",
            &[granter.address.as_str().into(), grantee.into()],
            &overrides,
            &Validator::Default,
        )
        .await
    }

    // === Staking ===

    pub async fn delegate(
        &self,
        target: Target<'_>,
        delegator: &Account,
        validator_address: &str,
        amount: &Coin,
        overrides: &[FlagOverride],
    ) -> Result<ExecutionResult> {
        let overrides = with_from(delegator, overrides);
        self.module_tx(
            target,
            "staking",
            "delegate",
            &[validator_address.into(), amount.to_string().into()],
            &overrides,
            &Validator::Default,
        )
        .await
    }

    pub async fn unbond(
        &self,
        target: Target<'_>,
        delegator: &Account,
        validator_address: &str,
        amount: &Coin,
        overrides: &[FlagOverride],
    ) -> Result<ExecutionResult> {
        let overrides = with_from(delegator, overrides);
        self.module_tx(
            target,
            "staking",
            "unbond",
            &[validator_address.into(), amount.to_string().into()],
            &overrides,
            &Validator::Default,
        )
        .await
    }

    pub async fn redelegate(
        &self,
        target: Target<'_>,
        delegator: &Account,
        src_validator: &str,
        dst_validator: &str,
        amount: &Coin,
        overrides: &[FlagOverride],
    ) -> Result<ExecutionResult> {
        let overrides = with_from(delegator, overrides);
        self.module_tx(
            target,
            "staking",
            "redelegate",
            &[
                src_validator.into(),
                dst_validator.into(),
                amount.to_string().into(),
            ],
            &overrides,
            &Validator::Default,
        )
        .await
    }

    // === Distribution ===

    pub async fn fund_community_pool(
        &self,
        target: Target<'_>,
        from: &Account,
        amount: &Coin,
        overrides: &[FlagOverride],
    ) -> Result<ExecutionResult> {
        let overrides = with_from(from, overrides);
        self.module_tx(
            target,
            "distribution",
            "fund-community-pool",
            &[amount.to_string().into()],
            &overrides,
            &Validator::Default,
        )
        .await
    }

    pub async fn withdraw_rewards(
        &self,
        target: Target<'_>,
        delegator: &Account,
        validator_address: &str,
        overrides: &[FlagOverride],
    ) -> Result<ExecutionResult> {
        let overrides = with_from(delegator, overrides);
        self.module_tx(
            target,
            "distribution",
            "withdraw-rewards",
            &[validator_address.into()],
            &overrides,
            &Validator::Default,
        )
        .await
    }

    pub async fn set_withdraw_address(
        &self,
        target: Target<'_>,
        delegator: &Account,
        withdraw_address: &str,
        overrides: &[FlagOverride],
    ) -> Result<ExecutionResult> {
        let overrides = with_from(delegator, overrides);
        self.module_tx(
            target,
            "distribution",
            "set-withdraw-addr",
            &[withdraw_address.into()],
            &overrides,
            &Validator::Default,
        )
        .await
    }

    // === Slashing ===

    pub async fn unjail(
        &self,
        target: Target<'_>,
        from: &Account,
        overrides: &[FlagOverride],
    ) -> Result<ExecutionResult> {
        let overrides = with_from(from, overrides);
        self.module_tx(target, "slashing", "unjail", &[], &overrides, &Validator::Default)
            .await
    }

    // === Offline transactions ===

    /// Options for commands that operate on transaction files
    fn file_options(&self, network: &str, from: &Account) -> OptionSet {
        let defaults = &self.config.defaults;
        let mut set = OptionSet::new();
        set.set(FLAG_CHAIN_ID, network);
        set.set(FLAG_HOME, &defaults.home);
        set.set(FLAG_FROM, &from.key);
        set.set(FLAG_KEYRING_BACKEND, &defaults.keyring_backend);
        set.set(FLAG_OUTPUT, &defaults.output);
        set
    }

    /// Run a codec-style command: success means exit 0 with nothing on stderr
    async fn codec_command(&self, target: Target<'_>, argv: Vec<String>) -> Result<Vec<u8>> {
        let result = self.execute(target, argv).await?;
        if !result.success() || !result.stderr.is_empty() {
            return Err(Error::Codec(result.stderr_str().trim().to_string()));
        }
        Ok(result.stdout)
    }

    /// `tx sign <home>/<file>`; the signer must exist in the keyring and on chain
    pub async fn sign_tx_file(
        &self,
        target: Target<'_>,
        from: &Account,
        file: &str,
    ) -> Result<Vec<u8>> {
        let path = format!("{}/{}", self.config.defaults.home.trim_end_matches('/'), file);
        let template = CommandTemplate::new(&self.config.defaults.binary, &["tx", "sign"])
            .with_options(self.file_options(target.network, from))
            .skip_confirmation(true);
        self.codec_command(target, build(&template, &[path.into()], &[]))
            .await
    }

    /// `tx broadcast <home>/<file>`
    pub async fn broadcast_tx_file(
        &self,
        target: Target<'_>,
        from: &Account,
        file: &str,
    ) -> Result<Vec<u8>> {
        let path = format!("{}/{}", self.config.defaults.home.trim_end_matches('/'), file);
        let template = CommandTemplate::new(&self.config.defaults.binary, &["tx", "broadcast"])
            .with_options(self.file_options(target.network, from))
            .skip_confirmation(true);
        self.codec_command(target, build(&template, &[path.into()], &[]))
            .await
    }

    /// `tx encode <file>`, returning the base64 transaction bytes
    pub async fn encode(&self, target: Target<'_>, tx_file: &str) -> Result<String> {
        let template = CommandTemplate::new(&self.config.defaults.binary, &["tx", "encode"])
            .with_options(OptionSet::tx_defaults(target.network, &self.config.defaults));
        let stdout = self
            .codec_command(target, build(&template, &[tx_file.into()], &[]))
            .await?;
        Ok(String::from_utf8_lossy(&stdout).trim_end_matches('\n').to_string())
    }

    /// `tx decode <base64>`, returning the JSON transaction
    ///
    /// Fails with the codec's own message, e.g. when an extension option
    /// refers to a type with no registered concrete implementation.
    pub async fn decode(&self, target: Target<'_>, encoded: &str) -> Result<String> {
        let template = CommandTemplate::new(&self.config.defaults.binary, &["tx", "decode"])
            .with_options(OptionSet::tx_defaults(target.network, &self.config.defaults));
        let stdout = self
            .codec_command(target, build(&template, &[encoded.into()], &[]))
            .await?;
        Ok(String::from_utf8_lossy(&stdout).trim_end_matches('\n').to_string())
    }

    // === Queries ===

    /// Latest block height reported by the node's `status` command
    pub async fn latest_block_height(&self, target: Target<'_>) -> Result<u64> {
        let template = CommandTemplate::new(&self.config.defaults.binary, &["status"]);
        let result = self.execute(target, build(&template, &[], &[])).await?;
        // older node versions print status on stderr
        parse_block_height(&result.stdout).or_else(|_| parse_block_height(&result.stderr))
    }

    pub async fn balance(&self, target: Target<'_>, address: &str, denom: &str) -> Result<Coin> {
        let endpoint = self.topology.resolve(target.network, target.validator)?;
        self.query.balance(&endpoint.api, address, denom).await
    }

    /// Poll until `address` holds exactly `expected`
    pub async fn await_balance(
        &self,
        target: Target<'_>,
        address: &str,
        expected: &Coin,
    ) -> Result<()> {
        let endpoint = self.topology.resolve(target.network, target.validator)?;
        let api = endpoint.api.as_str();
        let query = self.query.as_ref();
        self.balance_poll()
            .context(format!("balance of {} never reached {}", address, expected))
            .until_ok(|| async move {
                match query.balance(api, address, &expected.denom).await {
                    Ok(actual) if &actual == expected => Ok(()),
                    Ok(actual) => Err(format!("balance {}", actual)),
                    Err(e) => Err(e.to_string()),
                }
            })
            .await
    }

    // === Relayer ===

    /// Run a relayer command in the relayer context and classify its output
    pub async fn relay<S: AsRef<str>>(&self, args: &[S]) -> Result<Option<RelayerRecord>> {
        let context = self.topology.relayer()?;
        let argv = relayer::command(&self.config.relayer.binary, args);
        let result = self.execute_in(context, argv).await?;
        relayer::scan(&result.stdout[..]).await
    }

    /// End the suite and report counters
    pub fn teardown(self) -> Summary {
        let summary = Summary {
            commands: self.commands.load(Ordering::Relaxed),
            failed_validations: self.failed_validations.load(Ordering::Relaxed),
        };
        tracing::info!(
            commands = summary.commands,
            failed_validations = summary.failed_validations,
            "Harness torn down"
        );
        summary
    }
}

/// Overrides with `--from <key>` prepended, so explicit caller overrides still win
fn with_from(from: &Account, overrides: &[FlagOverride]) -> Vec<FlagOverride> {
    let mut all = Vec::with_capacity(overrides.len() + 1);
    all.push(with_flag(FLAG_FROM, &from.key));
    all.extend(overrides.iter().cloned());
    all
}

/// Extract `latest_block_height` from node status JSON; a node that has not
/// produced a block yet reports 0, which is rejected
pub fn parse_block_height(output: &[u8]) -> Result<u64> {
    let status: serde_json::Value =
        serde_json::from_slice(output).map_err(|e| Error::decode("node status", e))?;
    let sync = status
        .get("SyncInfo")
        .or_else(|| status.get("sync_info"))
        .ok_or_else(|| Error::decode("node status", "missing sync info"))?;
    let height = sync
        .get("latest_block_height")
        .and_then(|h| h.as_str())
        .ok_or_else(|| Error::decode("node status", "missing latest_block_height"))?;
    match height.parse::<u64>() {
        Ok(0) => Err(Error::decode("node status", "latest_block_height is 0")),
        Ok(height) => Ok(height),
        Err(e) => Err(Error::decode("node status", e)),
    }
}
