//! Configuration file handling

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Defaults applied to every transaction command
    #[serde(default)]
    pub defaults: TxDefaults,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// How commands reach the nodes
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Relayer settings
    #[serde(default)]
    pub relayer: RelayerConfig,

    /// Networks under test
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
}

/// Defaults for transaction commands
#[derive(Debug, Deserialize, Clone)]
pub struct TxDefaults {
    /// Node binary inside the execution context
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Node home directory inside the execution context
    #[serde(default = "default_home")]
    pub home: String,

    #[serde(default = "default_keyring_backend")]
    pub keyring_backend: String,

    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_gas")]
    pub gas: String,

    #[serde(default = "default_gas_adjustment")]
    pub gas_adjustment: String,

    /// Fee attached to every transaction unless overridden
    #[serde(default = "default_fees")]
    pub fees: String,

    /// Staking/fee denomination used by balance assertions
    #[serde(default = "default_denom")]
    pub denom: String,
}

impl Default for TxDefaults {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            home: default_home(),
            keyring_backend: default_keyring_backend(),
            output: default_output(),
            gas: default_gas(),
            gas_adjustment: default_gas_adjustment(),
            fees: default_fees(),
            denom: default_denom(),
        }
    }
}

fn default_binary() -> String {
    "simd".to_string()
}
fn default_home() -> String {
    "/home/nonroot/.simapp".to_string()
}
fn default_keyring_backend() -> String {
    "test".to_string()
}
fn default_output() -> String {
    "json".to_string()
}
fn default_gas() -> String {
    "auto".to_string()
}
fn default_gas_adjustment() -> String {
    "1.5".to_string()
}
fn default_fees() -> String {
    "330000stake".to_string()
}
fn default_denom() -> String {
    "stake".to_string()
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Upper bound for a single command execution
    #[serde(default = "default_exec")]
    pub exec_secs: u64,

    /// Window for a submitted transaction to become queryable
    #[serde(default = "default_tx_confirm")]
    pub tx_confirm_secs: u64,

    /// Window for balances to reach an expected value
    #[serde(default = "default_balance")]
    pub balance_secs: u64,

    /// Delay between poll evaluations
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            exec_secs: default_exec(),
            tx_confirm_secs: default_tx_confirm(),
            balance_secs: default_balance(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_exec() -> u64 {
    60
}
fn default_tx_confirm() -> u64 {
    60
}
fn default_balance() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    5
}

impl Timeouts {
    pub fn exec(&self) -> Duration {
        Duration::from_secs(self.exec_secs)
    }

    pub fn tx_confirm(&self) -> Duration {
        Duration::from_secs(self.tx_confirm_secs)
    }

    pub fn balance(&self) -> Duration {
        Duration::from_secs(self.balance_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Execution backend
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    /// `<runtime> exec` into the validator's container
    #[default]
    Docker,
    /// Run directly on this host (nodes started as local processes)
    Local,
}

/// Executor configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub kind: ExecutorKind,

    /// Container runtime binary, resolved through PATH
    #[serde(default = "default_runtime")]
    pub runtime: String,

    /// User to run commands as inside the container
    #[serde(default = "default_user")]
    pub user: Option<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            kind: ExecutorKind::default(),
            runtime: default_runtime(),
            user: default_user(),
        }
    }
}

fn default_runtime() -> String {
    "docker".to_string()
}
fn default_user() -> Option<String> {
    Some("root".to_string())
}

/// Relayer configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RelayerConfig {
    #[serde(default = "default_relayer_binary")]
    pub binary: String,

    /// Execution context the relayer runs in
    pub container: Option<String>,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            binary: default_relayer_binary(),
            container: None,
        }
    }
}

fn default_relayer_binary() -> String {
    "hermes".to_string()
}

/// One network under test
#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    /// Chain id
    pub id: String,

    /// Validators in index order
    #[serde(default)]
    pub validators: Vec<ValidatorConfig>,

    /// Account roles (e.g. "alice") to address and key name
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
}

/// Endpoints of one validator
#[derive(Debug, Deserialize, Clone)]
pub struct ValidatorConfig {
    /// REST query endpoint, e.g. `http://localhost:1317`
    pub api: String,

    /// Container id or name commands are executed in
    pub container: String,
}

/// A signing account
#[derive(Debug, Deserialize, Clone)]
pub struct AccountConfig {
    pub address: String,

    /// Keyring entry used with `--from`
    pub key: String,
}

impl Config {
    /// Load configuration from `path`, or the default config file
    ///
    /// Returns default configuration if no path is given and the default
    /// file doesn't exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path: Option<PathBuf> = match path {
            Some(p) => Some(p.to_path_buf()),
            None => config_path().filter(|p| p.exists()),
        };

        match path {
            Some(path) => {
                let content = std::fs::read_to_string(&path).map_err(|e| Error::FileRead {
                    path: path.display().to_string(),
                    error: e.to_string(),
                })?;
                let config = Self::parse(&content)?;
                tracing::debug!(
                    path = %path.display(),
                    networks = config.networks.len(),
                    "Loaded config"
                );
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Resolve the container runtime to an executable path
    ///
    /// Falls back to the configured name when it is not on PATH so the
    /// spawn error surfaces at execution time with the original name.
    pub fn runtime_path(&self) -> PathBuf {
        which::which(&self.executor.runtime)
            .unwrap_or_else(|_| PathBuf::from(&self.executor.runtime))
    }
}
