//! Command composition
//!
//! Builds the argument vector for a node command from a template, ordered
//! positional arguments and a layered set of `--flag=value` options:
//!
//! ```text
//! binary path... positional... [-y] --key=value...
//! ```
//!
//! Options are kept in an ordered list so the same inputs always produce the
//! same argv.

use crate::common::config::TxDefaults;

pub const FLAG_FROM: &str = "from";
pub const FLAG_HOME: &str = "home";
pub const FLAG_FEES: &str = "fees";
pub const FLAG_GAS: &str = "gas";
pub const FLAG_GAS_PRICES: &str = "gas-prices";
pub const FLAG_OUTPUT: &str = "output";
pub const FLAG_CHAIN_ID: &str = "chain-id";
pub const FLAG_SPEND_LIMIT: &str = "spend-limit";
pub const FLAG_GAS_ADJUSTMENT: &str = "gas-adjustment";
pub const FLAG_FEE_GRANTER: &str = "fee-granter";
pub const FLAG_BROADCAST_MODE: &str = "broadcast-mode";
pub const FLAG_KEYRING_BACKEND: &str = "keyring-backend";
pub const FLAG_ALLOWED_MESSAGES: &str = "allowed-messages";

/// Flag suppressing interactive confirmation
pub const SKIP_CONFIRMATION: &str = "-y";

/// Ordered flag name to value mapping with unique keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    entries: Vec<(String, String)>,
}

impl OptionSet {
    /// Empty set, for commands that take no flags
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed defaults every transaction starts from
    pub fn tx_defaults(chain_id: &str, defaults: &TxDefaults) -> Self {
        let mut set = Self::new();
        set.set(FLAG_KEYRING_BACKEND, &defaults.keyring_backend);
        set.set(FLAG_OUTPUT, &defaults.output);
        set.set(FLAG_GAS, &defaults.gas);
        set.set(FLAG_GAS_ADJUSTMENT, &defaults.gas_adjustment);
        set.set(FLAG_CHAIN_ID, chain_id);
        set.set(FLAG_HOME, &defaults.home);
        set.set(FLAG_FEES, &defaults.fees);
        set
    }

    /// Set `key`, replacing an existing value in place
    pub fn set(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }

    /// Remove `key` if present
    pub fn unset(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply overrides in order; later overrides for a key win
    pub fn apply(mut self, overrides: &[FlagOverride]) -> Self {
        for o in overrides {
            o.apply(&mut self);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render as `--key=value` tokens
    pub fn to_flags(&self) -> Vec<String> {
        self.iter().map(|(k, v)| format!("--{}={}", k, v)).collect()
    }
}

/// A single-key override applied on top of the defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagOverride {
    Set { key: String, value: String },
    Unset { key: String },
}

impl FlagOverride {
    fn apply(&self, set: &mut OptionSet) {
        match self {
            FlagOverride::Set { key, value } => set.set(key, value),
            FlagOverride::Unset { key } => set.unset(key),
        }
    }
}

/// Override `key` with `value`
pub fn with_flag(key: &str, value: impl ToString) -> FlagOverride {
    FlagOverride::Set {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Drop `key` from the final option set (e.g. `fees` when `gas-prices` is used)
pub fn without_flag(key: &str) -> FlagOverride {
    FlagOverride::Unset {
        key: key.to_string(),
    }
}

/// A positional argument; lists are flattened in place
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Positional {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for Positional {
    fn from(s: &str) -> Self {
        Positional::One(s.to_string())
    }
}

impl From<String> for Positional {
    fn from(s: String) -> Self {
        Positional::One(s)
    }
}

impl From<&String> for Positional {
    fn from(s: &String) -> Self {
        Positional::One(s.clone())
    }
}

impl From<Vec<String>> for Positional {
    fn from(v: Vec<String>) -> Self {
        Positional::Many(v)
    }
}

impl From<&[String]> for Positional {
    fn from(v: &[String]) -> Self {
        Positional::Many(v.to_vec())
    }
}

/// The fixed part of a command: binary, subcommand path and base options
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    binary: String,
    path: Vec<String>,
    skip_confirmation: bool,
    base: OptionSet,
}

impl CommandTemplate {
    /// `binary tx <module> <method> ... -y` with the transaction defaults
    pub fn tx(defaults: &TxDefaults, chain_id: &str, module: &str, method: &str) -> Self {
        Self {
            binary: defaults.binary.clone(),
            path: vec!["tx".to_string(), module.to_string(), method.to_string()],
            skip_confirmation: true,
            base: OptionSet::tx_defaults(chain_id, defaults),
        }
    }

    /// Arbitrary subcommand path without options or confirmation flag
    pub fn new<S: AsRef<str>>(binary: &str, path: &[S]) -> Self {
        Self {
            binary: binary.to_string(),
            path: path.iter().map(|s| s.as_ref().to_string()).collect(),
            skip_confirmation: false,
            base: OptionSet::new(),
        }
    }

    /// Replace the base options
    pub fn with_options(mut self, base: OptionSet) -> Self {
        self.base = base;
        self
    }

    pub fn skip_confirmation(mut self, skip: bool) -> Self {
        self.skip_confirmation = skip;
        self
    }

    pub fn base(&self) -> &OptionSet {
        &self.base
    }
}

/// Compose the final argv
///
/// Pure: the same template, positionals and overrides always yield the
/// same vector.
pub fn build(
    template: &CommandTemplate,
    positional: &[Positional],
    overrides: &[FlagOverride],
) -> Vec<String> {
    let options = template.base.clone().apply(overrides);

    let capacity = 1 + template.path.len() + positional.len() + options.len() + 1;
    let mut argv = Vec::with_capacity(capacity);
    argv.push(template.binary.clone());
    argv.extend(template.path.iter().cloned());
    for arg in positional {
        match arg {
            Positional::One(s) => argv.push(s.clone()),
            Positional::Many(list) => argv.extend(list.iter().cloned()),
        }
    }
    if template.skip_confirmation {
        argv.push(SKIP_CONFIRMATION.to_string());
    }
    argv.extend(options.to_flags());
    argv
}
