//! Read-only registry of networks, validators and accounts
//!
//! Built once at suite setup and never mutated afterwards, so concurrent
//! scenarios share it through `Arc` without locking. Addresses come from the
//! orchestration layer (via configuration); nothing here is computed.

use std::collections::BTreeMap;

use crate::common::config::Config;
use crate::common::{Error, Result};

/// One validator's reachable surfaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorEndpoint {
    /// REST query address
    pub api: String,
    /// Execution context id (container) for commands
    pub context: String,
}

/// Marks a literal address where a role name is expected
pub const ADDRESS_PREFIX: &str = "address:";

/// A signing account registered under a role name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: String,
    /// Keyring entry passed as `--from`
    pub key: String,
}

#[derive(Debug, Clone, Default)]
struct Network {
    validators: Vec<ValidatorEndpoint>,
    accounts: BTreeMap<String, Account>,
}

/// Immutable topology of every network under test
#[derive(Debug, Clone, Default)]
pub struct ChainTopology {
    networks: BTreeMap<String, Network>,
    relayer: Option<String>,
}

impl ChainTopology {
    pub fn builder() -> TopologyBuilder {
        TopologyBuilder::default()
    }

    /// Build from the `[[networks]]` and `[relayer]` configuration sections
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Self::builder();
        for net in &config.networks {
            builder = builder.network(&net.id);
            for val in &net.validators {
                builder = builder.validator(&net.id, &val.api, &val.container);
            }
            for (role, acct) in &net.accounts {
                builder = builder.account(&net.id, role, &acct.address, &acct.key);
            }
        }
        if let Some(relayer) = &config.relayer.container {
            builder = builder.relayer(relayer);
        }
        builder.build()
    }

    /// Query address and execution context of a validator
    pub fn resolve(&self, network: &str, index: usize) -> Result<&ValidatorEndpoint> {
        self.network(network)?
            .validators
            .get(index)
            .ok_or_else(|| Error::not_found("validator", format!("{}[{}]", network, index)))
    }

    /// Address and signing key registered for `role`
    pub fn account(&self, network: &str, role: &str) -> Result<&Account> {
        self.network(network)?
            .accounts
            .get(role)
            .ok_or_else(|| Error::not_found("account", format!("{}/{}", network, role)))
    }

    /// Resolve a party named in a scenario or on the command line
    ///
    /// A registered role yields its address and signing key. An unregistered
    /// address must be marked `address:<addr>`; the address then doubles as
    /// the `--from` value. Anything else is `NotFound`.
    pub fn party(&self, network: &str, name: &str) -> Result<Account> {
        match name.strip_prefix(ADDRESS_PREFIX) {
            Some(address) if !address.is_empty() => Ok(Account {
                address: address.to_string(),
                key: address.to_string(),
            }),
            Some(_) => Err(Error::not_found("account", format!("{}/{}", network, name))),
            None => self.account(network, name).cloned(),
        }
    }

    /// Address of a party, see [`ChainTopology::party`]
    pub fn address(&self, network: &str, name: &str) -> Result<String> {
        Ok(self.party(network, name)?.address)
    }

    /// Execution context of the relayer
    pub fn relayer(&self) -> Result<&str> {
        self.relayer
            .as_deref()
            .ok_or_else(|| Error::not_found("relayer", "no relayer context configured"))
    }

    pub fn networks(&self) -> impl Iterator<Item = &str> {
        self.networks.keys().map(|k| k.as_str())
    }

    pub fn validators(&self, network: &str) -> Result<&[ValidatorEndpoint]> {
        Ok(&self.network(network)?.validators)
    }

    pub fn accounts(&self, network: &str) -> Result<impl Iterator<Item = (&str, &Account)>> {
        Ok(self
            .network(network)?
            .accounts
            .iter()
            .map(|(role, acct)| (role.as_str(), acct)))
    }

    fn network(&self, network: &str) -> Result<&Network> {
        self.networks
            .get(network)
            .ok_or_else(|| Error::not_found("network", network))
    }
}

/// Accumulates registrations; the only way to construct a topology
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    networks: BTreeMap<String, Network>,
    relayer: Option<String>,
    errors: Vec<String>,
}

impl TopologyBuilder {
    pub fn network(mut self, id: &str) -> Self {
        if self.networks.contains_key(id) {
            self.errors.push(format!("network '{}' registered twice", id));
        } else {
            self.networks.insert(id.to_string(), Network::default());
        }
        self
    }

    /// Append the next validator (index = registration order)
    pub fn validator(mut self, network: &str, api: &str, context: &str) -> Self {
        match self.networks.get_mut(network) {
            Some(net) => net.validators.push(ValidatorEndpoint {
                api: api.trim_end_matches('/').to_string(),
                context: context.to_string(),
            }),
            None => self
                .errors
                .push(format!("validator '{}' for unknown network '{}'", context, network)),
        }
        self
    }

    pub fn account(mut self, network: &str, role: &str, address: &str, key: &str) -> Self {
        match self.networks.get_mut(network) {
            Some(net) => {
                let previous = net.accounts.insert(
                    role.to_string(),
                    Account {
                        address: address.to_string(),
                        key: key.to_string(),
                    },
                );
                if previous.is_some() {
                    self.errors
                        .push(format!("account '{}' registered twice on '{}'", role, network));
                }
            }
            None => self
                .errors
                .push(format!("account '{}' for unknown network '{}'", role, network)),
        }
        self
    }

    pub fn relayer(mut self, context: &str) -> Self {
        self.relayer = Some(context.to_string());
        self
    }

    pub fn build(self) -> Result<ChainTopology> {
        if !self.errors.is_empty() {
            return Err(Error::Config(format!(
                "invalid topology: {}",
                self.errors.join("; ")
            )));
        }
        Ok(ChainTopology {
            networks: self.networks,
            relayer: self.relayer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> ChainTopology {
        ChainTopology::builder()
            .network("chain-a")
            .validator("chain-a", "http://localhost:1317/", "chain-a-val0")
            .validator("chain-a", "http://localhost:1318", "chain-a-val1")
            .account("chain-a", "alice", "tori1alice", "alice")
            .network("chain-b")
            .relayer("hermes-relayer")
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve() {
        let topo = topology();
        let val = topo.resolve("chain-a", 1).unwrap();
        assert_eq!(val.context, "chain-a-val1");
        assert_eq!(topo.resolve("chain-a", 0).unwrap().api, "http://localhost:1317");
        assert_eq!(topo.relayer().unwrap(), "hermes-relayer");
        assert_eq!(topo.address("chain-a", "alice").unwrap(), "tori1alice");
        assert_eq!(
            topo.address("chain-a", "address:tori1other").unwrap(),
            "tori1other"
        );
    }

    #[test]
    fn test_unknown_entries_are_not_found() {
        let topo = topology();
        assert!(matches!(
            topo.resolve("chain-a", 2),
            Err(Error::NotFound { what: "validator", .. })
        ));
        assert!(matches!(
            topo.resolve("chain-c", 0),
            Err(Error::NotFound { what: "network", .. })
        ));
        assert!(matches!(
            topo.account("chain-b", "alice"),
            Err(Error::NotFound { what: "account", .. })
        ));
        assert!(ChainTopology::default().relayer().is_err());
    }

    #[test]
    fn test_party_resolution() {
        let topo = topology();
        let alice = topo.party("chain-a", "alice").unwrap();
        assert_eq!(alice.address, "tori1alice");
        assert_eq!(alice.key, "alice");

        let literal = topo.party("chain-a", "address:tori1erin").unwrap();
        assert_eq!(literal.key, "tori1erin");

        // a misspelled role is never passed through as an address
        assert!(matches!(
            topo.party("chain-a", "alcie"),
            Err(Error::NotFound { what: "account", .. })
        ));
        assert!(topo.address("chain-a", "address:").is_err());
        assert!(topo.address("chain-x", "alice").is_err());
    }

    #[test]
    fn test_builder_rejects_inconsistent_registrations() {
        let err = ChainTopology::builder()
            .network("chain-a")
            .network("chain-a")
            .validator("chain-x", "http://x", "x0")
            .build()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("registered twice"));
        assert!(msg.contains("unknown network 'chain-x'"));
    }

    #[test]
    fn test_from_config() {
        let config = Config::parse(
            r#"
[relayer]
container = "hermes"

[[networks]]
id = "chain-a"
validators = [{ api = "http://a:1317", container = "a0" }]
accounts = { bob = { address = "tori1bob", key = "bob" } }
"#,
        )
        .unwrap();
        let topo = ChainTopology::from_config(&config).unwrap();
        assert_eq!(topo.account("chain-a", "bob").unwrap().address, "tori1bob");
        assert_eq!(topo.resolve("chain-a", 0).unwrap().context, "a0");
        assert_eq!(topo.networks().collect::<Vec<_>>(), vec!["chain-a"]);
    }

    #[test]
    fn test_topology_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChainTopology>();
    }
}
