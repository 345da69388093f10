//! Test scenario configuration types
//!
//! Defines the data structures for deserializing YAML test scenarios.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::tx::{with_flag, without_flag, FlagOverride};
use crate::validate::Validator;

/// A complete test scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct TestScenario {
    /// Name of the test scenario
    pub name: String,
    /// Optional description of what the test verifies
    pub description: Option<String>,
    /// Network every step targets
    pub network: String,
    /// Validator index commands are sent to
    #[serde(default)]
    pub validator: usize,
    /// The sequence of test steps to execute
    pub steps: Vec<TestStep>,
}

/// A single test step in the execution flow
///
/// Account fields take a role name registered for the network, or a
/// literal address written as `address:<addr>`. Unknown roles fail the step.
#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Record current balances for later relative assertions
    Snapshot {
        accounts: Vec<String>,
        /// Defaults to the configured denom
        denom: Option<String>,
    },
    /// `tx bank send`
    BankSend {
        from: String,
        to: String,
        amount: String,
        #[serde(default)]
        expect: TxExpectation,
        #[serde(default)]
        flags: FlagMap,
    },
    /// `tx bank multi-send`, `amount` to each recipient
    MultiSend {
        from: String,
        to: Vec<String>,
        amount: String,
        #[serde(default)]
        expect: TxExpectation,
        #[serde(default)]
        flags: FlagMap,
    },
    /// Any module transaction
    Tx {
        module: String,
        method: String,
        from: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        expect: TxExpectation,
        #[serde(default)]
        flags: FlagMap,
    },
    /// Eventually-consistent balance assertion
    ExpectBalance {
        account: String,
        /// Signed change relative to the last snapshot
        change: Option<i128>,
        /// Absolute expected balance, e.g. `1000stake`
        equals: Option<String>,
    },
    /// Relayer command classified from its JSON output
    Relay {
        args: Vec<String>,
        #[serde(default = "default_true")]
        success: bool,
    },
    /// `tx decode` of a base64 transaction
    Decode {
        tx: String,
        /// Substring the codec error must contain; decoding must succeed if absent
        error_contains: Option<String>,
    },
}

fn default_true() -> bool {
    true
}

/// How a transaction step is judged
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct TxExpectation {
    /// Expect a submission or on-chain failure
    #[serde(default)]
    pub error: bool,
    /// Expect the raw log to contain this text
    pub raw_log_contains: Option<String>,
}

impl TxExpectation {
    pub fn validator(&self) -> Validator {
        match &self.raw_log_contains {
            Some(substring) => Validator::ErrorSubstring(substring.clone()),
            None if self.error => Validator::ExpectError(true),
            None => Validator::Default,
        }
    }
}

/// Flag overrides; a `null` value removes the flag
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(transparent)]
pub struct FlagMap(pub BTreeMap<String, Option<String>>);

impl FlagMap {
    pub fn overrides(&self) -> Vec<FlagOverride> {
        self.0
            .iter()
            .map(|(key, value)| match value {
                Some(v) => with_flag(key, v),
                None => without_flag(key),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scenario() {
        let yaml = r#"
name: bank send
network: chain-a
steps:
  - action: snapshot
    accounts: [alice, bob]
  - action: bank_send
    from: alice
    to: bob
    amount: 1000stake
    flags:
      fees: 500stake
      gas-adjustment: null
  - action: expect_balance
    account: bob
    change: 1000
  - action: decode
    tx: CpoBCpcB
    error_contains: no concrete type registered
"#;
        let scenario: TestScenario = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scenario.validator, 0);
        assert_eq!(scenario.steps.len(), 4);
        match &scenario.steps[1] {
            TestStep::BankSend { expect, flags, .. } => {
                assert_eq!(expect.validator(), Validator::Default);
                let overrides = flags.overrides();
                assert_eq!(overrides.len(), 2);
                assert!(overrides.contains(&with_flag("fees", "500stake")));
                assert!(overrides.contains(&without_flag("gas-adjustment")));
            }
            other => panic!("Expected BankSend, got {other:?}"),
        }
        assert!(matches!(
            scenario.steps[2],
            TestStep::ExpectBalance { change: Some(1000), .. }
        ));
    }

    #[test]
    fn test_expectation_validator() {
        let error = TxExpectation {
            error: true,
            raw_log_contains: None,
        };
        assert_eq!(error.validator(), Validator::ExpectError(true));

        let substring = TxExpectation {
            error: true,
            raw_log_contains: Some("out of gas".to_string()),
        };
        assert_eq!(
            substring.validator(),
            Validator::ErrorSubstring("out of gas".to_string())
        );
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let yaml = "name: x\nnetwork: a\nsteps:\n  - action: teleport\n";
        assert!(serde_yaml::from_str::<TestScenario>(yaml).is_err());
    }
}
