//! Outcome classification for executed transaction commands
//!
//! Each call site picks one [`Validator`]; [`evaluate`] interprets the
//! captured output and, where the variant requires it, polls the node until
//! the transaction's fate is known. Malformed output is a FAIL verdict,
//! never a panic.

use serde::Deserialize;

use crate::common::{truncate_output, Error, Result};
use crate::exec::ExecutionResult;
use crate::poll::Eventually;
use crate::query::ChainQuery;

/// Structured response printed by a transaction command
///
/// `code == 0` only means the node accepted the transaction for local
/// processing, not that it was included in a block.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TxEnvelope {
    #[serde(default)]
    pub code: u32,
    #[serde(alias = "tx_hash")]
    pub txhash: String,
    #[serde(default)]
    pub raw_log: String,
}

impl TxEnvelope {
    /// Decode command stdout
    pub fn decode(stdout: &[u8]) -> Result<Self> {
        serde_json::from_slice(stdout).map_err(|e| Error::decode("transaction envelope", e))
    }
}

/// How to classify a transaction command's outcome
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Validator {
    /// Accepted locally (code 0) and later found on chain
    #[default]
    Default,
    /// On-chain lookup ends in error/not-found iff `true`
    ExpectError(bool),
    /// Raw log contains the given text; no chain query
    ErrorSubstring(String),
}

/// Classification result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    /// Convert a FAIL into a validation error carrying the raw output
    pub fn into_result(self, result: &ExecutionResult) -> Result<()> {
        match self {
            Verdict::Pass => Ok(()),
            Verdict::Fail(reason) => Err(Error::validation(reason, &result.stdout, &result.stderr)),
        }
    }
}

/// Where and how long to look for a submitted transaction
pub struct Confirmation<'a> {
    pub query: &'a dyn ChainQuery,
    /// Query endpoint of the validator that received the transaction
    pub api: &'a str,
    pub poll: Eventually,
}

/// Classify `result` with `validator`
///
/// Chain queries, if any, are issued only here, i.e. after the process that
/// produced the transaction has terminated.
pub async fn evaluate(
    validator: &Validator,
    result: &ExecutionResult,
    confirm: &Confirmation<'_>,
) -> Verdict {
    let verdict = match validator {
        Validator::Default => expect_committed(result, confirm).await,
        Validator::ExpectError(expect_err) => expect_outcome(*expect_err, result, confirm).await,
        Validator::ErrorSubstring(expected) => expect_raw_log(expected, result),
    };

    match &verdict {
        Verdict::Pass => tracing::debug!(?validator, "Validation passed"),
        Verdict::Fail(reason) => tracing::warn!(?validator, reason = %reason, "Validation failed"),
    }
    verdict
}

fn diagnostics(result: &ExecutionResult) -> String {
    format!(
        "stdOut: {}, stdErr: {}",
        truncate_output(result.stdout_str().trim(), 500),
        truncate_output(result.stderr_str().trim(), 500)
    )
}

async fn expect_committed(result: &ExecutionResult, confirm: &Confirmation<'_>) -> Verdict {
    let envelope = match TxEnvelope::decode(&result.stdout) {
        Ok(envelope) => envelope,
        Err(e) => return Verdict::Fail(e.to_string()),
    };

    if envelope.code != 0 {
        return Verdict::Fail(
            Error::ChainRejection {
                code: envelope.code,
                raw_log: envelope.raw_log,
            }
            .to_string(),
        );
    }

    let hash = envelope.txhash.as_str();
    let poll = confirm
        .poll
        .clone()
        .context(format!("tx {} not committed; {}", hash, diagnostics(result)));

    match poll
        .until_ok(|| async move {
            confirm
                .query
                .tx_by_hash(confirm.api, hash)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .await
    {
        Ok(()) => Verdict::Pass,
        Err(e) => Verdict::Fail(e.to_string()),
    }
}

async fn expect_outcome(
    expect_err: bool,
    result: &ExecutionResult,
    confirm: &Confirmation<'_>,
) -> Verdict {
    // An undecodable envelope has no hash, so the lookup can only ever fail.
    let hash = match TxEnvelope::decode(&result.stdout) {
        Ok(envelope) => envelope.txhash,
        Err(e) if expect_err => {
            tracing::debug!(error = %e, "Envelope not decoded, expecting failed lookup");
            String::new()
        }
        Err(e) => return Verdict::Fail(e.to_string()),
    };

    let hash = hash.as_str();
    let poll = confirm.poll.clone().context(format!(
        "tx {} lookup never {}; {}",
        if hash.is_empty() { "<none>" } else { hash },
        if expect_err { "failed" } else { "succeeded" },
        diagnostics(result)
    ));

    let outcome = poll
        .until_ok(|| async move {
            let lookup = if hash.is_empty() {
                Err("no transaction hash".to_string())
            } else {
                confirm
                    .query
                    .tx_by_hash(confirm.api, hash)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            };
            match (lookup, expect_err) {
                (Err(_), true) | (Ok(()), false) => Ok(()),
                (Ok(()), true) => Err("transaction resolved".to_string()),
                (Err(e), false) => Err(e),
            }
        })
        .await;

    match outcome {
        Ok(()) => Verdict::Pass,
        Err(e) => Verdict::Fail(e.to_string()),
    }
}

fn expect_raw_log(expected: &str, result: &ExecutionResult) -> Verdict {
    match TxEnvelope::decode(&result.stdout) {
        Ok(envelope) if envelope.raw_log.contains(expected) => Verdict::Pass,
        Ok(envelope) => Verdict::Fail(format!(
            "raw log '{}' does not contain '{}'",
            truncate_output(&envelope.raw_log, 300),
            expected
        )),
        Err(e) => Verdict::Fail(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::TxRecord;
    use crate::tx::Coin;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Resolves a hash once it has been looked up `after` times
    struct FakeChain {
        committed: HashMap<String, u32>,
        calls: AtomicU32,
    }

    impl FakeChain {
        fn new(committed: &[(&str, u32)]) -> Self {
            Self {
                committed: committed.iter().map(|(h, n)| (h.to_string(), *n)).collect(),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ChainQuery for FakeChain {
        async fn tx_by_hash(&self, _api: &str, hash: &str) -> Result<TxRecord> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.committed.get(hash) {
                Some(after) if n >= *after => Ok(TxRecord {
                    txhash: hash.to_string(),
                    height: "10".to_string(),
                    code: 0,
                    raw_log: String::new(),
                }),
                _ => Err(Error::query("fake", "tx not found")),
            }
        }

        async fn balance(&self, _api: &str, _address: &str, denom: &str) -> Result<Coin> {
            Ok(Coin::zero(denom))
        }
    }

    fn output(stdout: &str) -> ExecutionResult {
        ExecutionResult {
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
            exit_code: Some(0),
        }
    }

    fn confirm(chain: &FakeChain) -> Confirmation<'_> {
        Confirmation {
            query: chain,
            api: "http://val0:1317",
            poll: Eventually::new(Duration::from_millis(200), Duration::from_millis(20)),
        }
    }

    #[test]
    fn test_decode_envelope() {
        let raw = br#"{"height":"0","txhash":"AB","code":0,"raw_log":"[]"}"#;
        let env = TxEnvelope::decode(raw).unwrap();
        assert_eq!(env.txhash, "AB");
        let env = TxEnvelope::decode(br#"{"tx_hash":"CD","code":13}"#).unwrap();
        assert_eq!(env.txhash, "CD");
        assert_eq!(env.code, 13);
        assert!(TxEnvelope::decode(b"Error: key not found").is_err());
        assert!(TxEnvelope::decode(b"").is_err());
    }

    #[tokio::test]
    async fn test_default_passes_once_committed() {
        let chain = FakeChain::new(&[("AB", 2)]);
        let verdict = evaluate(
            &Validator::Default,
            &output(r#"{"txhash":"AB","code":0}"#),
            &confirm(&chain),
        )
        .await;
        assert_eq!(verdict, Verdict::Pass);
        assert_eq!(chain.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_default_fails_on_nonzero_code_without_querying() {
        let chain = FakeChain::new(&[("AB", 0)]);
        let verdict = evaluate(
            &Validator::Default,
            &output(r#"{"txhash":"AB","code":13,"raw_log":"insufficient fee"}"#),
            &confirm(&chain),
        )
        .await;
        match verdict {
            Verdict::Fail(reason) => assert!(reason.contains("insufficient fee")),
            Verdict::Pass => panic!("Expected FAIL"),
        }
        assert_eq!(chain.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_default_fails_on_malformed_stdout() {
        let chain = FakeChain::new(&[]);
        let verdict = evaluate(&Validator::Default, &output("not json"), &confirm(&chain)).await;
        assert!(!verdict.is_pass());
    }

    #[tokio::test]
    async fn test_default_fails_when_never_committed() {
        let chain = FakeChain::new(&[]);
        let verdict = evaluate(
            &Validator::Default,
            &output(r#"{"txhash":"AB","code":0}"#),
            &confirm(&chain),
        )
        .await;
        match verdict {
            Verdict::Fail(reason) => assert!(reason.contains("tx not found")),
            Verdict::Pass => panic!("Expected FAIL"),
        }
    }

    #[tokio::test]
    async fn test_expect_error_true() {
        let chain = FakeChain::new(&[("COMMITTED", 0)]);
        let missing = evaluate(
            &Validator::ExpectError(true),
            &output(r#"{"txhash":"MISSING","code":0}"#),
            &confirm(&chain),
        )
        .await;
        assert_eq!(missing, Verdict::Pass);

        let committed = evaluate(
            &Validator::ExpectError(true),
            &output(r#"{"txhash":"COMMITTED","code":0}"#),
            &confirm(&chain),
        )
        .await;
        assert!(!committed.is_pass());
    }

    #[tokio::test]
    async fn test_expect_error_false() {
        let chain = FakeChain::new(&[("AB", 1)]);
        let verdict = evaluate(
            &Validator::ExpectError(false),
            &output(r#"{"txhash":"AB","code":0}"#),
            &confirm(&chain),
        )
        .await;
        assert_eq!(verdict, Verdict::Pass);
    }

    #[tokio::test]
    async fn test_expect_error_with_undecodable_output() {
        let chain = FakeChain::new(&[]);
        let verdict = evaluate(
            &Validator::ExpectError(true),
            &output("Error: insufficient funds"),
            &confirm(&chain),
        )
        .await;
        assert_eq!(verdict, Verdict::Pass);
        assert_eq!(chain.calls.load(Ordering::SeqCst), 0);

        let verdict = evaluate(
            &Validator::ExpectError(false),
            &output("Error: insufficient funds"),
            &confirm(&chain),
        )
        .await;
        assert!(!verdict.is_pass());
    }

    #[tokio::test]
    async fn test_error_substring() {
        let chain = FakeChain::new(&[]);
        let out = output(r#"{"txhash":"AB","code":4,"raw_log":"signature verification failed"}"#);
        assert_eq!(
            evaluate(
                &Validator::ErrorSubstring("verification failed".into()),
                &out,
                &confirm(&chain)
            )
            .await,
            Verdict::Pass
        );
        assert!(!evaluate(&Validator::ErrorSubstring("out of gas".into()), &out, &confirm(&chain))
            .await
            .is_pass());
        assert!(!evaluate(&Validator::ErrorSubstring("x".into()), &output("{"), &confirm(&chain))
            .await
            .is_pass());
        assert_eq!(chain.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fail_verdict_attaches_output() {
        let out = output("garbage");
        let err = Verdict::Fail("bad".into()).into_result(&out).unwrap_err();
        match err {
            Error::Validation { stdout, .. } => assert_eq!(stdout, "garbage"),
            other => panic!("Expected Validation, got {other:?}"),
        }
    }
}
