//! Error types for the e2e harness
//!
//! Messages carry enough context (network, validator, captured output) to
//! diagnose a failed scenario from the test log alone.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Execution Errors ===
    #[error("Execution in context '{context}' failed: {reason}")]
    Execution { context: String, reason: String },

    #[error("Command in context '{context}' timed out after {}s", .timeout.as_secs_f64())]
    Timeout { context: String, timeout: Duration },

    // === Polling Errors ===
    #[error(
        "Condition not met after {}s ({attempts} attempts): {context}{}",
        .elapsed.as_secs_f64(),
        last_observation(.last)
    )]
    PollTimeout {
        context: String,
        elapsed: Duration,
        attempts: u32,
        last: Option<String>,
    },

    // === Decode Errors ===
    #[error("Failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    // === Validation Errors ===
    #[error("Transaction rejected with code {code}: {raw_log}")]
    ChainRejection { code: u32, raw_log: String },

    #[error("Exec validation failed: {reason}\nstdout: {stdout}\nstderr: {stderr}")]
    Validation {
        reason: String,
        stdout: String,
        stderr: String,
    },

    // === Relayer Errors ===
    #[error("Relayer command failed: {0}")]
    Relayer(String),

    #[error("Relayer command returned failed status: {0}")]
    RelayerStatus(String),

    // === Topology Errors ===
    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    // === Query Errors ===
    #[error("Query {url} failed: {reason}")]
    Query { url: String, reason: String },

    // === Codec Errors ===
    #[error("Codec command failed: {0}")]
    Codec(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Test Errors ===
    #[error("Test assertion failed: {0}")]
    TestAssertion(String),
}

fn last_observation(last: &Option<String>) -> String {
    match last {
        Some(obs) => format!(" (last observed: {})", obs),
        None => String::new(),
    }
}

impl Error {
    /// Create an execution error for a context
    pub fn execution(context: &str, reason: impl Into<String>) -> Self {
        Self::Execution {
            context: context.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a decode error
    pub fn decode(what: &str, reason: impl ToString) -> Self {
        Self::Decode {
            what: what.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a not found error
    pub fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            key: key.into(),
        }
    }

    /// Create a query error
    pub fn query(url: &str, reason: impl ToString) -> Self {
        Self::Query {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a validation failure with the captured process output attached
    pub fn validation(reason: impl Into<String>, stdout: &[u8], stderr: &[u8]) -> Self {
        Self::Validation {
            reason: reason.into(),
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        }
    }

    /// Whether this error is an infrastructure fault that must abort the scenario
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Error::Execution { .. } | Error::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_timeout_message_includes_last_observation() {
        let err = Error::PollTimeout {
            context: "tx ABC".to_string(),
            elapsed: Duration::from_secs(2),
            attempts: 3,
            last: Some("tx not found".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("tx ABC"));
        assert!(msg.contains("last observed: tx not found"));
    }

    #[test]
    fn test_validation_attaches_output() {
        let err = Error::validation("code 5", b"{\"code\":5}", b"");
        match &err {
            Error::Validation { stdout, .. } => assert_eq!(stdout, "{\"code\":5}"),
            _ => panic!("Expected Validation error"),
        }
        assert!(!err.is_infrastructure());
        assert!(Error::execution("val0", "no such container").is_infrastructure());
    }
}
