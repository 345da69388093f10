//! Command execution inside node execution contexts
//!
//! An execution context is an opaque id (usually a container name) that
//! addresses one running validator. Executors run a composed argv there,
//! capture the complete output and bound the call by a timeout. They never
//! retry; confirmation and backoff belong to [`crate::poll`].

mod container;
mod local;

pub use container::ContainerExecutor;
pub use local::LocalExecutor;

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::common::config::{Config, ExecutorKind};
use crate::common::{Error, Result};

/// A command to run in a specific execution context
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    context: String,
    argv: Vec<String>,
    timeout: Duration,
}

impl ExecutionRequest {
    pub fn new(context: impl Into<String>, argv: Vec<String>, timeout: Duration) -> Self {
        Self {
            context: context.into(),
            argv,
            timeout,
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Complete output of a terminated process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs commands in execution contexts
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run the request to completion
    ///
    /// Returns `Error::Timeout` without partial output when the deadline
    /// passes, and `Error::Execution` immediately when the context cannot
    /// be reached or the process cannot be started.
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult>;
}

/// Build the executor selected in the configuration
pub fn from_config(config: &Config) -> Box<dyn Executor> {
    match config.executor.kind {
        ExecutorKind::Docker => Box::new(ContainerExecutor::new(
            config.runtime_path(),
            config.executor.user.clone(),
        )),
        ExecutorKind::Local => Box::new(LocalExecutor::new()),
    }
}

/// Spawn `cmd`, wait for it under `timeout` and collect both streams
///
/// A timed-out child is left running; callers keep timeouts conservative.
async fn run_to_completion(
    mut cmd: Command,
    context: &str,
    timeout: Duration,
) -> Result<ExecutionResult> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let child = cmd
        .spawn()
        .map_err(|e| Error::execution(context, format!("failed to spawn: {}", e)))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(ExecutionResult {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.status.code(),
        }),
        Ok(Err(e)) => Err(Error::execution(
            context,
            format!("failed to collect output: {}", e),
        )),
        Err(_) => Err(Error::Timeout {
            context: context.to_string(),
            timeout,
        }),
    }
}
