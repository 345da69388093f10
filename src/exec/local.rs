//! Host process backend, for networks whose nodes run as local processes

use async_trait::async_trait;
use tokio::process::Command;

use super::{run_to_completion, ExecutionRequest, ExecutionResult, Executor};
use crate::common::{Error, Result};

/// Runs argv directly on this host; the context id only labels logs and errors
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let (program, args) = request
            .argv()
            .split_first()
            .ok_or_else(|| Error::execution(request.context(), "empty command"))?;

        tracing::debug!(context = request.context(), argv = ?request.argv(), "Executing locally");

        let mut cmd = Command::new(program);
        cmd.args(args);
        run_to_completion(cmd, request.context(), request.timeout()).await
    }
}
