//! `docker exec` / `podman exec` backend

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use super::{run_to_completion, ExecutionRequest, ExecutionResult, Executor};
use crate::common::{truncate_output, Error, Result};

/// Exit codes the runtime reserves for its own failures: the exec could not
/// be created (125), or the command could not be invoked (126) or found (127).
const RUNTIME_FAILURE_CODES: [i32; 3] = [125, 126, 127];

/// Executes commands inside running containers via the runtime CLI
#[derive(Debug, Clone)]
pub struct ContainerExecutor {
    runtime: PathBuf,
    user: Option<String>,
}

impl ContainerExecutor {
    pub fn new(runtime: impl Into<PathBuf>, user: Option<String>) -> Self {
        Self {
            runtime: runtime.into(),
            user,
        }
    }

    /// Arguments passed to the runtime binary
    fn runtime_args(&self, request: &ExecutionRequest) -> Vec<String> {
        let mut args = vec!["exec".to_string()];
        if let Some(user) = &self.user {
            args.push("--user".to_string());
            args.push(user.clone());
        }
        args.push(request.context().to_string());
        args.extend(request.argv().iter().cloned());
        args
    }
}

#[async_trait]
impl Executor for ContainerExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        if request.argv().is_empty() {
            return Err(Error::execution(request.context(), "empty command"));
        }

        tracing::debug!(
            context = request.context(),
            argv = ?request.argv(),
            "Executing in container"
        );

        let mut cmd = Command::new(&self.runtime);
        cmd.args(self.runtime_args(request));

        let result = run_to_completion(cmd, request.context(), request.timeout()).await?;

        if let Some(code) = result.exit_code {
            if RUNTIME_FAILURE_CODES.contains(&code) {
                return Err(Error::execution(
                    request.context(),
                    format!(
                        "{} exec exited with {}: {}",
                        self.runtime.display(),
                        code,
                        truncate_output(result.stderr_str().trim(), 500)
                    ),
                ));
            }
        }

        Ok(result)
    }
}
