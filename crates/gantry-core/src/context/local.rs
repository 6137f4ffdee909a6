use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::{Context, ensure_success};
use crate::execution::{CommandOutput, ShellExecutor, ShellRequest};
use crate::models::{CoreError, CoreResult, ExecutionErrorKind};

/// Executes against the current machine: commands through the shell
/// executor seam, file access through the local filesystem.
pub struct LocalContext {
    user: String,
    executor: Arc<dyn ShellExecutor>,
    timeout: Option<Duration>,
}

impl LocalContext {
    pub fn new(executor: Arc<dyn ShellExecutor>) -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("LOGNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            user,
            executor,
            timeout: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Deadline applied to every command run through this context.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait(?Send)]
impl Context for LocalContext {
    fn identity(&self) -> String {
        format!("{}@local", self.user)
    }

    async fn execute(&self, command: &str) -> CoreResult<CommandOutput> {
        let mut request = ShellRequest::new(command);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let output = self.executor.execute(request).await?;
        ensure_success(&self.identity(), command, output)
    }

    async fn read(&self, path: &str) -> CoreResult<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|error| {
            CoreError::execution(
                ExecutionErrorKind::Io,
                format!("failed to read '{path}': {error}"),
            )
        })
    }

    async fn write(&self, path: &str, content: &[u8]) -> CoreResult<()> {
        tokio::fs::write(path, content).await.map_err(|error| {
            CoreError::execution(
                ExecutionErrorKind::Io,
                format!("failed to write '{path}': {error}"),
            )
        })
    }
}
