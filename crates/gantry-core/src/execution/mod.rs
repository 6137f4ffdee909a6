use std::time::Duration;

use async_trait::async_trait;

use crate::models::{CoreError, CoreResult, ExecutionErrorKind};

mod tokio_shell;

pub use tokio_shell::TokioShellExecutor;

/// A single shell command to run, with an optional deadline. The deadline is
/// the only timeout the core knows about; enforcing it is the executor's job
/// and a breach surfaces as an ordinary execution failure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShellRequest {
    pub command: String,
    pub timeout: Option<Duration>,
}

impl ShellRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.command.is_empty() {
            return Err(CoreError::execution(
                ExecutionErrorKind::InvalidInput,
                "command must not be empty",
            ));
        }

        if self.command.contains('\0') {
            return Err(CoreError::execution(
                ExecutionErrorKind::InvalidInput,
                "command must not contain NUL bytes",
            ));
        }

        if let Some(timeout) = self.timeout
            && timeout.is_zero()
        {
            return Err(CoreError::execution(
                ExecutionErrorKind::InvalidInput,
                "timeout must be greater than zero when provided",
            ));
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommandStatus {
    ExitCode(i32),
    Terminated,
}

impl CommandStatus {
    pub fn success(self) -> bool {
        matches!(self, Self::ExitCode(0))
    }
}

/// Captured output of one completed command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    pub status: CommandStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn stdout_utf8(&self) -> CoreResult<String> {
        String::from_utf8(self.stdout.clone()).map_err(|_| {
            CoreError::execution(ExecutionErrorKind::Parse, "stdout is not valid UTF-8")
        })
    }

    pub fn stderr_utf8(&self) -> CoreResult<String> {
        String::from_utf8(self.stderr.clone()).map_err(|_| {
            CoreError::execution(ExecutionErrorKind::Parse, "stderr is not valid UTF-8")
        })
    }
}

#[async_trait(?Send)]
pub trait ShellExecutor: Send + Sync {
    async fn execute(&self, request: ShellRequest) -> CoreResult<CommandOutput>;
}

/// Quotes a string for safe inclusion in a shell command line.
pub fn shell_escape(text: &str) -> CoreResult<String> {
    shlex::try_quote(text)
        .map(|quoted| quoted.into_owned())
        .map_err(|_| {
            CoreError::execution(
                ExecutionErrorKind::Parse,
                "value cannot be shell-escaped (contains NUL)",
            )
        })
}
