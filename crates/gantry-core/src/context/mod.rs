use async_trait::async_trait;

use crate::execution::CommandOutput;
use crate::models::{CoreError, CoreResult, ExecutionErrorKind};

mod local;
mod remote;

pub use local::LocalContext;
pub use remote::{RemoteContext, RemoteSession, SessionFactory};

/// One execution target. Task bodies are written against this capability set
/// only and never branch on which variant they hold.
#[async_trait(?Send)]
pub trait Context: Send + Sync {
    /// Identity string for reporting, e.g. `deploy@10.0.0.4` or `ci@local`.
    fn identity(&self) -> String;

    /// Runs a shell command and captures its output. Fails on non-zero exit.
    async fn execute(&self, command: &str) -> CoreResult<CommandOutput>;

    async fn read(&self, path: &str) -> CoreResult<Vec<u8>>;

    async fn write(&self, path: &str, content: &[u8]) -> CoreResult<()>;
}

pub(crate) fn ensure_success(
    identity: &str,
    command: &str,
    output: CommandOutput,
) -> CoreResult<CommandOutput> {
    if output.success() {
        return Ok(output);
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(CoreError::execution(
        ExecutionErrorKind::NonZeroExit,
        format!(
            "command '{command}' on {identity} exited with {:?}: {}",
            output.status,
            stderr.trim_end()
        ),
    ))
}
