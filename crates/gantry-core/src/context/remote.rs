use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::context::{Context, ensure_success};
use crate::execution::{CommandOutput, shell_escape};
use crate::models::{CoreError, CoreResult, ExecutionErrorKind};

/// A persistent session on one remote machine. The transport implementation
/// (SSH or otherwise) lives outside the core; the core depends only on the
/// ability to run a command and capture its output.
#[async_trait(?Send)]
pub trait RemoteSession: Send + Sync {
    async fn exec(&self, command: &str) -> CoreResult<CommandOutput>;
}

/// Establishes sessions on demand, one per target, as a provider advances.
#[async_trait(?Send)]
pub trait SessionFactory: Send + Sync {
    async fn connect(&self, user: &str, host: &str) -> CoreResult<Box<dyn RemoteSession>>;
}

/// Executes against one remote host+user through a session. File access
/// rides the exec capability, round-tripping bytes through `base64`, so the
/// transport only has to provide command execution.
pub struct RemoteContext {
    user: String,
    host: String,
    session: Box<dyn RemoteSession>,
}

impl RemoteContext {
    pub fn new(
        user: impl Into<String>,
        host: impl Into<String>,
        session: Box<dyn RemoteSession>,
    ) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            session,
        }
    }
}

#[async_trait(?Send)]
impl Context for RemoteContext {
    fn identity(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    async fn execute(&self, command: &str) -> CoreResult<CommandOutput> {
        let output = self.session.exec(command).await?;
        ensure_success(&self.identity(), command, output)
    }

    async fn read(&self, path: &str) -> CoreResult<Vec<u8>> {
        let quoted = shell_escape(path)?;
        let output = self.execute(&format!("base64 < {quoted}")).await?;
        let text: Vec<u8> = output
            .stdout
            .iter()
            .copied()
            .filter(|byte| !byte.is_ascii_whitespace())
            .collect();
        STANDARD.decode(&text).map_err(|error| {
            CoreError::execution(
                ExecutionErrorKind::Parse,
                format!("invalid base64 from remote read of '{path}': {error}"),
            )
        })
    }

    async fn write(&self, path: &str, content: &[u8]) -> CoreResult<()> {
        let quoted = shell_escape(path)?;
        let payload = shell_escape(&STANDARD.encode(content))?;
        self.execute(&format!("printf %s {payload} | base64 -d > {quoted}"))
            .await?;
        Ok(())
    }
}
