use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use crate::execution::{CommandOutput, CommandStatus, ShellExecutor, ShellRequest};
use crate::models::{CoreError, CoreResult, ExecutionErrorKind};

/// Runs requests through `sh -c` with piped stdio. A request that outlives
/// its deadline gets its child killed and fails with a timeout error.
pub struct TokioShellExecutor;

#[async_trait(?Send)]
impl ShellExecutor for TokioShellExecutor {
    async fn execute(&self, request: ShellRequest) -> CoreResult<CommandOutput> {
        request.validate()?;

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(&request.command);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|error| {
            CoreError::execution(
                ExecutionErrorKind::ProcessFailure,
                format!("failed to spawn 'sh -c': {error}"),
            )
        })?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        // Both pipes are drained while waiting so a chatty child cannot
        // deadlock on a full pipe buffer.
        let collect = async {
            let (stdout, stderr) = tokio::join!(drain(stdout_pipe), drain(stderr_pipe));
            let status = child.wait().await.map_err(|error| {
                CoreError::execution(
                    ExecutionErrorKind::ProcessFailure,
                    format!("failed to wait for process: {error}"),
                )
            })?;
            Ok::<_, CoreError>((status, stdout, stderr))
        };

        let (status, stdout, stderr) = match request.timeout {
            Some(limit) => match tokio::time::timeout(limit, collect).await {
                Ok(collected) => collected?,
                Err(_) => {
                    let _ = child.kill().await;
                    return Err(CoreError::execution(
                        ExecutionErrorKind::Timeout,
                        format!(
                            "command '{}' timed out after {}ms",
                            request.command,
                            limit.as_millis()
                        ),
                    ));
                }
            },
            None => collect.await?,
        };

        let status = match status.code() {
            Some(code) => CommandStatus::ExitCode(code),
            None => CommandStatus::Terminated,
        };

        Ok(CommandOutput {
            status,
            stdout,
            stderr,
        })
    }
}

async fn drain(pipe: Option<impl AsyncReadExt + Unpin>) -> Vec<u8> {
    let mut buffer = Vec::new();
    if let Some(mut handle) = pipe {
        let _ = handle.read_to_end(&mut buffer).await;
    }
    buffer
}
