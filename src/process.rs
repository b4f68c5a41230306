use anyhow::{anyhow, Context};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// The language server child process. `terminate` is the one cleanup path;
/// dropping an unterminated handle still kills the child.
pub struct ServerProcess {
    child: Child,
    terminated: bool,
}

impl ServerProcess {
    pub fn spawn(exe: &str, args: &[String]) -> anyhow::Result<(Self, ChildStdin, ChildStdout)> {
        let mut child = Command::new(exe)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to start language server `{}`", exe))?;

        let writer = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("failed to take child stdin"))?;
        let reader = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("failed to take child stdout"))?;

        let process = ServerProcess {
            child,
            terminated: false,
        };
        tracing::info!(exe, pid = process.id(), "language server started");
        Ok((process, writer, reader))
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Give the server `grace` to exit on its own, then kill it and wait.
    pub async fn terminate(mut self, grace: Duration) -> std::io::Result<ExitStatus> {
        self.terminated = true;

        if let Ok(status) = tokio::time::timeout(grace, self.child.wait()).await {
            let status = status?;
            tracing::info!(%status, "language server exited");
            return Ok(status);
        }

        tracing::warn!(
            grace_ms = grace.as_millis() as u64,
            "language server still running, killing it"
        );
        self.child.kill().await?;
        let status = self.child.wait().await?;
        tracing::info!(%status, "language server killed");
        Ok(status)
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if self.terminated {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            tracing::warn!("failed to kill language server: {}", e);
        }
    }
}
