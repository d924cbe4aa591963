//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` runs `timedatectl`, `date`, `hwclock`, `ping`,
//! `openssl`, `docker` and `git` with a hard timeout. A child that outlives
//! its timeout is killed rather than left running.

use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::application::ports::CommandRunner;

/// Default timeout for clock and probe commands.
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CMD_TIMEOUT)
    }
}

async fn drain<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = h.read_to_end(&mut buf).await;
    }
    buf
}

/// Wait for `child` while draining its pipes, killing it on timeout.
async fn collect(
    mut child: tokio::process::Child,
    program: &str,
    timeout: Duration,
    stdin: Option<Vec<u8>>,
) -> Result<Output> {
    let stdin_handle = child.stdin.take();
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();

    let feed = async move {
        if let (Some(mut pipe), Some(input)) = (stdin_handle, stdin) {
            let _ = pipe.write_all(&input).await;
            // Dropping the pipe closes stdin so `openssl s_client` exits.
            drop(pipe);
        }
    };

    tokio::select! {
        result = async {
            let (status, stdout, stderr, ()) = tokio::join!(
                child.wait(),
                drain(stdout_handle),
                drain(stderr_handle),
                feed,
            );
            Ok(Output {
                status: status.with_context(|| format!("waiting for {program}"))?,
                stdout,
                stderr,
            })
        } => result,
        () = tokio::time::sleep(timeout) => {
            let _ = child.kill().await;
            anyhow::bail!("{program} timed out after {}s", timeout.as_secs())
        }
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.run_with_timeout(program, args, self.timeout).await
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output> {
        debug!(program, ?args, "spawning");
        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;
        collect(child, program, timeout, None).await
    }

    async fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        input: &[u8],
        timeout: Duration,
    ) -> Result<Output> {
        debug!(program, ?args, bytes = input.len(), "spawning with stdin");
        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;
        collect(child, program, timeout, Some(input.to_vec())).await
    }
}
