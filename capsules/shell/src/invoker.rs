//! Subprocess lifecycle for a single invocation.
//!
//! Every process API the engine touches lives in this module: spawning the
//! shell, feeding stdin, draining stdout/stderr, waiting for exit and killing
//! the process group when an invocation times out or is dropped mid-flight.

use crate::error::InvocationError;
use crate::handler::HandlerReference;
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::debug;

pub const DEFAULT_SHELL: &str = "/bin/sh";
pub const DEFAULT_INVOCATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Fixed per-function settings for spawning handler processes.
#[derive(Debug, Clone)]
pub struct InvokerSettings {
    pub shell: PathBuf,
    pub timeout: Duration,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl Default for InvokerSettings {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            timeout: DEFAULT_INVOCATION_TIMEOUT,
            env: BTreeMap::new(),
            working_dir: None,
        }
    }
}

/// Captured output of a handler process that exited successfully.
#[derive(Debug, Clone)]
pub struct InvocationOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct SubprocessInvoker {
    settings: InvokerSettings,
}

impl SubprocessInvoker {
    pub fn new(settings: InvokerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &InvokerSettings {
        &self.settings
    }

    /// Run `handler` once with `arguments`, feeding `stdin` and collecting stdout.
    ///
    /// Holds no state across calls, so any number of invocations may run at once.
    pub async fn invoke(
        &self,
        handler: &HandlerReference,
        arguments: &str,
        stdin: &[u8],
    ) -> Result<InvocationOutput, InvocationError> {
        let command_line = handler.command_line(arguments);

        let mut command = Command::new(&self.settings.shell);
        command
            .arg("-c")
            .arg(&command_line)
            .envs(&self.settings.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.settings.working_dir {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.as_std_mut().process_group(0);
        }

        debug!(command = %command_line, "spawning handler");

        let start = Instant::now();
        let child = command.spawn().map_err(|source| InvocationError::Spawn {
            command: command_line.clone(),
            source,
        })?;
        let mut guard = ChildGuard::new(child);

        let limit = self.settings.timeout;
        let (status, stdout, stderr) =
            tokio::time::timeout(limit, exchange(guard.child_mut(), stdin))
                .await
                .map_err(|_| InvocationError::Timeout { timeout: limit })??;
        guard.disarm();
        let duration = start.elapsed();

        if !status.success() {
            return Err(InvocationError::NonZeroExit {
                code: status.code(),
                stderr: truncate(&String::from_utf8_lossy(&stderr), 2048),
            });
        }

        Ok(InvocationOutput {
            stdout,
            stderr,
            exit_code: status.code(),
            duration,
        })
    }
}

/// Feed stdin while draining both output pipes, then wait for exit.
///
/// Writing and reading run concurrently so a handler that emits output before
/// consuming all of its input cannot deadlock on a full pipe.
async fn exchange(
    child: &mut Child,
    input: &[u8],
) -> Result<(ExitStatus, Vec<u8>, Vec<u8>), InvocationError> {
    let stdin = child
        .stdin
        .take()
        .ok_or(InvocationError::Pipe { stream: "stdin" })?;
    let stdout = child
        .stdout
        .take()
        .ok_or(InvocationError::Pipe { stream: "stdout" })?;
    let stderr = child
        .stderr
        .take()
        .ok_or(InvocationError::Pipe { stream: "stderr" })?;

    let write = async move {
        let mut stdin = stdin;
        match stdin.write_all(input).await {
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                debug!("handler closed stdin before reading the full request body");
                Ok(())
            }
            other => other,
        }
        // stdin is dropped here, which closes the pipe and signals EOF
    };

    let (written, stdout, stderr) = tokio::join!(write, read_all(stdout), read_all(stderr));
    written.map_err(|source| InvocationError::Stdin { source })?;
    let stdout = stdout.map_err(|source| InvocationError::Output {
        stream: "stdout",
        source,
    })?;
    let stderr = stderr.map_err(|source| InvocationError::Output {
        stream: "stderr",
        source,
    })?;

    let status = child
        .wait()
        .await
        .map_err(|source| InvocationError::Wait { source })?;

    Ok((status, stdout, stderr))
}

async fn read_all<R: AsyncRead + Unpin>(mut pipe: R) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    pipe.read_to_end(&mut buffer).await?;
    Ok(buffer)
}

/// Kills the child's process group on drop unless disarmed.
///
/// Armed for the whole exchange so that a timeout, an I/O error or a dropped
/// invocation future all terminate the handler and anything it spawned.
struct ChildGuard {
    child: Child,
    armed: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self { child, armed: true }
    }

    fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let child = &mut self.child;
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                // SAFETY: killpg has no memory-safety preconditions. The child
                // was spawned with process_group(0), so its pid is the pgid.
                let killed = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) } == 0;
                if !killed {
                    let _ = child.start_kill();
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = child.start_kill();
        }
        let _ = child.try_wait();
        debug!("killed unfinished handler process");
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = text[..end].to_string();
    truncated.push_str("… (truncated)");
    truncated
}
