//! Runs a resolved script and relays its stdout to a response sink.
//!
//! Output is forwarded in chunks of at most [`CHUNK_SIZE`] bytes as soon as
//! they are read, so long-running scripts stream progressively. The sink is
//! a bounded channel; when its receiving side goes away (client
//! disconnected) the session stops writing and kills the script's whole
//! process group.

use crate::error::ExecutionError;
use crate::resolver::ScriptPath;
use bytes::Bytes;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[cfg(unix)]
use nix::sys::signal::{Signal, killpg};
#[cfg(unix)]
use nix::unistd::Pid;

pub const CHUNK_SIZE: usize = 1024;

/// Interpreter used when none is configured.
pub const DEFAULT_SHELL: &str = "bash";

const KILL_GRACE: Duration = Duration::from_millis(500);

/// Receiving end is the HTTP response body.
pub type ResponseSink = mpsc::Sender<io::Result<Bytes>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Exited(i32),
    Signaled(i32),
    /// The caller went away before the script finished.
    Cancelled,
    /// Reading output or awaiting the child failed mid-stream.
    Faulted(String),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Text appended to an already-started body when the script failed.
    pub fn failure_message(&self) -> Option<String> {
        match self {
            Self::Exited(0) => None,
            Self::Exited(code) => Some(format!(
                "Script execution failed with return code {}",
                code
            )),
            Self::Signaled(signal) => Some(format!(
                "Script execution terminated by signal {}",
                signal
            )),
            Self::Cancelled | Self::Faulted(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessStreamer {
    shell: String,
}

impl Default for ProcessStreamer {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL)
    }
}

impl ProcessStreamer {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Starts `<shell> <script>` with stdout and stderr captured.
    pub fn spawn(&self, script: &ScriptPath) -> Result<ExecutionSession, ExecutionError> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg(script.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|source| ExecutionError::Spawn {
            shell: self.shell.clone(),
            script: script.name().to_string(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionError::MissingPipe(script.name().to_string(), "stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutionError::MissingPipe(script.name().to_string(), "stderr"))?;

        let id = Uuid::new_v4();
        let pid = child.id();
        info!(
            execution_id = %id,
            script = script.name(),
            pid = ?pid,
            shell = %self.shell,
            "Script started"
        );

        Ok(ExecutionSession {
            id,
            script: script.name().to_string(),
            started_at: chrono::Utc::now().timestamp_millis(),
            process_group: pid.map(|pid| pid as i32),
            stderr_drain: drain_stderr(id, script.name().to_string(), stderr),
            child,
            stdout,
            finished: false,
        })
    }

    /// Spawns the script and streams it into `sink` until it finishes or
    /// the sink is closed.
    pub async fn execute_and_stream(
        &self,
        script: &ScriptPath,
        sink: ResponseSink,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let session = self.spawn(script)?;
        Ok(session.stream_into(sink).await)
    }
}

/// One running script. Dropping it before the script was reaped kills the
/// script's whole process group.
#[derive(Debug)]
pub struct ExecutionSession {
    id: Uuid,
    script: String,
    started_at: i64,
    process_group: Option<i32>,
    child: Child,
    stdout: ChildStdout,
    stderr_drain: JoinHandle<()>,
    /// Set once the group leader has been reaped; its pgid may be reused after.
    finished: bool,
}

impl ExecutionSession {
    pub fn script(&self) -> &str {
        &self.script
    }

    pub async fn stream_into(mut self, sink: ResponseSink) -> ExecutionOutcome {
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            let read = tokio::select! {
                _ = sink.closed() => None,
                read = self.stdout.read(&mut buf) => Some(read),
            };

            match read {
                None => return self.cancel().await,
                Some(Ok(0)) => break,
                Some(Ok(n)) => {
                    let chunk = Bytes::copy_from_slice(&buf[..n]);
                    if sink.send(Ok(chunk)).await.is_err() {
                        return self.cancel().await;
                    }
                }
                Some(Err(err)) => {
                    error!(
                        execution_id = %self.id,
                        script = %self.script,
                        error = %err,
                        "Failed to read script output"
                    );
                    let outcome = ExecutionOutcome::Faulted(err.to_string());
                    let _ = sink.send(Err(err)).await;
                    self.terminate().await;
                    return outcome;
                }
            }
        }

        let status = tokio::select! {
            _ = sink.closed() => None,
            status = self.child.wait() => Some(status),
        };

        let outcome = match status {
            None => return self.cancel().await,
            Some(Ok(status)) => {
                self.finished = true;
                outcome_from_status(status)
            }
            Some(Err(err)) => {
                error!(
                    execution_id = %self.id,
                    script = %self.script,
                    error = %err,
                    "Failed to await script termination"
                );
                ExecutionOutcome::Faulted(err.to_string())
            }
        };

        if let Some(message) = outcome.failure_message() {
            warn!(
                execution_id = %self.id,
                script = %self.script,
                outcome = ?outcome,
                "Script execution failed"
            );
            let _ = sink.send(Ok(Bytes::from(message))).await;
        }

        info!(
            execution_id = %self.id,
            script = %self.script,
            outcome = ?outcome,
            duration_ms = chrono::Utc::now().timestamp_millis() - self.started_at,
            "Script finished"
        );
        outcome
    }

    async fn cancel(mut self) -> ExecutionOutcome {
        warn!(
            execution_id = %self.id,
            script = %self.script,
            "Request cancelled by the client, terminating script"
        );
        self.terminate().await;
        self.stderr_drain.abort();
        ExecutionOutcome::Cancelled
    }

    /// SIGTERM to the process group, SIGKILL after a grace period.
    async fn terminate(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.process_group {
            let pgid = Pid::from_raw(pgid);
            let _ = killpg(pgid, Signal::SIGTERM);
            if timeout(KILL_GRACE, self.child.wait()).await.is_ok() {
                let _ = killpg(pgid, Signal::SIGKILL);
                self.finished = true;
                return;
            }
            let _ = killpg(pgid, Signal::SIGKILL);
        }

        if let Err(err) = self.child.kill().await {
            debug!(execution_id = %self.id, error = %err, "Child already gone");
        }
        self.finished = true;
    }
}

impl Drop for ExecutionSession {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.stderr_drain.abort();

        #[cfg(unix)]
        if let Some(pgid) = self.process_group {
            warn!(
                execution_id = %self.id,
                script = %self.script,
                "Execution dropped while running, killing process group"
            );
            let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
        }
    }
}

fn outcome_from_status(status: ExitStatus) -> ExecutionOutcome {
    if let Some(code) = status.code() {
        return ExecutionOutcome::Exited(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExecutionOutcome::Signaled(signal);
        }
    }

    ExecutionOutcome::Exited(-1)
}

fn drain_stderr(id: Uuid, script: String, stderr: ChildStderr) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    debug!(execution_id = %id, script = %script, "stderr: {}", text.trim_end());
                }
                Err(err) => {
                    debug!(execution_id = %id, script = %script, error = %err, "stderr closed");
                    break;
                }
            }
        }
    })
}
