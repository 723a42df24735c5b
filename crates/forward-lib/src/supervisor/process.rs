//! Tokio-backed process spawning with labeled output relay

use super::{ProcessHandle, ProcessSpawner, SpawnedProcess, Termination};
use crate::cluster::CommandSpec;
use crate::error::ForwardError;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Spawns real child processes on the tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl ProcessSpawner for TokioSpawner {
    fn spawn(&self, command: &CommandSpec, label: &str) -> Result<SpawnedProcess, ForwardError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ForwardError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let pid = child.id();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(relay_lines(stdout, label.to_string(), "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(relay_lines(stderr, label.to_string(), "stderr"));
        }

        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel::<Termination>();
        let (exit_tx, exit_rx) = oneshot::channel();
        let label = label.to_string();

        // Signals are delivered from this task, which owns the child, so a
        // pid is never signalled after the child has been reaped.
        tokio::spawn(async move {
            let status = loop {
                tokio::select! {
                    status = child.wait() => break status,
                    Some(termination) = signal_rx.recv() => deliver(&mut child, termination, &label),
                }
            };

            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(label = %label, error = %e, "Failed to wait for process");
                    None
                }
            };
            let _ = exit_tx.send(code);
        });

        Ok(SpawnedProcess {
            handle: Box::new(ChildHandle { pid, signal_tx }),
            exited: exit_rx,
        })
    }
}

/// Relay each output line to the diagnostic log, prefixed by its session
async fn relay_lines<R>(reader: R, label: String, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!(target: "forward_output", label = %label, stream, "[{}] {}", label, line),
            Ok(None) => break,
            Err(e) => {
                warn!(label = %label, stream, error = %e, "Output relay stopped");
                break;
            }
        }
    }
}

/// Signal a child that has not been reaped yet
fn deliver(child: &mut Child, termination: Termination, label: &str) {
    let result = match termination {
        Termination::Graceful => terminate(child),
        Termination::Forced => child.start_kill().map_err(|e| e.to_string()),
    };
    if let Err(reason) = result {
        warn!(label = %label, ?termination, error = %reason, "Failed to signal process");
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) -> Result<(), String> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // `id` is None once the child has been reaped
    let Some(pid) = child.id() else {
        return Ok(());
    };
    let raw = i32::try_from(pid).map_err(|_| format!("pid {} out of range", pid))?;

    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(errno) => Err(errno.to_string()),
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> Result<(), String> {
    // No graceful signal outside Unix
    child.start_kill().map_err(|e| e.to_string())
}

/// Handle to a process started by [`TokioSpawner`]
#[derive(Debug)]
pub struct ChildHandle {
    pid: Option<u32>,
    signal_tx: mpsc::UnboundedSender<Termination>,
}

impl ProcessHandle for ChildHandle {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn signal(&self, termination: Termination) -> Result<(), ForwardError> {
        // The watcher task is gone once the process has exited
        let _ = self.signal_tx.send(termination);
        Ok(())
    }
}
