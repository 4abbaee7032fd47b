// src/exec/outcome.rs

//! Waiting for the child and turning its termination into a result.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::process_group::ProcessGroupGuard;
use crate::errors::{IoStage, Result, ShellTaskError};

const RELAY_GRACE: Duration = Duration::from_secs(2);

/// Successful execution. Carries nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskResult;

impl TaskResult {
    pub fn empty() -> Self {
        TaskResult
    }
}

/// Write `command` to the child's stdin on its own task, then close stdin so
/// the interpreter sees end of input.
pub fn spawn_stdin_writer(mut stdin: ChildStdin, command: Vec<u8>) -> JoinHandle<io::Result<()>> {
    tokio::spawn(async move {
        stdin.write_all(&command).await?;
        stdin.flush().await?;
        stdin.shutdown().await?;
        Ok(())
    })
}

/// Resolves only when cancellation was actually requested. A dropped sender
/// means nobody can cancel any more, so it never resolves.
async fn cancelled(cancel_rx: oneshot::Receiver<()>) {
    if cancel_rx.await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Wait for `child` while the stdin writer and output relay make progress.
///
/// - exit code 0 → `Ok(TaskResult)`
/// - other exit codes → [`ShellTaskError::NonZeroExit`]
/// - wait or stdin failures → [`ShellTaskError::Io`]
/// - cancellation → the child's process group is killed, the child reaped
///   and the relay drained, then [`ShellTaskError::Interrupted`]
///
/// If the returned future is dropped before the child exits, the process
/// group is killed as well.
pub async fn await_outcome(
    task: &str,
    mut child: Child,
    stdin_writer: JoinHandle<io::Result<()>>,
    relay: JoinHandle<io::Result<u64>>,
    cancel_rx: oneshot::Receiver<()>,
) -> Result<TaskResult> {
    let mut group = ProcessGroupGuard::for_child(task, &child);

    let status = tokio::select! {
        res = child.wait() => {
            group.disarm();
            res.map_err(|e| ShellTaskError::io(IoStage::Wait, e))?
        }

        () = cancelled(cancel_rx) => {
            info!(task = %task, "cancellation requested for running task; killing process group");
            stdin_writer.abort();
            group.kill();
            if let Err(e) = child.kill().await {
                warn!(task = %task, error = %e, "failed to kill child process on cancellation");
            }
            drain_after_kill(task, relay).await;
            return Err(ShellTaskError::Interrupted {
                reason: "cancellation requested while waiting for process".to_string(),
            });
        }
    };

    let stdin_res = match stdin_writer.await {
        Ok(res) => res,
        Err(join) => Err(io::Error::other(join)),
    };

    match relay.await {
        Ok(Ok(bytes)) => debug!(task = %task, bytes, "output relay finished"),
        Ok(Err(e)) => warn!(task = %task, error = %e, "output relay stopped with read error"),
        Err(join) => warn!(task = %task, error = %join, "output relay task failed"),
    }

    if let Err(e) = stdin_res {
        if e.kind() == io::ErrorKind::BrokenPipe {
            debug!(task = %task, "interpreter exited before reading the whole command");
        } else {
            return Err(ShellTaskError::io(IoStage::Stdin, e));
        }
    }

    exit_status_to_result(task, status)
}

/// After a kill the pipe closes as soon as the last group member is gone.
/// Processes that left the group can keep it open, so the wait is bounded.
async fn drain_after_kill(task: &str, relay: JoinHandle<io::Result<u64>>) {
    match tokio::time::timeout(RELAY_GRACE, relay).await {
        Ok(Ok(Ok(bytes))) => debug!(task = %task, bytes, "output relay finished after kill"),
        Ok(Ok(Err(e))) => warn!(task = %task, error = %e, "output relay stopped with read error"),
        Ok(Err(join)) => warn!(task = %task, error = %join, "output relay task failed"),
        Err(_) => warn!(
            task = %task,
            "output pipe still open after kill; a process outside the group holds it"
        ),
    }
}

pub fn exit_status_to_result(task: &str, status: ExitStatus) -> Result<TaskResult> {
    let code = status.code().unwrap_or(-1);

    info!(
        task = %task,
        exit_code = code,
        success = status.success(),
        "task process exited"
    );

    if status.success() {
        return Ok(TaskResult::empty());
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            warn!(task = %task, signal, "task process terminated by signal");
        }
    }

    Err(ShellTaskError::NonZeroExit { code })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn zero_status_is_success() {
        let status = ExitStatus::from_raw(0);
        assert_eq!(exit_status_to_result("t", status).unwrap(), TaskResult);
    }

    #[test]
    fn non_zero_status_carries_code() {
        // wait(2) encoding: exit code in the high byte
        let status = ExitStatus::from_raw(7 << 8);
        let err = exit_status_to_result("t", status).unwrap_err();
        assert_eq!(err.exit_code(), Some(7));
    }

    #[test]
    fn signal_termination_maps_to_minus_one() {
        let status = ExitStatus::from_raw(9);
        let err = exit_status_to_result("t", status).unwrap_err();
        assert!(matches!(err, ShellTaskError::NonZeroExit { code: -1 }));
    }

    #[tokio::test]
    async fn cancelled_ignores_dropped_sender() {
        let (tx, rx) = oneshot::channel::<()>();
        drop(tx);
        let res = tokio::time::timeout(std::time::Duration::from_millis(50), cancelled(rx)).await;
        assert!(res.is_err(), "dropped sender must not count as cancellation");
    }

    #[tokio::test]
    async fn cancelled_fires_on_send() {
        let (tx, rx) = oneshot::channel::<()>();
        tx.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_millis(50), cancelled(rx))
            .await
            .unwrap();
    }
}
