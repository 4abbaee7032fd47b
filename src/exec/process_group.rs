// src/exec/process_group.rs

//! Process-group teardown.
//!
//! [`LocalProcessStarter`](super::launcher::LocalProcessStarter) makes the
//! interpreter the leader of a fresh process group, so everything the shell
//! starts in the foreground shares its group id. Killing the group instead of
//! just the interpreter takes those processes down too, which in turn closes
//! every copy of the output pipe's write end.

use tokio::process::Child;
use tracing::{debug, warn};

/// Handle on the process group led by a spawned child.
///
/// While armed, dropping the guard SIGKILLs the whole group. The guard must
/// be disarmed once the leader has been reaped, since its id may be reused.
#[derive(Debug)]
pub struct ProcessGroupGuard {
    task: String,
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    /// Guard the group whose id equals `child`'s pid. A child that was
    /// already reaped yields an inert guard.
    pub fn for_child(task: &str, child: &Child) -> Self {
        Self {
            task: task.to_string(),
            pgid: child.id(),
        }
    }

    /// Forget the group without signalling it.
    pub fn disarm(&mut self) {
        self.pgid = None;
    }

    /// SIGKILL every process in the group, then disarm.
    pub fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(&self.task, pgid);
        }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(task: &str, pgid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        warn!(task = %task, pgid, "process group id out of range; not signalling");
        return;
    };

    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => debug!(task = %task, pgid, "killed process group"),
        // a starter that did not create a group, or a group already gone
        Err(Errno::ESRCH) => debug!(task = %task, pgid, "no such process group"),
        Err(e) => warn!(task = %task, pgid, error = %e, "failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(task: &str, pgid: u32) {
    debug!(task = %task, pgid, "process groups unsupported on this platform");
}
