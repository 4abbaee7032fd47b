// src/exec/launcher.rs

//! Process launching.
//!
//! The task runner never spawns processes itself; it asks a
//! [`ProcessStarter`] to do so. Hosts can wrap or replace the default
//! [`LocalProcessStarter`] to instrument or intercept process creation, and
//! tests can record what would have been started.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use super::environment::EnvironmentMap;
use super::relay::OutputReader;
use crate::config::TaskConfig;
use crate::errors::LaunchError;
use crate::secrets::ResolvedCommand;

/// The task being executed, as handed over by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    pub task_name: String,
    pub config: TaskConfig,
}

impl TaskRequest {
    pub fn new(task_name: impl Into<String>, config: TaskConfig) -> Self {
        Self {
            task_name: task_name.into(),
            config,
        }
    }
}

/// Everything needed to start one execution. Built fresh per run.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub interpreter: Vec<String>,
    pub working_dir: PathBuf,
    pub env: EnvironmentMap,
    pub command: ResolvedCommand,
}

impl ProcessSpec {
    pub fn launch_request<'a>(&'a self, task: &'a TaskRequest) -> LaunchRequest<'a> {
        LaunchRequest {
            working_dir: &self.working_dir,
            task,
            interpreter: &self.interpreter,
            env: &self.env,
        }
    }
}

/// Arguments of the process-start hook. The command text is not part of it:
/// it is delivered on stdin after the process has started.
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    pub working_dir: &'a Path,
    pub task: &'a TaskRequest,
    pub interpreter: &'a [String],
    pub env: &'a EnvironmentMap,
}

/// A started child: stdin must be piped, output is the combined
/// stdout/stderr stream.
pub struct SpawnedProcess {
    pub child: Child,
    pub output: OutputReader,
}

/// Process-start hook.
pub trait ProcessStarter: Send + Sync {
    fn start(&self, request: &LaunchRequest<'_>) -> Result<SpawnedProcess, LaunchError>;
}

/// Spawns the interpreter with `tokio::process`.
///
/// - the environment is exactly `request.env` (nothing else is inherited),
/// - stdout and stderr share one OS pipe so their output interleaves as the
///   child wrote it,
/// - on Unix the child leads a new process group (see
///   [`process_group`](super::process_group)),
/// - the child is killed if its handle is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProcessStarter;

impl ProcessStarter for LocalProcessStarter {
    fn start(&self, request: &LaunchRequest<'_>) -> Result<SpawnedProcess, LaunchError> {
        let (program, args) = request
            .interpreter
            .split_first()
            .ok_or(LaunchError::EmptyInterpreter)?;

        let (reader, writer) = std::io::pipe().map_err(LaunchError::Pipe)?;
        let writer_err = writer.try_clone().map_err(LaunchError::Pipe)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(request.working_dir)
            .env_clear()
            .envs(request.env.iter())
            .stdin(Stdio::piped())
            .stdout(writer)
            .stderr(writer_err)
            .kill_on_drop(true);
        // leader of its own group, so cancellation reaches what the shell starts
        #[cfg(unix)]
        cmd.process_group(0);

        let spawned = cmd.spawn();
        // The command owns our copies of the pipe's write end; they must be
        // closed for the reader to ever see end of stream.
        drop(cmd);
        let child = spawned.map_err(LaunchError::Spawn)?;

        debug!(
            task = %request.task.task_name,
            pid = child.id(),
            program = %program,
            "spawned interpreter process"
        );

        Ok(SpawnedProcess {
            child,
            output: Box::new(reader),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Read;
    use tokio::io::AsyncWriteExt;

    fn request_parts() -> (TaskRequest, EnvironmentMap) {
        let mut env = EnvironmentMap::new();
        env.insert("PATH", "/usr/bin:/bin");
        env.insert("GREETING", "hi");
        (TaskRequest::new("t", TaskConfig::new()), env)
    }

    #[test]
    fn empty_interpreter_is_rejected() {
        let (task, env) = request_parts();
        let interpreter: Vec<String> = Vec::new();
        let req = LaunchRequest {
            working_dir: Path::new("/"),
            task: &task,
            interpreter: &interpreter,
            env: &env,
        };
        assert!(matches!(
            LocalProcessStarter.start(&req),
            Err(LaunchError::EmptyInterpreter)
        ));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let (task, env) = request_parts();
        let interpreter = vec!["/no/such/interpreter".to_string()];
        let req = LaunchRequest {
            working_dir: Path::new("/"),
            task: &task,
            interpreter: &interpreter,
            env: &env,
        };
        assert!(matches!(
            LocalProcessStarter.start(&req),
            Err(LaunchError::Spawn(_))
        ));
    }

    #[tokio::test]
    async fn stdout_and_stderr_share_one_stream() {
        let (task, env) = request_parts();
        let dir = tempfile::tempdir().unwrap();
        let interpreter = vec!["/bin/sh".to_string()];
        let req = LaunchRequest {
            working_dir: dir.path(),
            task: &task,
            interpreter: &interpreter,
            env: &env,
        };

        let SpawnedProcess { mut child, output } = LocalProcessStarter.start(&req).unwrap();

        let mut stdin = child.stdin.take().unwrap();
        stdin
            .write_all(b"echo out $GREETING; echo err 1>&2; pwd\n")
            .await
            .unwrap();
        drop(stdin);

        let collected = tokio::task::spawn_blocking(move || {
            let mut output = output;
            let mut s = String::new();
            output.read_to_string(&mut s).unwrap();
            s
        })
        .await
        .unwrap();

        assert!(child.wait().await.unwrap().success());
        assert!(collected.contains("out hi"));
        assert!(collected.contains("err"));
        let canonical = dir.path().canonicalize().unwrap();
        assert!(collected.contains(canonical.to_str().unwrap()) || collected.contains(dir.path().to_str().unwrap()));
    }
}
