// src/exec/task_runner.rs

//! Running one shell task end to end.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::environment::{build_environment, inherited_environment};
use super::launcher::{LocalProcessStarter, ProcessSpec, ProcessStarter, SpawnedProcess, TaskRequest};
use super::outcome::{TaskResult, await_outcome, spawn_stdin_writer};
use super::relay::spawn_relay;
use super::sink::OutputSink;
use crate::config::ShellParams;
use crate::errors::{IoStage, LaunchError, Result, ShellTaskError};
use crate::secrets::{PrivilegedVariables, resolve_secrets};

/// Task type served by this crate. Also the name of the nested config
/// section whose keys act as defaults for the top level.
pub const TASK_TYPE: &str = "sh";

/// Per-invocation inputs supplied by the host.
#[derive(Clone)]
pub struct ShellTaskContext {
    pub request: TaskRequest,
    pub working_dir: PathBuf,
    pub privileged: Arc<dyn PrivilegedVariables>,
    inherited_env: Option<Vec<(String, String)>>,
}

impl ShellTaskContext {
    pub fn new(
        request: TaskRequest,
        working_dir: impl Into<PathBuf>,
        privileged: Arc<dyn PrivilegedVariables>,
    ) -> Self {
        Self {
            request,
            working_dir: working_dir.into(),
            privileged,
            inherited_env: None,
        }
    }

    /// Use these variables instead of the current process environment as
    /// the inherited layer.
    pub fn with_inherited_env(mut self, vars: Vec<(String, String)>) -> Self {
        self.inherited_env = Some(vars);
        self
    }
}

/// Creates [`ShellTask`]s wired to the host's collaborators.
#[derive(Clone)]
pub struct ShellTaskFactory {
    starter: Arc<dyn ProcessStarter>,
    sink: Arc<dyn OutputSink>,
}

impl ShellTaskFactory {
    pub fn new(starter: Arc<dyn ProcessStarter>, sink: Arc<dyn OutputSink>) -> Self {
        Self { starter, sink }
    }

    /// Factory spawning processes locally with [`LocalProcessStarter`].
    pub fn local(sink: Arc<dyn OutputSink>) -> Self {
        Self::new(Arc::new(LocalProcessStarter), sink)
    }

    pub fn task_type(&self) -> &'static str {
        TASK_TYPE
    }

    pub fn new_task(&self, context: ShellTaskContext) -> ShellTask {
        ShellTask {
            context,
            starter: Arc::clone(&self.starter),
            sink: Arc::clone(&self.sink),
        }
    }
}

/// One execution of a shell command.
pub struct ShellTask {
    context: ShellTaskContext,
    starter: Arc<dyn ProcessStarter>,
    sink: Arc<dyn OutputSink>,
}

impl ShellTask {
    /// Run to completion. Dropping the returned future kills the child.
    pub async fn run(&self) -> Result<TaskResult> {
        // Held for the whole run so the receiver never observes a drop.
        let (_cancel_tx, cancel_rx) = oneshot::channel();
        self.run_until_cancelled(cancel_rx).await
    }

    /// Run to completion unless `cancel_rx` fires first, in which case the
    /// child is killed and [`ShellTaskError::Interrupted`] is returned.
    pub async fn run_until_cancelled(&self, cancel_rx: oneshot::Receiver<()>) -> Result<TaskResult> {
        let task_name = self.context.request.task_name.clone();
        let spec = self.prepare()?;

        info!(
            task = %task_name,
            interpreter = ?spec.interpreter,
            working_dir = %spec.working_dir.display(),
            command_bytes = spec.command.len(),
            env_vars = spec.env.len(),
            "starting shell task"
        );

        let program = spec.interpreter.first().cloned().unwrap_or_default();
        let SpawnedProcess { mut child, output } = self
            .starter
            .start(&spec.launch_request(&self.context.request))
            .map_err(|source| ShellTaskError::Launch {
                program: program.clone(),
                source,
            })?;

        let Some(stdin) = child.stdin.take() else {
            if let Err(e) = child.start_kill() {
                warn!(task = %task_name, error = %e, "failed to kill child started without stdin");
            }
            return Err(ShellTaskError::Launch {
                program,
                source: LaunchError::MissingStdin,
            });
        };

        let relay = spawn_relay(task_name.clone(), output, Arc::clone(&self.sink));
        let writer = spawn_stdin_writer(stdin, spec.command.into_bytes());

        await_outcome(&task_name, child, writer, relay, cancel_rx).await
    }

    /// Synchronous entry point for callers outside an async runtime.
    ///
    /// Must not be called from within a Tokio runtime.
    pub fn run_blocking(&self) -> Result<TaskResult> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ShellTaskError::io(IoStage::Runtime, e))?;
        rt.block_on(self.run())
    }

    /// Resolve configuration, secrets and environment. Nothing is started.
    pub fn prepare(&self) -> Result<ProcessSpec> {
        let ctx = &self.context;
        let params = ShellParams::from_config(&ctx.request.config, TASK_TYPE)?;

        let command = resolve_secrets(&params.command_template, ctx.privileged.as_ref())?;

        let inherited = match &ctx.inherited_env {
            Some(vars) => vars.clone(),
            None => inherited_environment(),
        };
        let env = build_environment(
            inherited,
            &params.params,
            ctx.privileged.as_ref(),
            &ctx.working_dir,
        )?;

        debug!(task = %ctx.request.task_name, env = ?env, "prepared process environment");

        Ok(ProcessSpec {
            interpreter: params.shell,
            working_dir: ctx.working_dir.clone(),
            env,
            command,
        })
    }
}
