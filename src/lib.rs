// src/lib.rs

//! Secure shell-command execution.
//!
//! A task declares a command template, an optional interpreter and a set of
//! variables. [`exec::ShellTask`] resolves `${secret:NAME}` references,
//! builds the child environment, spawns the interpreter, feeds it the
//! command on stdin, relays its combined output and reports the exit status
//! as a typed result.

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod secrets;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cli::{CliArgs, OutputMode};
use crate::config::{ShellParams, TaskConfig};
use crate::errors::ShellTaskError;
use crate::exec::{
    OutputSink, ShellTaskContext, ShellTaskFactory, StdoutSink, TASK_TYPE, TaskRequest, TeeSink,
    TracingSink,
};
use crate::secrets::{SecretStore, secret_values};

/// Exit code reported when the task was interrupted (128 + SIGINT).
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - task file loading
/// - privileged variables from `--secret` and the environment
/// - output sink selection
/// - Ctrl-C handling
///
/// Returns the process exit code for the binary.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config = config::load_from_path(&args.config)
        .with_context(|| format!("loading task file {:?}", args.config))?;

    let working_dir = resolve_workdir(args.workdir.as_ref())?;
    let secrets = collect_secrets(&args);

    if args.dry_run {
        print_dry_run(&args.name, &config, &working_dir, &secrets)?;
        return Ok(0);
    }

    let sink = build_sink(args.output, &secrets);
    let factory = ShellTaskFactory::local(sink);
    let request = TaskRequest::new(args.name.clone(), config);
    let task = factory.new_task(ShellTaskContext::new(request, working_dir, Arc::new(secrets)));

    // Ctrl-C → cancel the running task.
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let _ctrl_c = AbortOnDrop(tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C; task cannot be interrupted");
            return;
        }
        let _ = cancel_tx.send(());
    }));

    match task.run_until_cancelled(cancel_rx).await {
        Ok(_) => {
            info!(task = %args.name, "task succeeded");
            Ok(0)
        }
        Err(err) => {
            error!(task = %args.name, kind = ?err.kind(), error = %err, "task failed");
            Ok(exit_code_for(&err))
        }
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Map a task failure to the binary's exit code.
pub fn exit_code_for(err: &ShellTaskError) -> i32 {
    match err {
        ShellTaskError::NonZeroExit { code } if *code > 0 => *code,
        ShellTaskError::Interrupted { .. } => INTERRUPTED_EXIT_CODE,
        _ => 1,
    }
}

fn resolve_workdir(workdir: Option<&PathBuf>) -> Result<PathBuf> {
    let dir = match workdir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("reading current directory")?,
    };
    std::path::absolute(&dir).with_context(|| format!("making {dir:?} absolute"))
}

/// `--secret` entries override variables picked up via the env prefix.
fn collect_secrets(args: &CliArgs) -> SecretStore {
    let mut store = SecretStore::from_prefixed_vars(
        &args.secret_env_prefix,
        exec::environment::inherited_environment(),
    );
    for (name, value) in &args.secrets {
        store.insert(name.clone(), value.clone());
    }
    store
}

fn build_sink(mode: OutputMode, secrets: &SecretStore) -> Arc<dyn OutputSink> {
    let tracing_sink = || -> Arc<dyn OutputSink> {
        Arc::new(TracingSink::new().redacting(secret_values(secrets)))
    };

    match mode {
        OutputMode::Stdout => Arc::new(StdoutSink),
        OutputMode::Log => tracing_sink(),
        OutputMode::Both => {
            let stdout: Arc<dyn OutputSink> = Arc::new(StdoutSink);
            Arc::new(TeeSink::new(vec![stdout, tracing_sink()]))
        }
    }
}

/// Print what would run. The command is shown unresolved.
fn print_dry_run(
    name: &str,
    config: &TaskConfig,
    working_dir: &std::path::Path,
    secrets: &SecretStore,
) -> Result<()> {
    let params = ShellParams::from_config(config, TASK_TYPE)?;

    println!("shtask dry-run");
    println!("  task: {name}");
    println!("  working_dir: {}", working_dir.display());
    println!("  interpreter: {:?}", params.shell);
    println!("  command (unresolved):");
    for line in params.command_template.lines() {
        println!("    {line}");
    }
    println!("  privileged variables: {:?}", secrets);

    let exported: Vec<&str> = params
        .params
        .keys()
        .filter(|k| exec::environment::is_valid_env_key(k))
        .collect();
    println!("  exported parameters: {exported:?}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropping_abort_guard_stops_listener() {
        let (held_tx, held_rx) = oneshot::channel::<()>();
        let guard = AbortOnDrop(tokio::spawn(async move {
            let _held = held_tx;
            std::future::pending::<()>().await;
        }));

        drop(guard);

        // the aborted task drops its sender
        let res = tokio::time::timeout(std::time::Duration::from_secs(5), held_rx)
            .await
            .unwrap();
        assert!(res.is_err());
    }

    #[test]
    fn exit_codes_follow_failure_kind() {
        assert_eq!(exit_code_for(&ShellTaskError::NonZeroExit { code: 7 }), 7);
        assert_eq!(exit_code_for(&ShellTaskError::NonZeroExit { code: -1 }), 1);
        assert_eq!(
            exit_code_for(&ShellTaskError::Interrupted {
                reason: "ctrl-c".to_string()
            }),
            INTERRUPTED_EXIT_CODE
        );
        assert_eq!(
            exit_code_for(&ShellTaskError::Config(errors::ConfigError::NotAnObject)),
            1
        );
    }
}
