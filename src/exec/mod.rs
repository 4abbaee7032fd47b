// src/exec/mod.rs

//! Process execution layer.
//!
//! This module turns a task configuration into a running interpreter
//! process and its outcome:
//!
//! - [`environment`] builds the child's environment from inherited, declared
//!   and privileged variables.
//! - [`launcher`] defines the process-start hook ([`ProcessStarter`]) and the
//!   default `tokio::process` implementation.
//! - [`relay`] drains the combined output stream into an [`OutputSink`]
//!   (see [`sink`] for the provided sinks).
//! - [`outcome`] waits for the child and maps its termination to a result.
//! - [`process_group`] tears down everything the interpreter started.
//! - [`task_runner`] ties the above together behind [`ShellTaskFactory`].

pub mod environment;
pub mod launcher;
pub mod outcome;
pub mod process_group;
pub mod relay;
pub mod sink;
pub mod task_runner;

pub use environment::{EnvironmentMap, build_environment};
pub use launcher::{
    LaunchRequest, LocalProcessStarter, ProcessSpec, ProcessStarter, SpawnedProcess, TaskRequest,
};
pub use outcome::TaskResult;
pub use sink::{OutputSink, StdoutSink, TeeSink, TracingSink};
pub use task_runner::{ShellTask, ShellTaskContext, ShellTaskFactory, TASK_TYPE};
