// src/errors.rs

//! Crate-wide error types.
//!
//! Every failure of a single execution maps to exactly one variant of
//! [`ShellTaskError`], so callers can tell "did not run correctly" apart from
//! "ran and refused" without inspecting message strings.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Problems with the task's declared configuration, its secret references or
/// its privileged variables. Raised before any process is launched.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("secret '{name}' referenced by the command is not defined")]
    MissingSecret { name: String },

    #[error("invalid environment variable name in privileged variables: '{key}'")]
    InvalidEnvKey { key: String },

    #[error("required parameter '{key}' is missing")]
    MissingParam { key: String },

    #[error("parameter '{key}' must be {expected}")]
    InvalidParam { key: String, expected: &'static str },

    #[error("task configuration must be a table/object at the top level")]
    NotAnObject,

    #[error("reading task configuration {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failure to start the interpreter process.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("interpreter command line is empty")]
    EmptyInterpreter,

    #[error("creating output pipe: {0}")]
    Pipe(#[source] std::io::Error),

    #[error("spawning process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("child process has no stdin handle")]
    MissingStdin,
}

/// Which step of a running execution an I/O error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStage {
    /// Writing the resolved command to the child's stdin.
    Stdin,
    /// Waiting for the child to terminate.
    Wait,
    /// Setting up the async runtime for a blocking caller.
    Runtime,
}

impl fmt::Display for IoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IoStage::Stdin => "writing command to stdin",
            IoStage::Wait => "waiting for process",
            IoStage::Runtime => "starting runtime",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum ShellTaskError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: LaunchError,
    },

    #[error("IO error while {stage}: {source}")]
    Io {
        stage: IoStage,
        #[source]
        source: std::io::Error,
    },

    #[error("interrupted while waiting for process: {reason}")]
    Interrupted { reason: String },

    #[error("Command failed with code {code}")]
    NonZeroExit { code: i32 },
}

/// Coarse classification of [`ShellTaskError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Launch,
    Io,
    Interruption,
    NonZeroExit,
}

impl ShellTaskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShellTaskError::Config(_) => ErrorKind::Configuration,
            ShellTaskError::Launch { .. } => ErrorKind::Launch,
            ShellTaskError::Io { .. } => ErrorKind::Io,
            ShellTaskError::Interrupted { .. } => ErrorKind::Interruption,
            ShellTaskError::NonZeroExit { .. } => ErrorKind::NonZeroExit,
        }
    }

    /// Exit code of the child, if it ran to completion and refused.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ShellTaskError::NonZeroExit { code } => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn io(stage: IoStage, source: std::io::Error) -> Self {
        ShellTaskError::Io { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, ShellTaskError>;
