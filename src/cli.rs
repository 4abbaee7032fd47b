// src/cli.rs

//! CLI argument parsing for the `shtask` binary using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::loader::default_config_path;

/// Command-line arguments for `shtask`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "shtask",
    version,
    about = "Run a shell task: resolve secrets, build its environment, feed the command to an interpreter.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the task file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Working directory of the task. Defaults to the current directory.
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Name of the task, used in log output.
    #[arg(long, value_name = "NAME", default_value = "sh")]
    pub name: String,

    /// Privileged variable as NAME=VALUE. Can be repeated.
    #[arg(long = "secret", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub secrets: Vec<(String, String)>,

    /// Environment variables starting with this prefix become privileged
    /// variables (with the prefix stripped).
    #[arg(long, value_name = "PREFIX", default_value = "SHTASK_SECRET_")]
    pub secret_env_prefix: String,

    /// Where task output goes.
    #[arg(long, value_enum, default_value_t = OutputMode::Stdout)]
    pub output: OutputMode,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SHTASK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print what would run, but don't start anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Output destination as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Raw output on stdout.
    Stdout,
    /// One log event per line, secrets masked.
    Log,
    /// Both of the above.
    Both,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Split `NAME=VALUE`; the value may itself contain `=`.
pub fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{s}'")),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
