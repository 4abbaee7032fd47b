// src/config/validate.rs

use crate::config::model::TaskConfig;
use crate::errors::ConfigError;

/// Parameter holding the command template.
pub const COMMAND_KEY: &str = "_command";

/// Parameter holding the interpreter argv.
pub const SHELL_KEY: &str = "shell";

/// Interpreter used when the task declares none.
#[cfg(not(windows))]
pub const DEFAULT_SHELL: &str = "/bin/sh";
#[cfg(windows)]
pub const DEFAULT_SHELL: &str = "cmd";

/// Shell parameters extracted from a task configuration.
///
/// `params` is the configuration after the nested section named after the
/// task type has been merged in as defaults; it is what the environment
/// builder exports.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellParams {
    pub command_template: String,
    pub shell: Vec<String>,
    pub params: TaskConfig,
}

impl ShellParams {
    /// Merge the `task_type` section into the top level and pull out the
    /// command template and interpreter.
    pub fn from_config(config: &TaskConfig, task_type: &str) -> Result<Self, ConfigError> {
        let params = config.merge_default(&config.nested_or_empty(task_type));

        let command_template = params.get_str(COMMAND_KEY)?.to_string();

        let mut shell = params.get_string_list_or_empty(SHELL_KEY)?;
        if shell.is_empty() {
            shell = vec![DEFAULT_SHELL.to_string()];
        }

        Ok(Self {
            command_template,
            shell,
            params,
        })
    }
}
