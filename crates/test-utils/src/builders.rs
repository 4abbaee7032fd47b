#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use shtask::config::TaskConfig;
use shtask::exec::{
    OutputSink, ProcessStarter, ShellTask, ShellTaskContext, ShellTaskFactory, TaskRequest,
};
use shtask::secrets::SecretStore;

/// Builder for a [`ShellTask`] to simplify test setup.
///
/// The inherited environment defaults to just the test process's `PATH`, so
/// tests do not depend on whatever else happens to be exported.
pub struct ShellTaskBuilder {
    name: String,
    config: TaskConfig,
    secrets: SecretStore,
    working_dir: PathBuf,
    inherited: Vec<(String, String)>,
}

impl ShellTaskBuilder {
    pub fn new(command: &str) -> Self {
        let path = std::env::var("PATH").unwrap_or_else(|_| "/usr/bin:/bin".to_string());
        Self {
            name: "test-task".to_string(),
            config: TaskConfig::new().with("_command", command),
            secrets: SecretStore::new(),
            working_dir: std::env::temp_dir(),
            inherited: vec![("PATH".to_string(), path)],
        }
    }

    /// Start from an existing configuration (no `_command` added).
    pub fn from_config(config: TaskConfig) -> Self {
        let mut builder = Self::new("");
        builder.config = config;
        builder
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.config = self.config.with(key, value);
        self
    }

    pub fn shell(self, argv: &[&str]) -> Self {
        let argv: Vec<Value> = argv.iter().map(|s| Value::from(*s)).collect();
        self.param("shell", argv)
    }

    pub fn secret(mut self, key: &str, value: &str) -> Self {
        self.secrets.insert(key, value);
        self
    }

    pub fn working_dir(mut self, dir: &Path) -> Self {
        self.working_dir = dir.to_path_buf();
        self
    }

    pub fn inherited_var(mut self, key: &str, value: &str) -> Self {
        self.inherited.push((key.to_string(), value.to_string()));
        self
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn build(self, starter: Arc<dyn ProcessStarter>, sink: Arc<dyn OutputSink>) -> ShellTask {
        let factory = ShellTaskFactory::new(starter, sink);
        let request = TaskRequest::new(self.name, self.config);
        let ctx = ShellTaskContext::new(request, self.working_dir, Arc::new(self.secrets))
            .with_inherited_env(self.inherited);
        factory.new_task(ctx)
    }
}
