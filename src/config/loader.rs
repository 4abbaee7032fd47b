// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::TaskConfig;
use crate::errors::ConfigError;

/// Load a task configuration file (TOML) from a given path.
///
/// This only performs deserialization; extracting and checking the shell
/// parameters happens in [`crate::config::validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<TaskConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    load_from_str(&contents)
}

/// Parse TOML text into a [`TaskConfig`].
///
/// TOML values map onto JSON values one-to-one, except datetimes, which
/// become strings.
pub fn load_from_str(contents: &str) -> Result<TaskConfig, ConfigError> {
    let table: toml::Table = toml::from_str(contents)?;
    let value = toml_to_json(toml::Value::Table(table));
    TaskConfig::from_value(value)
}

fn toml_to_json(value: toml::Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        toml::Value::String(s) => Json::String(s),
        toml::Value::Integer(i) => Json::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        toml::Value::Boolean(b) => Json::Bool(b),
        toml::Value::Datetime(dt) => Json::String(dt.to_string()),
        toml::Value::Array(items) => Json::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Json::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Default task file used by the `shtask` binary.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("task.toml")
}
