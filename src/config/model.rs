// src/config/model.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ConfigError;

/// A task's declared parameters.
///
/// Keys keep their declaration order. A config handed to this crate is
/// treated as read-only: every transformation returns a new value.
///
/// ```toml
/// _command = "echo ${secret:greeting} > out.txt"
/// REGION = "eu-west-1"
///
/// [sh]
/// shell = ["/bin/bash"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskConfig {
    entries: Map<String, Value>,
}

impl TaskConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value; only objects are accepted.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(entries) => Ok(Self { entries }),
            _ => Err(ConfigError::NotAnObject),
        }
    }

    /// Builder: set a key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The nested object stored under `key`, or an empty config when the key
    /// is absent or not an object.
    pub fn nested_or_empty(&self, key: &str) -> TaskConfig {
        match self.entries.get(key) {
            Some(Value::Object(map)) => TaskConfig {
                entries: map.clone(),
            },
            _ => TaskConfig::new(),
        }
    }

    /// Return a copy of `self` with every key of `defaults` that `self` lacks.
    ///
    /// When both sides hold an object under the same key the objects are
    /// merged the same way; any other value already present in `self` wins.
    pub fn merge_default(&self, defaults: &TaskConfig) -> TaskConfig {
        let mut entries = self.entries.clone();
        merge_missing(&mut entries, &defaults.entries);
        TaskConfig { entries }
    }

    /// Required string parameter.
    pub fn get_str(&self, key: &str) -> Result<&str, ConfigError> {
        match self.entries.get(key) {
            Some(Value::String(s)) => Ok(s),
            None | Some(Value::Null) => Err(ConfigError::MissingParam {
                key: key.to_string(),
            }),
            Some(_) => Err(ConfigError::InvalidParam {
                key: key.to_string(),
                expected: "a string",
            }),
        }
    }

    /// Optional list-of-strings parameter; absent or `null` yields an empty list.
    pub fn get_string_list_or_empty(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        let invalid = || ConfigError::InvalidParam {
            key: key.to_string(),
            expected: "a list of strings",
        };

        match self.entries.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
                .collect(),
            Some(_) => Err(invalid()),
        }
    }
}

fn merge_missing(target: &mut Map<String, Value>, defaults: &Map<String, Value>) {
    for (key, default) in defaults {
        match target.get_mut(key) {
            None => {
                target.insert(key.clone(), default.clone());
            }
            Some(Value::Object(existing)) => {
                if let Value::Object(nested_defaults) = default {
                    merge_missing(existing, nested_defaults);
                }
            }
            Some(_) => {}
        }
    }
}

impl TryFrom<Value> for TaskConfig {
    type Error = ConfigError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        TaskConfig::from_value(value)
    }
}
