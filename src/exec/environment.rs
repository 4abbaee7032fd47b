// src/exec/environment.rs

//! Environment construction for the child process.
//!
//! Three sources are layered, later ones winning on key collision:
//! 1. the inherited process environment,
//! 2. the task's declared parameters (invalid names are skipped),
//! 3. privileged variables (invalid names abort the task).
//!
//! The working directory is then appended to the effective `PATH` so that
//! scripts living next to the task can be invoked without a `./` prefix.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::trace;

use crate::config::TaskConfig;
use crate::errors::ConfigError;
use crate::secrets::PrivilegedVariables;

static VALID_ENV_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid env key pattern"));

pub const PATH_VAR: &str = "PATH";

#[cfg(not(windows))]
pub const PATH_LIST_SEPARATOR: char = ':';
#[cfg(windows)]
pub const PATH_LIST_SEPARATOR: char = ';';

pub fn is_valid_env_key(key: &str) -> bool {
    VALID_ENV_KEY.is_match(key)
}

/// Environment handed to the child. The child sees exactly these variables.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvironmentMap {
    vars: BTreeMap<String, String>,
}

impl EnvironmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|s| s.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

// Values may be secrets; only names are printed.
impl std::fmt::Debug for EnvironmentMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentMap")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Snapshot of the current process environment.
///
/// Entries that are not valid UTF-8 are skipped.
pub fn inherited_environment() -> Vec<(String, String)> {
    std::env::vars_os()
        .filter_map(|(k, v)| match (k.into_string(), v.into_string()) {
            (Ok(k), Ok(v)) => Some((k, v)),
            (k, _) => {
                trace!(key = ?k, "skipping non UTF-8 inherited environment variable");
                None
            }
        })
        .collect()
}

/// Build the child environment.
///
/// Declared parameters with names outside `[A-Za-z_][A-Za-z0-9_]*` are
/// dropped with a trace diagnostic. The same mistake in a privileged
/// variable is a [`ConfigError::InvalidEnvKey`].
pub fn build_environment<I>(
    inherited: I,
    params: &TaskConfig,
    privileged: &dyn PrivilegedVariables,
    working_dir: &Path,
) -> Result<EnvironmentMap, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut env = EnvironmentMap::new();

    for (key, value) in inherited {
        env.insert(key, value);
    }

    for (key, value) in params.iter() {
        if is_valid_env_key(key) {
            env.insert(key, stringify(value));
        } else {
            trace!(key = %key, "ignoring invalid env var key");
        }
    }

    collect_privileged(&mut env, privileged)?;

    let path = augment_path(env.get(PATH_VAR), working_dir);
    env.insert(PATH_VAR, path);

    Ok(env)
}

fn collect_privileged(
    env: &mut EnvironmentMap,
    privileged: &dyn PrivilegedVariables,
) -> Result<(), ConfigError> {
    for name in privileged.keys() {
        if !is_valid_env_key(&name) {
            return Err(ConfigError::InvalidEnvKey { key: name });
        }
        if let Some(value) = privileged.get(&name) {
            env.insert(name, value);
        }
    }
    Ok(())
}

/// Strings pass through unchanged; everything else is rendered as JSON text.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Append `working_dir` to a `PATH` value unless it is already listed.
pub fn augment_path(current: Option<&str>, working_dir: &Path) -> String {
    let dir = std::path::absolute(working_dir).unwrap_or_else(|_| working_dir.to_path_buf());
    let dir_str = dir.to_string_lossy();

    match current {
        None | Some("") => dir_str.into_owned(),
        Some(path) if std::env::split_paths(path).any(|entry| entry == dir) => path.to_string(),
        Some(path) => format!("{path}{PATH_LIST_SEPARATOR}{dir_str}"),
    }
}

// Paths in these tests are Unix-shaped.
#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::secrets::SecretStore;
    use serde_json::json;

    fn workdir() -> &'static Path {
        Path::new("/srv/work")
    }

    fn inherited() -> Vec<(String, String)> {
        vec![
            ("PATH".to_string(), "/usr/bin:/bin".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ]
    }

    #[test]
    fn key_pattern() {
        for ok in ["A", "_", "foo_BAR9", "_command"] {
            assert!(is_valid_env_key(ok), "{ok} should be valid");
        }
        for bad in ["", "9A", "A-B", "a.b", "sp ace", "ünï"] {
            assert!(!is_valid_env_key(bad), "{bad} should be invalid");
        }
    }

    #[test]
    fn declared_values_are_stringified() {
        let params = TaskConfig::new()
            .with("NAME", "plain")
            .with("COUNT", 3)
            .with("FLAG", true)
            .with("LIST", json!(["a", 1]))
            .with("NOTHING", Value::Null);

        let env = build_environment(inherited(), &params, &SecretStore::new(), workdir()).unwrap();

        assert_eq!(env.get("NAME"), Some("plain"));
        assert_eq!(env.get("COUNT"), Some("3"));
        assert_eq!(env.get("FLAG"), Some("true"));
        assert_eq!(env.get("LIST"), Some(r#"["a",1]"#));
        assert_eq!(env.get("NOTHING"), Some("null"));
        assert_eq!(env.get("HOME"), Some("/root"));
    }

    #[test]
    fn invalid_declared_keys_are_dropped() {
        let params = TaskConfig::new().with("bad-key", "x").with("GOOD", "y");

        let env = build_environment(inherited(), &params, &SecretStore::new(), workdir()).unwrap();

        assert!(!env.contains("bad-key"));
        assert_eq!(env.get("GOOD"), Some("y"));
    }

    #[test]
    fn invalid_privileged_key_is_an_error() {
        let secrets = SecretStore::new().with_secret("api.key", "v");

        let err = build_environment(inherited(), &TaskConfig::new(), &secrets, workdir()).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidEnvKey { key } if key == "api.key"));
    }

    #[test]
    fn privileged_wins_over_declared_and_inherited() {
        let params = TaskConfig::new().with("FOO", "bar").with("HOME", "/declared");
        let secrets = SecretStore::new().with_secret("FOO", "secret");

        let env = build_environment(inherited(), &params, &secrets, workdir()).unwrap();

        assert_eq!(env.get("FOO"), Some("secret"));
        assert_eq!(env.get("HOME"), Some("/declared"));
    }

    #[test]
    fn working_dir_is_appended_to_path() {
        let env = build_environment(inherited(), &TaskConfig::new(), &SecretStore::new(), workdir())
            .unwrap();
        let expected = format!("/usr/bin:/bin{PATH_LIST_SEPARATOR}/srv/work");
        assert_eq!(env.get(PATH_VAR), Some(expected.as_str()));
    }

    #[test]
    fn missing_path_becomes_working_dir() {
        let env = build_environment(Vec::new(), &TaskConfig::new(), &SecretStore::new(), workdir())
            .unwrap();
        assert_eq!(env.get(PATH_VAR), Some("/srv/work"));
    }

    #[test]
    fn declared_path_is_the_base_for_augmentation() {
        let params = TaskConfig::new().with("PATH", "/opt/tools");
        let env = build_environment(inherited(), &params, &SecretStore::new(), workdir()).unwrap();
        let expected = format!("/opt/tools{PATH_LIST_SEPARATOR}/srv/work");
        assert_eq!(env.get(PATH_VAR), Some(expected.as_str()));
    }

    #[test]
    fn path_already_listing_working_dir_is_untouched() {
        assert_eq!(
            augment_path(Some("/srv/work:/usr/bin"), workdir()),
            "/srv/work:/usr/bin"
        );
    }

    #[test]
    fn debug_output_hides_values() {
        let secrets = SecretStore::new().with_secret("TOKEN", "hunter2");
        let env = build_environment(Vec::new(), &TaskConfig::new(), &secrets, workdir()).unwrap();
        let rendered = format!("{env:?}");
        assert!(rendered.contains("TOKEN"));
        assert!(!rendered.contains("hunter2"));
    }
}
