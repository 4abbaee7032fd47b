// src/secrets/mod.rs

//! Privileged variables and secret references.
//!
//! - [`PrivilegedVariables`] is the read contract of the host's credential
//!   subsystem: key enumeration and single-key lookup, nothing else.
//! - [`SecretStore`] is an in-memory implementation used by the `shtask`
//!   binary and by tests.
//! - [`template`] resolves `${secret:NAME}` references in command text.

pub mod template;

use std::collections::BTreeMap;
use std::fmt;

pub use template::{ResolvedCommand, resolve_secrets};

/// Read-only access to privileged (secret) values.
///
/// Implementations must not log values; callers must not store them in
/// anything that gets serialized.
pub trait PrivilegedVariables: Send + Sync {
    fn keys(&self) -> Vec<String>;
    fn get(&self, name: &str) -> Option<String>;
}

/// In-memory privileged variables. `Debug` prints keys only.
#[derive(Clone, Default)]
pub struct SecretStore {
    values: BTreeMap<String, String>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a secret.
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { values }
    }

    /// Collect every variable whose name starts with `prefix`, stripping the
    /// prefix. `SHTASK_SECRET_DB_PASSWORD` becomes `DB_PASSWORD`.
    pub fn from_prefixed_vars<I>(prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let values = vars
            .into_iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(prefix)
                    .filter(|name| !name.is_empty())
                    .map(|name| (name.to_string(), v))
            })
            .collect();
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PrivilegedVariables for SecretStore {
    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

impl fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretStore")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Every non-empty secret value, for output redaction.
pub fn secret_values(vars: &dyn PrivilegedVariables) -> Vec<String> {
    vars.keys()
        .iter()
        .filter_map(|k| vars.get(k))
        .filter(|v| !v.is_empty())
        .collect()
}
