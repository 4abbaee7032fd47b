// src/secrets/template.rs

//! `${secret:NAME}` substitution in command text.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::PrivilegedVariables;
use crate::errors::ConfigError;

static SECRET_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{secret:([^}]*)\}").expect("valid secret reference pattern"));

/// Command text with every secret reference substituted.
///
/// `Debug` shows only the length so the value can be carried through
/// instrumented code without leaking secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCommand(String);

impl ResolvedCommand {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_bytes()
    }
}

impl fmt::Debug for ResolvedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResolvedCommand(<{} bytes>)", self.0.len())
    }
}

/// Replace every `${secret:NAME}` in `template` with the value of `NAME`.
///
/// Single pass: substituted values are copied as-is and never scanned for
/// further references. The first undefined name aborts resolution.
///
/// Any name is looked up, but privileged keys are also exported to the
/// child environment, where names outside `[A-Za-z_][A-Za-z0-9_]*` are
/// rejected before launch.
pub fn resolve_secrets(
    template: &str,
    secrets: &dyn PrivilegedVariables,
) -> Result<ResolvedCommand, ConfigError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    let mut resolved = 0usize;

    for caps in SECRET_REF.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = name.as_str().trim();

        let value = secrets.get(name).ok_or_else(|| ConfigError::MissingSecret {
            name: name.to_string(),
        })?;

        out.push_str(&template[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
        resolved += 1;
    }
    out.push_str(&template[last..]);

    debug!(references = resolved, "resolved secret references in command");

    Ok(ResolvedCommand(out))
}
