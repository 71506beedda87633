//! Tier-2 configuration: process-wide named constants.

use std::collections::HashMap;

use serde_json::Value;

/// Named constants shared by every request of the process.
///
/// Values come from explicit [`define`](Environment::define) calls and,
/// optionally, from environment variables carrying a prefix. Explicit
/// definitions win over environment variables.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    defines: HashMap<String, Value>,
    variables: HashMap<String, Value>,
}

impl Environment {
    /// Empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the process environment, keeping variables that start with
    /// `prefix` and stripping it (`MVC_URL` → `URL` for prefix `MVC_`).
    #[must_use]
    pub fn from_env(prefix: &str) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    /// Same as [`from_env`](Environment::from_env) over an explicit list of
    /// variables.
    #[must_use]
    pub fn from_vars<I>(prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let variables = vars
            .into_iter()
            .filter_map(|(name, value)| {
                name.strip_prefix(prefix)
                    .filter(|key| !key.is_empty())
                    .map(|key| (key.to_string(), Value::String(value)))
            })
            .collect();
        Self {
            defines: HashMap::new(),
            variables,
        }
    }

    /// Define a constant.
    #[must_use]
    pub fn define(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defines.insert(key.into(), value.into());
        self
    }

    /// Whether the constant exists (even when `null`).
    #[must_use]
    pub fn is_defined(&self, key: &str) -> bool {
        self.defines.contains_key(key) || self.variables.contains_key(key)
    }

    #[must_use]
    pub fn constant(&self, key: &str) -> Option<&Value> {
        self.defines.get(key).or_else(|| self.variables.get(key))
    }
}
